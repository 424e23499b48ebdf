//! Remote conversation gateway over HTTP.

pub mod http;
pub mod retry;
mod types;

pub use http::HttpGateway;
