//! Infrastructure implementations for Visor.
//!
//! Concrete adapters behind the trait seams of `visor-core`: the reqwest
//! HTTP gateway with its transport retry layer, SQLite persistence for
//! threads and preferences, the credential resolution chain, simulated
//! capture/playback devices for the desktop harness, and the config loader.

pub mod config;
pub mod credentials;
pub mod device;
pub mod gateway;
pub mod sqlite;
