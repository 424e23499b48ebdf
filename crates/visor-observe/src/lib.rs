//! Observability setup for Visor.

pub mod tracing_setup;
