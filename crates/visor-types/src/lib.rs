//! Shared domain types for Visor.
//!
//! This crate contains the core domain types used across the Visor client:
//! agents, conversation threads, runs, session events, navigation states,
//! configuration, and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod agent;
pub mod config;
pub mod error;
pub mod event;
pub mod nav;
pub mod run;
pub mod thread;
