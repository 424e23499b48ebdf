//! Hierarchical menu navigation.

pub mod machine;

pub use machine::{NavInput, NavOutcome, NavigationMachine, SessionCommand};
