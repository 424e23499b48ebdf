//! Active-mode session orchestration.

pub mod orchestrator;
pub mod state;

pub use orchestrator::{ActiveModeOrchestrator, DeviceSet, SessionConfig};
pub use state::SessionSnapshot;
