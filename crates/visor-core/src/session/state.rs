//! In-memory session state owned by the orchestrator.

use tokio_util::sync::CancellationToken;

/// The live active-mode session.
///
/// Exists only between `enter_active_mode` and `exit_active_mode`; dropped
/// on exit. The cancellation token is the session-scoped root: every
/// pipeline invocation runs under a child of it, so exiting active mode
/// cancels whatever is in flight.
#[derive(Debug)]
pub(crate) struct ActiveSession {
    pub agent_id: String,
    pub thread_id: String,
    pub cancel: CancellationToken,
}

/// A read-only view of orchestration state for the navigation layer.
///
/// Menus are re-rendered from a fresh snapshot on every display; nothing
/// here is cached.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub is_active: bool,
    pub agent_id: Option<String>,
    pub thread_id: Option<String>,
    pub audio_response_enabled: bool,
    /// Whether an exchange currently holds the single-flight slot.
    pub busy: bool,
}
