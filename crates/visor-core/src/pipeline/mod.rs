//! Modality pipelines: capture -> conversion -> hand-off.
//!
//! Each pipeline is a single-use value: construct one per invocation, call
//! `run()` (which consumes it), discard. There is no pooling or reuse of
//! in-flight state, which sidesteps cross-invocation corruption at the cost
//! of per-call setup. One `CancellationToken` is shared across all stages
//! of an invocation; stages are strictly ordered and each produces exactly
//! one terminal outcome.

pub mod audio;
pub mod photo;

pub use audio::AudioPipeline;
pub use photo::PhotoPipeline;

use tokio_util::sync::CancellationToken;

use visor_types::error::{PipelineError, ThreadError};

use crate::gateway::ConversationGateway;
use crate::thread::manager::ThreadManager;
use crate::thread::store::ThreadStore;

/// Where an exchange lands: an existing thread, or a fresh one for the agent.
#[derive(Debug, Clone)]
pub struct ExchangeTarget {
    pub agent_id: String,
    /// Post to this thread when set; otherwise a new thread is created
    /// for the exchange.
    pub thread_id: Option<String>,
}

impl ExchangeTarget {
    pub fn existing(agent_id: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            thread_id: Some(thread_id.into()),
        }
    }

    pub fn fresh(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            thread_id: None,
        }
    }
}

/// Resolve the target to a concrete thread id.
pub(crate) async fn resolve_thread<G, S>(
    threads: &ThreadManager<G, S>,
    target: &ExchangeTarget,
) -> Result<String, ThreadError>
where
    G: ConversationGateway,
    S: ThreadStore,
{
    match &target.thread_id {
        Some(id) => Ok(id.clone()),
        None => threads.create_new_thread(&target.agent_id).await,
    }
}

/// Race a stage against the invocation's cancellation token.
///
/// Cancellation wins, including when both branches are ready at once: a
/// late completion of `fut` after the token fires is dropped, never acted
/// upon.
pub(crate) async fn guarded<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, PipelineError>>,
) -> Result<T, PipelineError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled),
        result = fut => result,
    }
}

/// A device observing its own cancellation reports the invocation's
/// cancellation, not a hardware fault.
pub(crate) fn map_device_error(err: visor_types::error::DeviceError) -> PipelineError {
    match err {
        visor_types::error::DeviceError::Cancelled => PipelineError::Cancelled,
        other => PipelineError::Capture(other),
    }
}
