//! Photo-to-agent pipeline.
//!
//! Stages: capture -> vision analysis -> hand off to the run executor.
//! Analysis and the agent run are two distinct remote calls; the analysis
//! text is concatenated with the optional caller-supplied prompt before
//! being posted as the agent message.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use visor_types::error::PipelineError;
use visor_types::event::SessionEvent;

use crate::device::PhotoSource;
use crate::event::SessionBus;
use crate::gateway::ConversationGateway;
use crate::pipeline::{self, ExchangeTarget};
use crate::run::RunExecutor;
use crate::thread::manager::ThreadManager;
use crate::thread::store::ThreadStore;

/// Instruction given to the vision endpoint for every captured still.
const VISION_PROMPT: &str =
    "Describe what is in front of the wearer, concisely and concretely.";

/// One photo exchange. Single-use: `run()` consumes the pipeline.
pub struct PhotoPipeline<G> {
    gateway: Arc<G>,
    source: Arc<dyn PhotoSource>,
    /// Optional wearer question appended to the analysis text.
    prompt: Option<String>,
    cancel: CancellationToken,
}

impl<G: ConversationGateway> PhotoPipeline<G> {
    pub fn new(
        gateway: Arc<G>,
        source: Arc<dyn PhotoSource>,
        prompt: Option<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            gateway,
            source,
            prompt,
            cancel,
        }
    }

    /// Capture, analyze, and post the combined text to the target thread.
    /// Returns the assistant's reply text.
    pub async fn run<S: ThreadStore>(
        self,
        threads: &ThreadManager<G, S>,
        executor: &RunExecutor<G>,
        target: ExchangeTarget,
        bus: &SessionBus,
    ) -> Result<String, PipelineError> {
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let invocation = Uuid::now_v7();

        let thread_id = pipeline::resolve_thread(threads, &target).await?;

        bus.publish(SessionEvent::CaptureStarted);
        let photo = pipeline::guarded(&self.cancel, async {
            self.source
                .capture(self.cancel.child_token())
                .await
                .map_err(pipeline::map_device_error)
        })
        .await?;
        bus.publish(SessionEvent::PhotoCaptured);
        debug!(%invocation, bytes = photo.bytes.len(), "photo captured");

        bus.publish(SessionEvent::VisionAnalysisStarted);
        let analysis = pipeline::guarded(&self.cancel, async {
            self.gateway
                .analyze_image(&photo, VISION_PROMPT)
                .await
                .map_err(PipelineError::Gateway)
        })
        .await?;
        debug!(%invocation, chars = analysis.len(), "vision analysis complete");

        let message = match &self.prompt {
            Some(prompt) => format!("{analysis}\n\n{prompt}"),
            None => analysis,
        };

        bus.publish(SessionEvent::AssistantProcessingStarted);
        let reply = pipeline::guarded(&self.cancel, async {
            executor
                .execute(&thread_id, &target.agent_id, &message)
                .await
                .map_err(PipelineError::from)
        })
        .await?;

        threads.record_exchange(&thread_id).await?;
        Ok(reply)
    }
}
