//! Run executor: drives one remote run to completion.
//!
//! Submits the pending user message, creates the run, then polls its status
//! on a fixed cadence with a bounded attempt budget. The remote execution
//! is asynchronous with no push channel, so polling is the only option; the
//! attempt ceiling bounds worst-case latency and keeps the single-flight
//! slot from being held forever by a run the remote system never finishes.
//!
//! Both the interval and the ceiling come from [`RunPollConfig`] so tests
//! can shrink them.

use std::sync::Arc;

use tracing::{debug, trace};

use visor_types::config::RunPollConfig;
use visor_types::error::RunError;
use visor_types::run::{Run, RunStatus};

use crate::gateway::ConversationGateway;

/// Drives one run through `queued -> in_progress -> terminal`.
pub struct RunExecutor<G> {
    gateway: Arc<G>,
    config: RunPollConfig,
}

impl<G: ConversationGateway> RunExecutor<G> {
    pub fn new(gateway: Arc<G>, config: RunPollConfig) -> Self {
        Self { gateway, config }
    }

    /// Post `message` to the thread, run the agent, and return the
    /// assistant's reply text.
    ///
    /// Submission failures (post or create) mean the run never existed;
    /// they surface as [`RunError::Submission`] and no polling happens.
    pub async fn execute(
        &self,
        thread_id: &str,
        agent_id: &str,
        message: &str,
    ) -> Result<String, RunError> {
        self.gateway
            .post_message(thread_id, message)
            .await
            .map_err(RunError::Submission)?;
        let run_id = self
            .gateway
            .create_run(thread_id, agent_id)
            .await
            .map_err(RunError::Submission)?;

        let mut run = Run::submitted(run_id, thread_id);
        debug!(thread_id, run_id = %run.id, "run submitted");

        for attempt in 1..=self.config.max_poll_attempts {
            let state = self
                .gateway
                .run_status(thread_id, &run.id)
                .await
                .map_err(RunError::Gateway)?;
            run.observe(state);

            if run.status.is_terminal() {
                debug!(run_id = %run.id, status = %run.status, attempt, "run reached terminal state");
                return self.conclude(run).await;
            }

            trace!(run_id = %run.id, status = %run.status, attempt, "run still pending");
            tokio::time::sleep(self.config.poll_interval()).await;
        }

        Err(RunError::PollTimeout {
            attempts: self.config.max_poll_attempts,
        })
    }

    /// Classify the terminal state and, on success, fetch the reply.
    async fn conclude(&self, run: Run) -> Result<String, RunError> {
        match run.status {
            RunStatus::Completed => {
                let message = self
                    .gateway
                    .latest_assistant_message(&run.thread_id)
                    .await
                    .map_err(RunError::Gateway)?;
                // A completed run with no assistant message is a valid,
                // non-fatal terminal condition.
                message.ok_or(RunError::NoResponse)
            }
            status => Err(RunError::Remote {
                status,
                message: run
                    .last_error
                    .unwrap_or_else(|| "no error detail reported".to_string()),
            }),
        }
    }
}
