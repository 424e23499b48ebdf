//! Audio-to-agent pipeline.
//!
//! Stages: record -> transcribe -> hand off to the run executor. Stage
//! progress is published on the session bus (`RecordingStarted`,
//! `ProcessingStarted`); the reply text is returned to the caller, which
//! owns response handling.
//!
//! Recording honors a hard ceiling after which the device auto-stops and
//! the captured clip still proceeds to transcription. Clips shorter than
//! the configured minimum are rejected before any remote call.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use visor_types::config::RecordingLimits;
use visor_types::error::PipelineError;
use visor_types::event::SessionEvent;

use crate::device::AudioSource;
use crate::event::SessionBus;
use crate::gateway::ConversationGateway;
use crate::pipeline::{self, ExchangeTarget};
use crate::run::RunExecutor;
use crate::thread::manager::ThreadManager;
use crate::thread::store::ThreadStore;

/// One audio exchange. Single-use: `run()` consumes the pipeline.
pub struct AudioPipeline<G> {
    gateway: Arc<G>,
    source: Arc<dyn AudioSource>,
    limits: RecordingLimits,
    language: String,
    cancel: CancellationToken,
}

impl<G: ConversationGateway> AudioPipeline<G> {
    pub fn new(
        gateway: Arc<G>,
        source: Arc<dyn AudioSource>,
        limits: RecordingLimits,
        language: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            gateway,
            source,
            limits,
            language: language.into(),
            cancel,
        }
    }

    /// Record, transcribe, and post the transcript to the target thread.
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
        // Correlates the debug trail of one invocation.
        let invocation = Uuid::now_v7();

        let thread_id = pipeline::resolve_thread(threads, &target).await?;

        bus.publish(SessionEvent::RecordingStarted);
        let clip = pipeline::guarded(&self.cancel, async {
            self.source
                .capture(self.limits, self.cancel.child_token())
                .await
                .map_err(pipeline::map_device_error)
        })
        .await?;

        let millis = clip.duration.as_millis() as u64;
        if clip.duration < self.limits.min_duration {
            debug!(%invocation, millis, "recording below minimum, rejecting");
            return Err(PipelineError::TooShort { millis });
        }

        bus.publish(SessionEvent::ProcessingStarted);
        let transcript = pipeline::guarded(&self.cancel, async {
            self.gateway
                .transcribe(&clip, &self.language)
                .await
                .map_err(PipelineError::Gateway)
        })
        .await?;
        debug!(%invocation, chars = transcript.len(), "transcription complete");

        let reply = pipeline::guarded(&self.cancel, async {
            executor
                .execute(&thread_id, &target.agent_id, &transcript)
                .await
                .map_err(PipelineError::from)
        })
        .await?;

        threads.record_exchange(&thread_id).await?;
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{
        CeilingAudioSource, FakeGateway, FixedAudioSource, HangingAudioSource, MemoryThreadStore,
    };
    use std::time::Duration;
    use visor_types::config::RunPollConfig;
    use visor_types::run::RunStatus;
    use visor_types::thread::default_ttl;

    struct Rig {
        gateway: Arc<FakeGateway>,
        store: Arc<MemoryThreadStore>,
        threads: ThreadManager<FakeGateway, MemoryThreadStore>,
        executor: RunExecutor<FakeGateway>,
        bus: SessionBus,
    }

    fn rig() -> Rig {
        let gateway = Arc::new(FakeGateway::default());
        let store = Arc::new(MemoryThreadStore::default());
        let threads = ThreadManager::new(gateway.clone(), store.clone(), default_ttl());
        let executor = RunExecutor::new(
            gateway.clone(),
            RunPollConfig {
                poll_interval_ms: 1,
                max_poll_attempts: 5,
            },
        );
        Rig {
            gateway,
            store,
            threads,
            executor,
            bus: SessionBus::new(64),
        }
    }

    fn limits() -> RecordingLimits {
        RecordingLimits {
            max_duration: Duration::from_secs(60),
            min_duration: Duration::from_millis(100),
        }
    }

    fn pipeline(r: &Rig, source: Arc<dyn AudioSource>, lim: RecordingLimits) -> AudioPipeline<FakeGateway> {
        AudioPipeline::new(
            r.gateway.clone(),
            source,
            lim,
            "en",
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn records_transcribes_and_hands_off() {
        let r = rig();
        r.gateway.script_statuses([RunStatus::Completed]);
        let mut rx = r.bus.subscribe();

        let source = Arc::new(FixedAudioSource::with_duration(Duration::from_secs(2)));
        let target = ExchangeTarget::fresh("asst_guide");
        let reply = pipeline(&r, source, limits())
            .run(&r.threads, &r.executor, target, &r.bus)
            .await
            .unwrap();

        assert_eq!(reply, "assistant reply");
        assert_eq!(r.gateway.transcribe_calls(), 1);
        // The transcript is what got posted to the thread.
        let posted = r.gateway.posted_messages();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].1, "what am I looking at");

        // Stage events arrive in order.
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::RecordingStarted);
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::ProcessingStarted);

        // The exchange was recorded on the thread.
        let record = r.store.active_thread("asst_guide").await.unwrap().unwrap();
        assert_eq!(record.message_count, 1);
    }

    #[tokio::test]
    async fn too_short_recording_is_rejected_before_transcription() {
        let r = rig();
        let source = Arc::new(FixedAudioSource::with_duration(Duration::from_millis(20)));

        let err = pipeline(&r, source, limits())
            .run(&r.threads, &r.executor, ExchangeTarget::fresh("asst_guide"), &r.bus)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::TooShort { millis: 20 }));
        assert_eq!(r.gateway.transcribe_calls(), 0);
        assert_eq!(r.gateway.posted_messages().len(), 0);
    }

    #[tokio::test]
    async fn auto_stopped_recording_still_reaches_transcription() {
        let r = rig();
        r.gateway.script_statuses([RunStatus::Completed]);

        // Device records until the ceiling, then hands back what it has.
        let source = Arc::new(CeilingAudioSource {
            clip: crate::device::AudioClip::new(vec![0u8; 640], Duration::from_secs(2), 16_000),
        });
        let lim = RecordingLimits {
            max_duration: Duration::from_millis(10),
            min_duration: Duration::from_millis(1),
        };

        let reply = pipeline(&r, source, lim)
            .run(&r.threads, &r.executor, ExchangeTarget::fresh("asst_guide"), &r.bus)
            .await
            .unwrap();

        assert_eq!(reply, "assistant reply");
        assert_eq!(r.gateway.transcribe_calls(), 1);
    }

    #[tokio::test]
    async fn cancellation_aborts_without_remote_calls() {
        let r = rig();
        let cancel = CancellationToken::new();
        let p = AudioPipeline::new(
            r.gateway.clone(),
            Arc::new(HangingAudioSource),
            limits(),
            "en",
            cancel.clone(),
        );

        let run = tokio::spawn({
            let threads = ThreadManager::new(r.gateway.clone(), r.store.clone(), default_ttl());
            let executor = RunExecutor::new(
                r.gateway.clone(),
                RunPollConfig {
                    poll_interval_ms: 1,
                    max_poll_attempts: 5,
                },
            );
            let bus = r.bus.clone();
            async move {
                p.run(&threads, &executor, ExchangeTarget::fresh("asst_guide"), &bus)
                    .await
            }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();

        let err = run.await.unwrap().unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert_eq!(r.gateway.transcribe_calls(), 0);
    }

    #[tokio::test]
    async fn fresh_target_creates_a_thread_for_the_exchange() {
        let r = rig();
        r.gateway.script_statuses([RunStatus::Completed]);

        let source = Arc::new(FixedAudioSource::with_duration(Duration::from_secs(2)));
        pipeline(&r, source, limits())
            .run(&r.threads, &r.executor, ExchangeTarget::fresh("asst_guide"), &r.bus)
            .await
            .unwrap();

        assert_eq!(r.gateway.create_thread_calls(), 1);
    }

    #[tokio::test]
    async fn existing_target_posts_to_that_thread() {
        let r = rig();
        r.gateway.script_statuses([RunStatus::Completed]);
        // Seed the store so record_exchange finds the thread.
        let id = r.threads.ensure_active_thread("asst_guide").await.unwrap();

        let source = Arc::new(FixedAudioSource::with_duration(Duration::from_secs(2)));
        pipeline(&r, source, limits())
            .run(
                &r.threads,
                &r.executor,
                ExchangeTarget::existing("asst_guide", id.clone()),
                &r.bus,
            )
            .await
            .unwrap();

        // No second create; the exchange landed on the existing thread.
        assert_eq!(r.gateway.create_thread_calls(), 1);
        assert_eq!(r.gateway.posted_messages()[0].0, id);
    }
}
