//! Active-mode orchestrator.
//!
//! The session-level coordinator: enters and exits active mode for a chosen
//! agent, owns the modality pipelines and the speech-output toggle,
//! guarantees single-flight execution on the shared thread, and publishes a
//! uniform event stream for the presentation layer.
//!
//! Two states, Inactive and Active, plus a transient in-flight guard. All
//! session-state mutation funnels through the public methods here; pipelines
//! and the presentation layer never touch persisted state directly.

use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use visor_types::config::{AudioSection, RunPollConfig, SpeechSection, VisorConfig};
use visor_types::error::{PipelineError, SessionError};
use visor_types::event::SessionEvent;

use crate::credentials::CredentialStore;
use crate::device::{AudioSource, PhotoSource, SpeechSink};
use crate::event::SessionBus;
use crate::gateway::ConversationGateway;
use crate::pipeline::{AudioPipeline, ExchangeTarget, PhotoPipeline};
use crate::run::RunExecutor;
use crate::session::state::{ActiveSession, SessionSnapshot};
use crate::thread::manager::ThreadManager;
use crate::thread::store::{PreferenceStore, ThreadStore};

/// The capture and playback devices the orchestrator coordinates.
pub struct DeviceSet {
    pub audio: Arc<dyn AudioSource>,
    pub photo: Arc<dyn PhotoSource>,
    pub speech: Arc<dyn SpeechSink>,
}

/// Orchestrator settings, lifted from the application config.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub run: RunPollConfig,
    pub audio: AudioSection,
    pub speech: SpeechSection,
    pub thread_ttl: chrono::Duration,
}

impl SessionConfig {
    pub fn from_config(config: &VisorConfig) -> Self {
        Self {
            run: config.run.clone(),
            audio: config.audio.clone(),
            speech: config.speech.clone(),
            thread_ttl: config.thread.ttl(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_config(&VisorConfig::default())
    }
}

/// Values cloned out of the live session for one operation.
struct ActiveContext {
    agent_id: String,
    thread_id: String,
    cancel: CancellationToken,
}

/// Session-level coordinator for one head-worn client.
pub struct ActiveModeOrchestrator<G, S, P> {
    gateway: Arc<G>,
    threads: ThreadManager<G, S>,
    executor: RunExecutor<G>,
    prefs: Arc<P>,
    credentials: Arc<dyn CredentialStore>,
    devices: DeviceSet,
    config: SessionConfig,
    bus: SessionBus,
    session: Mutex<Option<ActiveSession>>,
    /// One permit: at most one remote exchange in flight per session.
    in_flight: Arc<Semaphore>,
}

impl<G, S, P> ActiveModeOrchestrator<G, S, P>
where
    G: ConversationGateway,
    S: ThreadStore,
    P: PreferenceStore,
{
    pub fn new(
        gateway: Arc<G>,
        store: Arc<S>,
        prefs: Arc<P>,
        credentials: Arc<dyn CredentialStore>,
        devices: DeviceSet,
        config: SessionConfig,
    ) -> Self {
        let threads = ThreadManager::new(gateway.clone(), store, config.thread_ttl);
        let executor = RunExecutor::new(gateway.clone(), config.run.clone());
        Self {
            gateway,
            threads,
            executor,
            prefs,
            credentials,
            devices,
            config,
            bus: SessionBus::default(),
            session: Mutex::new(None),
            in_flight: Arc::new(Semaphore::new(1)),
        }
    }

    /// The event stream consumed by the presentation layer.
    pub fn bus(&self) -> &SessionBus {
        &self.bus
    }

    /// The thread lifecycle manager (startup housekeeping, listings).
    pub fn threads(&self) -> &ThreadManager<G, S> {
        &self.threads
    }

    /// A point-in-time view for menu rendering and action gating.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let session = self.session.lock().await;
        let audio_response_enabled = self.prefs.audio_response_enabled().await.unwrap_or(false);
        SessionSnapshot {
            is_active: session.is_some(),
            agent_id: session.as_ref().map(|s| s.agent_id.clone()),
            thread_id: session.as_ref().map(|s| s.thread_id.clone()),
            audio_response_enabled,
            busy: self.in_flight.available_permits() == 0,
        }
    }

    /// Enter active mode for `agent_id`.
    ///
    /// Short-circuits on a missing credential before any network call.
    /// On success the session holds a valid (possibly resumed) thread and
    /// `ActiveModeStarted` carries its id. Entering again for the same
    /// agent is a no-op returning the live thread; entering for a
    /// different agent ends the old session first.
    pub async fn enter_active_mode(&self, agent_id: &str) -> Result<String, SessionError> {
        if self.credentials.bearer_token().is_none() {
            self.bus.publish_error("no credential configured");
            return Err(SessionError::MissingCredential);
        }

        let mut session = self.session.lock().await;
        if let Some(existing) = session.as_ref() {
            if existing.agent_id == agent_id {
                return Ok(existing.thread_id.clone());
            }
        }
        // Switching agents ends the old session first.
        if let Some(prior) = session.take() {
            self.end_session(prior);
        }

        self.bus.publish(SessionEvent::StatusUpdate {
            text: "connecting to assistant".to_string(),
        });
        let thread_id = match self.threads.ensure_active_thread(agent_id).await {
            Ok(id) => id,
            Err(err) => {
                self.bus
                    .publish_error(format!("could not start session: {err}"));
                return Err(err.into());
            }
        };

        *session = Some(ActiveSession {
            agent_id: agent_id.to_string(),
            thread_id: thread_id.clone(),
            cancel: CancellationToken::new(),
        });
        info!(agent_id, %thread_id, "active mode entered");
        self.bus.publish(SessionEvent::ActiveModeStarted {
            thread_id: thread_id.clone(),
        });
        Ok(thread_id)
    }

    /// Exit active mode, cancelling any in-flight operation and stopping
    /// speech playback. Idempotent: while already Inactive this is a no-op
    /// -- no callbacks fire, no error is raised.
    pub async fn exit_active_mode(&self) {
        let mut session = self.session.lock().await;
        let Some(active) = session.take() else {
            return;
        };
        info!(agent_id = %active.agent_id, "active mode exited");
        self.end_session(active);
    }

    /// Record an audio message and send it on the current thread.
    pub async fn send_audio(&self) -> Result<(), SessionError> {
        let ctx = self.require_active().await?;
        let _permit = self.acquire_flight()?;

        let pipeline = AudioPipeline::new(
            self.gateway.clone(),
            self.devices.audio.clone(),
            self.config.audio.limits(),
            self.config.audio.language.clone(),
            ctx.cancel.child_token(),
        );
        let target = ExchangeTarget::existing(ctx.agent_id, ctx.thread_id);
        let result = pipeline
            .run(&self.threads, &self.executor, target, &self.bus)
            .await;
        self.finish_exchange(result).await
    }

    /// Capture a photo and send its analysis (plus an optional wearer
    /// question) on the current thread.
    pub async fn send_photo(&self, prompt: Option<String>) -> Result<(), SessionError> {
        let ctx = self.require_active().await?;
        let _permit = self.acquire_flight()?;

        let pipeline = PhotoPipeline::new(
            self.gateway.clone(),
            self.devices.photo.clone(),
            prompt,
            ctx.cancel.child_token(),
        );
        let target = ExchangeTarget::existing(ctx.agent_id, ctx.thread_id);
        let result = pipeline
            .run(&self.threads, &self.executor, target, &self.bus)
            .await;
        self.finish_exchange(result).await
    }

    /// Replace the session's thread with a fresh one.
    pub async fn create_new_thread(&self) -> Result<String, SessionError> {
        let ctx = self.require_active().await?;
        let _permit = self.acquire_flight()?;

        match self.threads.create_new_thread(&ctx.agent_id).await {
            Ok(thread_id) => {
                let mut session = self.session.lock().await;
                if let Some(active) = session.as_mut() {
                    active.thread_id = thread_id.clone();
                }
                self.bus.publish(SessionEvent::ThreadCreated {
                    thread_id: thread_id.clone(),
                });
                Ok(thread_id)
            }
            Err(err) => {
                self.bus
                    .publish_error(format!("could not create thread: {err}"));
                Err(err.into())
            }
        }
    }

    /// Drop the persisted thread for an agent without contacting the
    /// remote system. Only meaningful outside active mode; the navigation
    /// layer does not offer it while a session is live.
    pub async fn clear_thread(&self, agent_id: &str) -> Result<(), SessionError> {
        self.threads.clear_active_thread(agent_id).await?;
        Ok(())
    }

    /// Flip and persist the global audio-response preference.
    pub async fn toggle_audio_response(&self) -> Result<bool, SessionError> {
        let enabled = !self.prefs.audio_response_enabled().await?;
        self.prefs.set_audio_response_enabled(enabled).await?;
        self.bus
            .publish(SessionEvent::AudioResponseToggled { enabled });
        Ok(enabled)
    }

    /// Tear down one session's resources. Caller holds the session lock.
    fn end_session(&self, active: ActiveSession) {
        active.cancel.cancel();
        self.devices.speech.stop();
        self.bus.publish(SessionEvent::ActiveModeEnded);
    }

    async fn require_active(&self) -> Result<ActiveContext, SessionError> {
        let session = self.session.lock().await;
        match session.as_ref() {
            Some(s) => Ok(ActiveContext {
                agent_id: s.agent_id.clone(),
                thread_id: s.thread_id.clone(),
                cancel: s.cancel.clone(),
            }),
            None => {
                self.bus.publish_error("active mode required");
                Err(SessionError::NotActive)
            }
        }
    }

    /// Claim the single-flight slot or reject immediately -- concurrent
    /// operations are never queued or interleaved.
    fn acquire_flight(&self) -> Result<tokio::sync::OwnedSemaphorePermit, SessionError> {
        match self.in_flight.clone().try_acquire_owned() {
            Ok(permit) => Ok(permit),
            Err(_) => {
                self.bus.publish_error("operation already in progress");
                Err(SessionError::Busy)
            }
        }
    }

    /// One funnel for every pipeline outcome.
    async fn finish_exchange(&self, result: Result<String, PipelineError>) -> Result<(), SessionError> {
        match result {
            Ok(text) => {
                self.handle_assistant_response(&text).await;
                Ok(())
            }
            // A cancelled exchange was deliberately abandoned (active mode
            // exited); its late result is discarded without an error event.
            Err(PipelineError::Cancelled) => {
                debug!("exchange cancelled, result discarded");
                Err(SessionError::Pipeline(PipelineError::Cancelled))
            }
            Err(err) => {
                self.bus.publish_error(err.to_string());
                Err(err.into())
            }
        }
    }

    /// Route an assistant reply to the presentation layer and, when the
    /// preference is on, through speech synthesis and playback.
    ///
    /// Text display and audio playback are independent: the text event is
    /// published unconditionally first, and no synthesis or playback
    /// failure retracts it.
    async fn handle_assistant_response(&self, text: &str) {
        self.bus.publish(SessionEvent::AssistantResponse {
            text: text.to_string(),
        });

        let enabled = self.prefs.audio_response_enabled().await.unwrap_or(false);
        if !enabled {
            return;
        }

        let speech = &self.config.speech;
        match self
            .gateway
            .synthesize_speech(text, &speech.voice, speech.speed)
            .await
        {
            Ok(audio) => {
                let cancel = {
                    let session = self.session.lock().await;
                    session
                        .as_ref()
                        .map(|s| s.cancel.child_token())
                        .unwrap_or_default()
                };
                if let Err(err) = self.devices.speech.play(audio, cancel).await {
                    warn!(%err, "speech playback failed");
                    self.bus
                        .publish_error(format!("speech playback failed: {err}"));
                }
            }
            Err(err) => {
                warn!(%err, "speech synthesis failed");
                self.bus
                    .publish_error(format!("speech synthesis failed: {err}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredential;
    use crate::testutil::{
        FakeGateway, FixedAudioSource, FixedPhotoSource, HangingAudioSource,
        MemoryPreferenceStore, MemoryThreadStore, RecordingSpeechSink, SlowAudioSource,
    };
    use std::time::Duration;
    use tokio::sync::broadcast::error::TryRecvError;
    use visor_types::run::RunStatus;

    type TestOrchestrator =
        ActiveModeOrchestrator<FakeGateway, MemoryThreadStore, MemoryPreferenceStore>;

    struct Rig {
        gateway: Arc<FakeGateway>,
        store: Arc<MemoryThreadStore>,
        prefs: Arc<MemoryPreferenceStore>,
        speech: Arc<RecordingSpeechSink>,
    }

    fn fast_config() -> SessionConfig {
        let mut config = SessionConfig::default();
        config.run.poll_interval_ms = 1;
        config.run.max_poll_attempts = 5;
        config.audio.min_recording_ms = 100;
        config
    }

    fn build(
        rig: &Rig,
        credential: StaticCredential,
        audio: Arc<dyn AudioSource>,
    ) -> TestOrchestrator {
        ActiveModeOrchestrator::new(
            rig.gateway.clone(),
            rig.store.clone(),
            rig.prefs.clone(),
            Arc::new(credential),
            DeviceSet {
                audio,
                photo: Arc::new(FixedPhotoSource),
                speech: rig.speech.clone(),
            },
            fast_config(),
        )
    }

    fn rig() -> Rig {
        Rig {
            gateway: Arc::new(FakeGateway::default()),
            store: Arc::new(MemoryThreadStore::default()),
            prefs: Arc::new(MemoryPreferenceStore::default()),
            speech: Arc::new(RecordingSpeechSink::default()),
        }
    }

    fn default_audio() -> Arc<dyn AudioSource> {
        Arc::new(FixedAudioSource::with_duration(Duration::from_secs(2)))
    }

    #[tokio::test]
    async fn missing_credential_short_circuits_before_any_network_call() {
        let r = rig();
        let orch = build(&r, StaticCredential::absent(), default_audio());
        let mut rx = orch.bus().subscribe();

        let err = orch.enter_active_mode("asst_guide").await.unwrap_err();

        assert!(matches!(err, SessionError::MissingCredential));
        assert_eq!(r.gateway.create_thread_calls(), 0);
        assert!(matches!(
            rx.try_recv().unwrap(),
            SessionEvent::Error { .. }
        ));
    }

    #[tokio::test]
    async fn entering_creates_exactly_one_thread_and_announces_it() {
        let r = rig();
        let orch = build(&r, StaticCredential::present("sk-test"), default_audio());
        let mut rx = orch.bus().subscribe();

        let thread_id = orch.enter_active_mode("asst_guide").await.unwrap();

        assert_eq!(r.gateway.create_thread_calls(), 1);
        assert!(matches!(
            rx.try_recv().unwrap(),
            SessionEvent::StatusUpdate { .. }
        ));
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::ActiveModeStarted {
                thread_id: thread_id.clone()
            }
        );
        let snapshot = orch.snapshot().await;
        assert!(snapshot.is_active);
        assert_eq!(snapshot.thread_id.as_deref(), Some(thread_id.as_str()));
    }

    #[tokio::test]
    async fn reentering_for_same_agent_reuses_the_session() {
        let r = rig();
        let orch = build(&r, StaticCredential::present("sk-test"), default_audio());

        let first = orch.enter_active_mode("asst_guide").await.unwrap();
        let second = orch.enter_active_mode("asst_guide").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(r.gateway.create_thread_calls(), 1);
    }

    #[tokio::test]
    async fn exit_while_inactive_is_a_silent_no_op() {
        let r = rig();
        let orch = build(&r, StaticCredential::present("sk-test"), default_audio());
        let mut rx = orch.bus().subscribe();

        orch.exit_active_mode().await;

        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn exit_cancels_in_flight_pipeline_and_stops_speech() {
        let r = rig();
        let orch = Arc::new(build(
            &r,
            StaticCredential::present("sk-test"),
            Arc::new(HangingAudioSource),
        ));
        orch.enter_active_mode("asst_guide").await.unwrap();

        let task = tokio::spawn({
            let orch = orch.clone();
            async move { orch.send_audio().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        orch.exit_active_mode().await;

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Pipeline(PipelineError::Cancelled)
        ));
        assert!(r.speech.was_stopped());
        assert_eq!(r.gateway.transcribe_calls(), 0);
    }

    #[tokio::test]
    async fn send_audio_requires_active_mode() {
        let r = rig();
        let orch = build(&r, StaticCredential::present("sk-test"), default_audio());
        let mut rx = orch.bus().subscribe();

        let err = orch.send_audio().await.unwrap_err();

        assert!(matches!(err, SessionError::NotActive));
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::Error {
                message: "active mode required".to_string()
            }
        );
        // No side effects.
        assert_eq!(r.gateway.transcribe_calls(), 0);
    }

    #[tokio::test]
    async fn concurrent_send_audio_is_single_flight() {
        let r = rig();
        r.gateway.script_statuses([RunStatus::Completed]);
        // Recording takes real time, so the second call arrives while the
        // first still holds the single-flight slot.
        let orch = Arc::new(build(
            &r,
            StaticCredential::present("sk-test"),
            Arc::new(SlowAudioSource::new(Duration::from_millis(50))),
        ));
        orch.enter_active_mode("asst_guide").await.unwrap();

        let (first, second) = tokio::join!(orch.send_audio(), orch.send_audio());

        let results = [first, second];
        let busy = results
            .iter()
            .filter(|result| matches!(result, Err(SessionError::Busy)))
            .count();
        let ok = results.iter().filter(|result| result.is_ok()).count();
        assert_eq!(busy, 1, "exactly one call must be rejected");
        assert_eq!(ok, 1, "exactly one pipeline must execute");
        assert_eq!(r.gateway.transcribe_calls(), 1);
    }

    #[tokio::test]
    async fn new_thread_swaps_the_session_thread_for_later_sends() {
        let r = rig();
        r.gateway.script_statuses([RunStatus::Completed]);
        let orch = build(&r, StaticCredential::present("sk-test"), default_audio());

        let original = orch.enter_active_mode("asst_guide").await.unwrap();
        let replacement = orch.create_new_thread().await.unwrap();
        assert_ne!(original, replacement);

        orch.send_audio().await.unwrap();

        let posted = r.gateway.posted_messages();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].0, replacement, "must post to the new thread");
    }

    #[tokio::test]
    async fn toggle_twice_round_trips_and_persists_across_restart() {
        let r = rig();
        let orch = build(&r, StaticCredential::present("sk-test"), default_audio());

        assert!(orch.toggle_audio_response().await.unwrap());
        assert!(!orch.toggle_audio_response().await.unwrap());
        assert!(orch.toggle_audio_response().await.unwrap());

        // Simulated restart: a new orchestrator over the same store.
        let reborn = build(&r, StaticCredential::present("sk-test"), default_audio());
        assert!(reborn.snapshot().await.audio_response_enabled);
    }

    #[tokio::test]
    async fn response_funnel_speaks_when_preference_is_on() {
        let r = rig();
        r.gateway.script_statuses([RunStatus::Completed]);
        r.prefs.set_audio_response_enabled(true).await.unwrap();
        let orch = build(&r, StaticCredential::present("sk-test"), default_audio());
        let mut rx = orch.bus().subscribe();

        orch.enter_active_mode("asst_guide").await.unwrap();
        orch.send_audio().await.unwrap();

        assert_eq!(r.gateway.synthesize_calls(), 1);
        assert_eq!(r.speech.played_count(), 1);

        // The reply text was published regardless of playback.
        let mut saw_response = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, SessionEvent::AssistantResponse { .. }) {
                saw_response = true;
            }
        }
        assert!(saw_response);
    }

    #[tokio::test]
    async fn playback_failure_never_retracts_the_text() {
        let r = rig();
        r.gateway.script_statuses([RunStatus::Completed]);
        r.prefs.set_audio_response_enabled(true).await.unwrap();
        r.speech.fail_playback();
        let orch = build(&r, StaticCredential::present("sk-test"), default_audio());
        let mut rx = orch.bus().subscribe();

        orch.enter_active_mode("asst_guide").await.unwrap();
        orch.send_audio().await.unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        let response_at = events
            .iter()
            .position(|e| matches!(e, SessionEvent::AssistantResponse { .. }))
            .expect("response text must be published");
        let error_at = events
            .iter()
            .position(|e| matches!(e, SessionEvent::Error { .. }))
            .expect("playback failure must surface");
        assert!(response_at < error_at, "text is published before the failure");
    }

    #[tokio::test]
    async fn synthesis_failure_surfaces_but_keeps_the_text() {
        let r = rig();
        r.gateway.script_statuses([RunStatus::Completed]);
        r.prefs.set_audio_response_enabled(true).await.unwrap();
        r.gateway.fail_synthesize();
        let orch = build(&r, StaticCredential::present("sk-test"), default_audio());
        let mut rx = orch.bus().subscribe();

        orch.enter_active_mode("asst_guide").await.unwrap();
        // The exchange itself still succeeds.
        orch.send_audio().await.unwrap();

        assert_eq!(r.speech.played_count(), 0);
        let mut saw_response = false;
        let mut saw_synthesis_error = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                SessionEvent::AssistantResponse { .. } => saw_response = true,
                SessionEvent::Error { message } if message.contains("synthesis") => {
                    saw_synthesis_error = true;
                }
                _ => {}
            }
        }
        assert!(saw_response);
        assert!(saw_synthesis_error);
    }

    #[tokio::test]
    async fn speech_is_off_by_default() {
        let r = rig();
        r.gateway.script_statuses([RunStatus::Completed]);
        let orch = build(&r, StaticCredential::present("sk-test"), default_audio());

        orch.enter_active_mode("asst_guide").await.unwrap();
        orch.send_audio().await.unwrap();

        assert_eq!(r.gateway.synthesize_calls(), 0);
        assert_eq!(r.speech.played_count(), 0);
    }

    #[tokio::test]
    async fn send_photo_posts_analysis_on_the_session_thread() {
        let r = rig();
        r.gateway.script_statuses([RunStatus::Completed]);
        let orch = build(&r, StaticCredential::present("sk-test"), default_audio());

        let thread_id = orch.enter_active_mode("asst_guide").await.unwrap();
        orch.send_photo(Some("is this safe?".to_string()))
            .await
            .unwrap();

        let posted = r.gateway.posted_messages();
        assert_eq!(posted[0].0, thread_id);
        assert!(posted[0].1.ends_with("is this safe?"));
    }
}
