//! In-memory fakes shared by the core test suites.
//!
//! `FakeGateway` is a scriptable gateway: tests queue run-status responses
//! and flip failure switches; every call is counted so tests can assert
//! exact interaction counts (poll budgets, single-create guarantees).

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use visor_types::config::RecordingLimits;
use visor_types::error::{DeviceError, GatewayError, StoreError};
use visor_types::run::{RunState, RunStatus};
use visor_types::thread::ThreadRecord;

use crate::device::{AudioClip, AudioSource, Photo, PhotoSource, SpeechSink};
use crate::gateway::ConversationGateway;
use crate::thread::store::{PreferenceStore, ThreadStore};

// ---------------------------------------------------------------------------
// FakeGateway
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeGateway {
    thread_counter: AtomicU32,
    run_counter: AtomicU32,

    create_thread_calls: AtomicU32,
    post_message_calls: AtomicU32,
    create_run_calls: AtomicU32,
    run_status_calls: AtomicU32,
    latest_message_calls: AtomicU32,
    transcribe_calls: AtomicU32,
    synthesize_calls: AtomicU32,
    analyze_calls: AtomicU32,

    fail_create_thread: AtomicBool,
    fail_post_message: AtomicBool,
    fail_synthesize: AtomicBool,

    /// Scripted run-status responses; when exhausted the run stays
    /// `in_progress` forever.
    status_script: Mutex<VecDeque<RunState>>,
    /// Overrides what `latest_assistant_message` returns; unset means the
    /// default canned reply.
    latest_message: Mutex<Option<Option<String>>>,
    /// Every message posted, as `(thread_id, text)`.
    posted: Mutex<Vec<(String, String)>>,
}

impl FakeGateway {
    pub fn script_statuses(&self, statuses: impl IntoIterator<Item = RunStatus>) {
        let mut script = self.status_script.lock().unwrap();
        script.extend(statuses.into_iter().map(|status| RunState {
            status,
            last_error: None,
        }));
    }

    pub fn script_failure(&self, status: RunStatus, message: &str) {
        self.status_script.lock().unwrap().push_back(RunState {
            status,
            last_error: Some(message.to_string()),
        });
    }

    pub fn set_latest_message(&self, message: Option<&str>) {
        *self.latest_message.lock().unwrap() = Some(message.map(str::to_string));
    }

    pub fn fail_create_thread(&self) {
        self.fail_create_thread.store(true, Ordering::SeqCst);
    }

    pub fn fail_post_message(&self) {
        self.fail_post_message.store(true, Ordering::SeqCst);
    }

    pub fn fail_synthesize(&self) {
        self.fail_synthesize.store(true, Ordering::SeqCst);
    }

    pub fn create_thread_calls(&self) -> u32 {
        self.create_thread_calls.load(Ordering::SeqCst)
    }

    pub fn run_status_calls(&self) -> u32 {
        self.run_status_calls.load(Ordering::SeqCst)
    }

    pub fn latest_message_calls(&self) -> u32 {
        self.latest_message_calls.load(Ordering::SeqCst)
    }

    pub fn transcribe_calls(&self) -> u32 {
        self.transcribe_calls.load(Ordering::SeqCst)
    }

    pub fn synthesize_calls(&self) -> u32 {
        self.synthesize_calls.load(Ordering::SeqCst)
    }

    pub fn analyze_calls(&self) -> u32 {
        self.analyze_calls.load(Ordering::SeqCst)
    }

    pub fn posted_messages(&self) -> Vec<(String, String)> {
        self.posted.lock().unwrap().clone()
    }

    fn server_error() -> GatewayError {
        GatewayError::Server {
            status: 500,
            message: "scripted failure".to_string(),
        }
    }
}

impl ConversationGateway for FakeGateway {
    async fn create_thread(&self) -> Result<String, GatewayError> {
        self.create_thread_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_create_thread.load(Ordering::SeqCst) {
            return Err(Self::server_error());
        }
        let n = self.thread_counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("thread_{n}"))
    }

    async fn post_message(&self, thread_id: &str, text: &str) -> Result<(), GatewayError> {
        self.post_message_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_post_message.load(Ordering::SeqCst) {
            return Err(Self::server_error());
        }
        self.posted
            .lock()
            .unwrap()
            .push((thread_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn create_run(&self, _thread_id: &str, _agent_id: &str) -> Result<String, GatewayError> {
        self.create_run_calls.fetch_add(1, Ordering::SeqCst);
        let n = self.run_counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("run_{n}"))
    }

    async fn run_status(&self, _thread_id: &str, _run_id: &str) -> Result<RunState, GatewayError> {
        self.run_status_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.status_script.lock().unwrap().pop_front();
        Ok(next.unwrap_or(RunState {
            status: RunStatus::InProgress,
            last_error: None,
        }))
    }

    async fn latest_assistant_message(
        &self,
        _thread_id: &str,
    ) -> Result<Option<String>, GatewayError> {
        self.latest_message_calls.fetch_add(1, Ordering::SeqCst);
        let guard = self.latest_message.lock().unwrap();
        match guard.as_ref() {
            Some(overridden) => Ok(overridden.clone()),
            None => Ok(Some("assistant reply".to_string())),
        }
    }

    async fn transcribe(&self, _clip: &AudioClip, _language: &str) -> Result<String, GatewayError> {
        self.transcribe_calls.fetch_add(1, Ordering::SeqCst);
        Ok("what am I looking at".to_string())
    }

    async fn synthesize_speech(
        &self,
        _text: &str,
        _voice: &str,
        _speed: f32,
    ) -> Result<Vec<u8>, GatewayError> {
        self.synthesize_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_synthesize.load(Ordering::SeqCst) {
            return Err(Self::server_error());
        }
        Ok(vec![0x52, 0x49, 0x46, 0x46])
    }

    async fn analyze_image(&self, _photo: &Photo, _prompt: &str) -> Result<String, GatewayError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        Ok("a workbench with scattered tools".to_string())
    }
}

// ---------------------------------------------------------------------------
// In-memory stores
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryThreadStore {
    records: Mutex<HashMap<String, ThreadRecord>>,
}

impl MemoryThreadStore {
    /// Insert a record directly, bypassing the manager.
    pub fn seed(&self, record: ThreadRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(record.agent_id.clone(), record);
    }
}

impl ThreadStore for MemoryThreadStore {
    async fn active_thread(&self, agent_id: &str) -> Result<Option<ThreadRecord>, StoreError> {
        Ok(self.records.lock().unwrap().get(agent_id).cloned())
    }

    async fn put_thread(&self, record: &ThreadRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap()
            .insert(record.agent_id.clone(), record.clone());
        Ok(())
    }

    async fn remove_thread(&self, agent_id: &str) -> Result<(), StoreError> {
        self.records.lock().unwrap().remove(agent_id);
        Ok(())
    }

    async fn record_exchange(&self, thread_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap();
        for record in records.values_mut() {
            if record.thread_id == thread_id {
                record.record_exchange(at);
                return Ok(());
            }
        }
        Err(StoreError::NotFound)
    }

    async fn remove_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|_, record| record.created_at >= cutoff);
        Ok((before - records.len()) as u64)
    }

    async fn all_threads(&self) -> Result<Vec<ThreadRecord>, StoreError> {
        Ok(self.records.lock().unwrap().values().cloned().collect())
    }
}

#[derive(Default)]
pub struct MemoryPreferenceStore {
    enabled: AtomicBool,
}

impl MemoryPreferenceStore {
    pub fn with_enabled(enabled: bool) -> Self {
        let store = Self::default();
        store.enabled.store(enabled, Ordering::SeqCst);
        store
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    async fn audio_response_enabled(&self) -> Result<bool, StoreError> {
        Ok(self.enabled.load(Ordering::SeqCst))
    }

    async fn set_audio_response_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        self.enabled.store(enabled, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fake devices
// ---------------------------------------------------------------------------

/// Returns a fixed clip immediately.
pub struct FixedAudioSource {
    pub clip: AudioClip,
}

impl FixedAudioSource {
    pub fn with_duration(duration: Duration) -> Self {
        Self {
            clip: AudioClip::new(vec![0u8; 320], duration, 16_000),
        }
    }
}

impl AudioSource for FixedAudioSource {
    fn capture(
        &self,
        _limits: RecordingLimits,
        _cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<AudioClip, DeviceError>> {
        let clip = self.clip.clone();
        Box::pin(async move { Ok(clip) })
    }
}

/// Records until the ceiling elapses, then auto-stops and hands back the
/// clip -- models a wearer who never taps stop.
pub struct CeilingAudioSource {
    pub clip: AudioClip,
}

impl AudioSource for CeilingAudioSource {
    fn capture(
        &self,
        limits: RecordingLimits,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<AudioClip, DeviceError>> {
        let clip = self.clip.clone();
        Box::pin(async move {
            tokio::select! {
                _ = cancel.cancelled() => Err(DeviceError::Cancelled),
                _ = tokio::time::sleep(limits.max_duration) => Ok(clip),
            }
        })
    }
}

/// Takes a fixed wall-clock delay to "record", then returns the clip --
/// keeps the single-flight slot observably held.
pub struct SlowAudioSource {
    pub delay: Duration,
    pub clip: AudioClip,
}

impl SlowAudioSource {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            clip: AudioClip::new(vec![0u8; 320], Duration::from_secs(2), 16_000),
        }
    }
}

impl AudioSource for SlowAudioSource {
    fn capture(
        &self,
        _limits: RecordingLimits,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<AudioClip, DeviceError>> {
        let clip = self.clip.clone();
        let delay = self.delay;
        Box::pin(async move {
            tokio::select! {
                _ = cancel.cancelled() => Err(DeviceError::Cancelled),
                _ = tokio::time::sleep(delay) => Ok(clip),
            }
        })
    }
}

/// Never completes until cancelled -- for single-flight and abort tests.
pub struct HangingAudioSource;

impl AudioSource for HangingAudioSource {
    fn capture(
        &self,
        _limits: RecordingLimits,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<AudioClip, DeviceError>> {
        Box::pin(async move {
            cancel.cancelled().await;
            Err(DeviceError::Cancelled)
        })
    }
}

pub struct FixedPhotoSource;

impl PhotoSource for FixedPhotoSource {
    fn capture(&self, _cancel: CancellationToken) -> BoxFuture<'_, Result<Photo, DeviceError>> {
        Box::pin(async move { Ok(Photo::jpeg(vec![0xFF, 0xD8, 0xFF])) })
    }
}

/// Collects played clips; never actually makes noise.
#[derive(Default)]
pub struct RecordingSpeechSink {
    played: Mutex<Vec<Vec<u8>>>,
    stopped: AtomicBool,
    fail: AtomicBool,
}

impl RecordingSpeechSink {
    pub fn fail_playback(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn played_count(&self) -> usize {
        self.played.lock().unwrap().len()
    }

    pub fn was_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl SpeechSink for RecordingSpeechSink {
    fn play(
        &self,
        audio: Vec<u8>,
        _cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<(), DeviceError>> {
        Box::pin(async move {
            if self.fail.load(Ordering::SeqCst) {
                return Err(DeviceError::Failed("playback device busy".to_string()));
            }
            self.played.lock().unwrap().push(audio);
            Ok(())
        })
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}
