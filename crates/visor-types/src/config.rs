//! Configuration types for the Visor client.
//!
//! `VisorConfig` represents the top-level `config.toml`. Every field has a
//! serde default so a missing or partial file still yields a working
//! configuration. The run-poll ceiling and recording ceiling are explicit
//! configuration rather than constants so tests can shrink them.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration, loaded from `{data_dir}/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VisorConfig {
    pub gateway: GatewaySection,
    pub run: RunPollConfig,
    pub retry: RetryConfig,
    pub thread: ThreadSection,
    pub audio: AudioSection,
    pub speech: SpeechSection,
    pub storage: StorageSection,
    /// Static agent registry entries, in display order.
    pub agents: Vec<AgentEntry>,
}

/// `[gateway]` -- remote conversation gateway endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySection {
    pub base_url: String,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,
    /// Environment variable consulted first for the bearer credential.
    pub api_key_env: String,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            request_timeout_secs: 30,
            api_key_env: "VISOR_API_KEY".to_string(),
        }
    }
}

impl GatewaySection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// `[run]` -- run status polling cadence and ceiling.
///
/// The remote execution is asynchronous with no push channel, so the
/// executor polls. The attempt ceiling bounds worst-case latency and keeps
/// the single-flight slot from being held indefinitely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunPollConfig {
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
}

impl Default for RunPollConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            max_poll_attempts: 30,
        }
    }
}

impl RunPollConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// `[retry]` -- transport-level retry for idempotent gateway calls.
///
/// Distinct from run-status polling: this governs re-issuing a single HTTP
/// request after a transient failure. Backoff grows linearly with the
/// attempt number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 500,
        }
    }
}

impl RetryConfig {
    /// Backoff before retry number `attempt` (1-based): `base * attempt`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_base_ms * u64::from(attempt))
    }
}

/// `[audio]` -- recording limits and transcription language.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSection {
    /// Hard ceiling after which recording auto-stops.
    pub max_recording_secs: u64,
    /// Recordings shorter than this are rejected before transcription.
    pub min_recording_ms: u64,
    pub sample_rate: u32,
    pub language: String,
}

impl Default for AudioSection {
    fn default() -> Self {
        Self {
            max_recording_secs: 60,
            min_recording_ms: 1_000,
            sample_rate: 16_000,
            language: "en".to_string(),
        }
    }
}

impl AudioSection {
    pub fn limits(&self) -> RecordingLimits {
        RecordingLimits {
            max_duration: Duration::from_secs(self.max_recording_secs),
            min_duration: Duration::from_millis(self.min_recording_ms),
        }
    }
}

/// Recording duration bounds handed to the audio pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingLimits {
    pub max_duration: Duration,
    pub min_duration: Duration,
}

/// `[speech]` -- synthesized speech output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSection {
    pub voice: String,
    pub speed: f32,
}

impl Default for SpeechSection {
    fn default() -> Self {
        Self {
            voice: "alloy".to_string(),
            speed: 1.0,
        }
    }
}

/// `[storage]` -- persistence location override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Data directory; defaults to `~/.visor` when unset.
    pub data_dir: Option<PathBuf>,
}

/// `[[agents]]` -- one static registry entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEntry {
    pub id: String,
    pub name: String,
    #[serde(default = "default_agent_menu")]
    pub menu: String,
    #[serde(default = "default_agent_active_menu")]
    pub active_menu: String,
}

fn default_agent_menu() -> String {
    "agent_menu".to_string()
}

fn default_agent_active_menu() -> String {
    "agent_active_menu".to_string()
}

/// `[thread]` -- thread lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadSection {
    /// Time-to-live after which a thread is lazily replaced.
    pub ttl_hours: i64,
}

impl Default for ThreadSection {
    fn default() -> Self {
        Self {
            ttl_hours: crate::thread::DEFAULT_THREAD_TTL_HOURS,
        }
    }
}

impl ThreadSection {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.ttl_hours)
    }
}
