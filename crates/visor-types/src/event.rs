//! Session event types for the Visor presentation stream.
//!
//! `SessionEvent` is the unified event type broadcast by the active-mode
//! orchestrator and the modality pipelines. The presentation layer
//! subscribes to one stream and renders every variant; pipeline stage
//! markers let it show progressive feedback during an exchange.
//!
//! All variants are Clone + Send + Sync for use with tokio broadcast
//! channels.

use serde::{Deserialize, Serialize};

/// Events emitted during an active-mode session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Freeform progress text for the display.
    StatusUpdate { text: String },

    /// Audio pipeline: the microphone is live.
    RecordingStarted,

    /// Audio pipeline: capture finished, transcription underway.
    ProcessingStarted,

    /// Photo pipeline: the camera is being engaged.
    CaptureStarted,

    /// Photo pipeline: a still image was captured.
    PhotoCaptured,

    /// Photo pipeline: image analysis call in flight.
    VisionAnalysisStarted,

    /// Photo pipeline: analysis text handed to the agent run.
    AssistantProcessingStarted,

    /// The assistant's reply text. Always emitted, independent of any
    /// speech playback that may follow.
    AssistantResponse { text: String },

    /// A user-visible error. Every pipeline or session failure surfaces
    /// as exactly one of these.
    Error { message: String },

    /// Active mode was entered; carries the live thread id.
    ActiveModeStarted { thread_id: String },

    /// Active mode was exited and resources released.
    ActiveModeEnded,

    /// A fresh thread replaced the current one.
    ThreadCreated { thread_id: String },

    /// The audio-response preference was flipped.
    AudioResponseToggled { enabled: bool },
}
