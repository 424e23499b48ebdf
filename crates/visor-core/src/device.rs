//! Capture and playback device contracts.
//!
//! The raw microphone, camera, and speaker drivers are external
//! collaborators; this module pins down only the seam the pipelines need.
//! The traits return boxed futures so devices can be swapped at runtime
//! behind `Arc<dyn ...>` without a wrapper type per device.
//!
//! Cancellation contract: every capture call receives a
//! [`CancellationToken`]. A device observing cancellation (or hitting the
//! recording ceiling) stops and completes with whatever was captured so
//! far -- the auto-stop path and a manual stop are the same path. A device
//! that cannot produce anything useful returns [`DeviceError::Cancelled`].

use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use visor_types::config::RecordingLimits;
use visor_types::error::DeviceError;

/// A captured audio clip, encoded and ready for transcription upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    /// Encoded single-channel PCM (WAV container).
    pub bytes: Vec<u8>,
    pub duration: Duration,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>, duration: Duration, sample_rate: u32) -> Self {
        Self {
            bytes,
            duration,
            sample_rate,
        }
    }
}

/// A captured still image, compressed under the device's size ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl Photo {
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: "image/jpeg".to_string(),
        }
    }
}

/// Microphone seam. Produces one clip per call.
pub trait AudioSource: Send + Sync {
    /// Record until the ceiling in `limits` elapses or `cancel` fires,
    /// then hand back the captured clip.
    fn capture(
        &self,
        limits: RecordingLimits,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<AudioClip, DeviceError>>;
}

/// Camera seam. Produces one still per call.
pub trait PhotoSource: Send + Sync {
    fn capture(&self, cancel: CancellationToken) -> BoxFuture<'_, Result<Photo, DeviceError>>;
}

/// Speaker seam for synthesized speech output.
pub trait SpeechSink: Send + Sync {
    /// Play an encoded clip to completion or until `cancel` fires.
    fn play(
        &self,
        audio: Vec<u8>,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<(), DeviceError>>;

    /// Stop any in-flight playback immediately. Idempotent.
    fn stop(&self);
}
