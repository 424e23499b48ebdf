//! Simulated capture and playback devices.
//!
//! The real microphone/camera/speaker drivers belong to the wearable
//! firmware and are out of scope here. These stand-ins let the desktop
//! harness drive the full orchestration path: the audio source produces a
//! silence WAV (or a clip loaded from disk), the photo source a placeholder
//! JPEG (or an image file), and the speech sink logs playback instead of
//! making noise. All of them honor cancellation.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use visor_core::device::{AudioClip, AudioSource, Photo, PhotoSource, SpeechSink};
use visor_types::config::RecordingLimits;
use visor_types::error::DeviceError;

/// How long the simulated devices pretend to work before completing.
const CAPTURE_LATENCY: Duration = Duration::from_millis(150);

/// Duration of the synthetic recording when no clip file is configured.
const SYNTHETIC_CLIP: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

/// Simulated microphone.
pub struct SimAudioSource {
    sample_rate: u32,
    /// Optional pre-recorded clip substituted for the microphone.
    clip_path: Option<PathBuf>,
}

impl SimAudioSource {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            clip_path: None,
        }
    }

    pub fn from_file(sample_rate: u32, path: PathBuf) -> Self {
        Self {
            sample_rate,
            clip_path: Some(path),
        }
    }
}

impl AudioSource for SimAudioSource {
    fn capture(
        &self,
        limits: RecordingLimits,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<AudioClip, DeviceError>> {
        Box::pin(async move {
            tokio::select! {
                _ = cancel.cancelled() => return Err(DeviceError::Cancelled),
                _ = tokio::time::sleep(CAPTURE_LATENCY) => {}
            }

            match &self.clip_path {
                Some(path) => {
                    let bytes = std::fs::read(path).map_err(|e| {
                        DeviceError::Unavailable(format!("clip file {}: {e}", path.display()))
                    })?;
                    // Duration of a canned clip is taken at face value as
                    // the ceiling; the remote side sees the real content.
                    Ok(AudioClip::new(bytes, limits.max_duration, self.sample_rate))
                }
                None => {
                    let duration = SYNTHETIC_CLIP.min(limits.max_duration);
                    debug!(?duration, "synthesizing silent clip");
                    Ok(AudioClip::new(
                        silence_wav(duration, self.sample_rate),
                        duration,
                        self.sample_rate,
                    ))
                }
            }
        })
    }
}

/// A minimal 16-bit mono PCM WAV of silence.
fn silence_wav(duration: Duration, sample_rate: u32) -> Vec<u8> {
    let samples = (u64::from(sample_rate) * duration.as_millis() as u64 / 1000) as u32;
    let data_len = samples * 2;

    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes()); // block align
    out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.resize(44 + data_len as usize, 0);
    out
}

// ---------------------------------------------------------------------------
// Photo
// ---------------------------------------------------------------------------

/// Simulated camera.
pub struct SimPhotoSource {
    image_path: Option<PathBuf>,
}

impl SimPhotoSource {
    pub fn new() -> Self {
        Self { image_path: None }
    }

    pub fn from_file(path: PathBuf) -> Self {
        Self {
            image_path: Some(path),
        }
    }
}

impl Default for SimPhotoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PhotoSource for SimPhotoSource {
    fn capture(&self, cancel: CancellationToken) -> BoxFuture<'_, Result<Photo, DeviceError>> {
        Box::pin(async move {
            tokio::select! {
                _ = cancel.cancelled() => return Err(DeviceError::Cancelled),
                _ = tokio::time::sleep(CAPTURE_LATENCY) => {}
            }

            match &self.image_path {
                Some(path) => {
                    let bytes = std::fs::read(path).map_err(|e| {
                        DeviceError::Unavailable(format!("image file {}: {e}", path.display()))
                    })?;
                    Ok(Photo::jpeg(bytes))
                }
                // SOI + EOI markers: enough for the harness to move bytes
                // through the pipeline.
                None => Ok(Photo::jpeg(vec![0xFF, 0xD8, 0xFF, 0xD9])),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Speech output
// ---------------------------------------------------------------------------

/// Logs playback instead of producing sound.
pub struct LogSpeechSink {
    /// Cancelled by `stop()` and replaced on the next `play()`.
    current: Mutex<CancellationToken>,
}

impl LogSpeechSink {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(CancellationToken::new()),
        }
    }
}

impl Default for LogSpeechSink {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechSink for LogSpeechSink {
    fn play(
        &self,
        audio: Vec<u8>,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<(), DeviceError>> {
        let stop = {
            let mut current = self.current.lock().unwrap();
            *current = CancellationToken::new();
            current.clone()
        };
        Box::pin(async move {
            debug!(bytes = audio.len(), "playing synthesized speech");
            // Pretend playback takes a moment, interruptible both by the
            // session token and by stop().
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = stop.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_millis(200)) => {}
            }
            Ok(())
        })
    }

    fn stop(&self) {
        self.current.lock().unwrap().cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_wav_has_riff_header_and_expected_length() {
        let wav = silence_wav(Duration::from_secs(1), 16_000);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        // 44-byte header + 16k samples * 2 bytes.
        assert_eq!(wav.len(), 44 + 32_000);
    }

    #[tokio::test]
    async fn sim_audio_honors_the_recording_ceiling() {
        let source = SimAudioSource::new(16_000);
        let limits = RecordingLimits {
            max_duration: Duration::from_millis(500),
            min_duration: Duration::from_millis(10),
        };

        let clip = source
            .capture(limits, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(clip.duration, Duration::from_millis(500));
        assert_eq!(clip.sample_rate, 16_000);
    }

    #[tokio::test]
    async fn cancelled_capture_reports_cancellation() {
        let source = SimAudioSource::new(16_000);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = source
            .capture(
                RecordingLimits {
                    max_duration: Duration::from_secs(1),
                    min_duration: Duration::from_millis(10),
                },
                cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::Cancelled));
    }

    #[tokio::test]
    async fn photo_placeholder_is_jpeg_tagged() {
        let photo = SimPhotoSource::new()
            .capture(CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(photo.mime_type, "image/jpeg");
        assert_eq!(&photo.bytes[0..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn stop_interrupts_playback() {
        let sink = LogSpeechSink::new();
        let fut = sink.play(vec![0u8; 64], CancellationToken::new());
        sink.stop();
        // Completes promptly instead of sleeping out the playback window.
        tokio::time::timeout(Duration::from_millis(100), fut)
            .await
            .expect("stop must interrupt playback")
            .unwrap();
    }
}
