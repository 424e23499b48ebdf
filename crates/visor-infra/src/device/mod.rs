//! Device implementations for the desktop harness.

pub mod sim;

pub use sim::{LogSpeechSink, SimAudioSource, SimPhotoSource};
