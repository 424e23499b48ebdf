//! ConversationGateway trait definition.
//!
//! The core abstraction over the remote conversation system: stateless
//! request functions for thread/message/run manipulation plus the
//! speech-to-text, text-to-speech, and vision conversion calls.
//!
//! Uses native async fn in traits (RPITIT, Rust 2024 edition). The concrete
//! HTTP implementation lives in `visor-infra`; tests substitute in-memory
//! fakes. `create_thread` and `create_run` are NOT idempotent -- the
//! transport retry layer must never re-issue them blindly, since a retried
//! create could mint a duplicate thread or run.

pub mod boxed;

pub use boxed::BoxGateway;

use visor_types::error::GatewayError;
use visor_types::run::RunState;

use crate::device::{AudioClip, Photo};

/// Stateless request/response contract with the remote conversation system.
///
/// All calls require a bearer credential; implementations surface its
/// absence as [`GatewayError::MissingCredential`] without touching the
/// network.
pub trait ConversationGateway: Send + Sync {
    /// Create a new durable conversation thread; returns its opaque id.
    fn create_thread(
        &self,
    ) -> impl std::future::Future<Output = Result<String, GatewayError>> + Send;

    /// Append a user message to a thread.
    fn post_message(
        &self,
        thread_id: &str,
        text: &str,
    ) -> impl std::future::Future<Output = Result<(), GatewayError>> + Send;

    /// Start a run of `agent_id` against the thread's accumulated messages.
    fn create_run(
        &self,
        thread_id: &str,
        agent_id: &str,
    ) -> impl std::future::Future<Output = Result<String, GatewayError>> + Send;

    /// Fetch the current status of a run.
    fn run_status(
        &self,
        thread_id: &str,
        run_id: &str,
    ) -> impl std::future::Future<Output = Result<RunState, GatewayError>> + Send;

    /// The single most recent assistant-authored message on the thread,
    /// or `None` when the thread holds no assistant message.
    fn latest_assistant_message(
        &self,
        thread_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, GatewayError>> + Send;

    /// Speech-to-text for a captured clip.
    fn transcribe(
        &self,
        clip: &AudioClip,
        language: &str,
    ) -> impl std::future::Future<Output = Result<String, GatewayError>> + Send;

    /// Text-to-speech; returns encoded audio ready for playback.
    fn synthesize_speech(
        &self,
        text: &str,
        voice: &str,
        speed: f32,
    ) -> impl std::future::Future<Output = Result<Vec<u8>, GatewayError>> + Send;

    /// Describe a captured still image.
    fn analyze_image(
        &self,
        photo: &Photo,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<String, GatewayError>> + Send;
}
