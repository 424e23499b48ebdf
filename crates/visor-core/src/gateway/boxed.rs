//! BoxGateway -- object-safe dynamic dispatch wrapper for ConversationGateway.
//!
//! Three-step pattern:
//! 1. Define an object-safe `ConversationGatewayDyn` trait with boxed futures
//! 2. Blanket-impl `ConversationGatewayDyn` for all `T: ConversationGateway`
//! 3. `BoxGateway` wraps `Box<dyn ConversationGatewayDyn>` and implements
//!    `ConversationGateway` by delegating
//!
//! This lets the application pick the gateway implementation at runtime
//! (HTTP against a configured endpoint, or a simulated gateway) while the
//! orchestration core stays generic over `ConversationGateway`.

use std::future::Future;
use std::pin::Pin;

use visor_types::error::GatewayError;
use visor_types::run::RunState;

use crate::device::{AudioClip, Photo};
use crate::gateway::ConversationGateway;

type BoxedResult<'a, T> = Pin<Box<dyn Future<Output = Result<T, GatewayError>> + Send + 'a>>;

/// Object-safe version of [`ConversationGateway`] with boxed futures.
///
/// Exists solely to enable dynamic dispatch; a blanket implementation is
/// provided for every `ConversationGateway`.
pub trait ConversationGatewayDyn: Send + Sync {
    fn create_thread_boxed(&self) -> BoxedResult<'_, String>;

    fn post_message_boxed<'a>(&'a self, thread_id: &'a str, text: &'a str) -> BoxedResult<'a, ()>;

    fn create_run_boxed<'a>(
        &'a self,
        thread_id: &'a str,
        agent_id: &'a str,
    ) -> BoxedResult<'a, String>;

    fn run_status_boxed<'a>(
        &'a self,
        thread_id: &'a str,
        run_id: &'a str,
    ) -> BoxedResult<'a, RunState>;

    fn latest_assistant_message_boxed<'a>(
        &'a self,
        thread_id: &'a str,
    ) -> BoxedResult<'a, Option<String>>;

    fn transcribe_boxed<'a>(
        &'a self,
        clip: &'a AudioClip,
        language: &'a str,
    ) -> BoxedResult<'a, String>;

    fn synthesize_speech_boxed<'a>(
        &'a self,
        text: &'a str,
        voice: &'a str,
        speed: f32,
    ) -> BoxedResult<'a, Vec<u8>>;

    fn analyze_image_boxed<'a>(
        &'a self,
        photo: &'a Photo,
        prompt: &'a str,
    ) -> BoxedResult<'a, String>;
}

/// Blanket implementation: any `ConversationGateway` is `ConversationGatewayDyn`.
impl<T: ConversationGateway> ConversationGatewayDyn for T {
    fn create_thread_boxed(&self) -> BoxedResult<'_, String> {
        Box::pin(self.create_thread())
    }

    fn post_message_boxed<'a>(&'a self, thread_id: &'a str, text: &'a str) -> BoxedResult<'a, ()> {
        Box::pin(self.post_message(thread_id, text))
    }

    fn create_run_boxed<'a>(
        &'a self,
        thread_id: &'a str,
        agent_id: &'a str,
    ) -> BoxedResult<'a, String> {
        Box::pin(self.create_run(thread_id, agent_id))
    }

    fn run_status_boxed<'a>(
        &'a self,
        thread_id: &'a str,
        run_id: &'a str,
    ) -> BoxedResult<'a, RunState> {
        Box::pin(self.run_status(thread_id, run_id))
    }

    fn latest_assistant_message_boxed<'a>(
        &'a self,
        thread_id: &'a str,
    ) -> BoxedResult<'a, Option<String>> {
        Box::pin(self.latest_assistant_message(thread_id))
    }

    fn transcribe_boxed<'a>(
        &'a self,
        clip: &'a AudioClip,
        language: &'a str,
    ) -> BoxedResult<'a, String> {
        Box::pin(self.transcribe(clip, language))
    }

    fn synthesize_speech_boxed<'a>(
        &'a self,
        text: &'a str,
        voice: &'a str,
        speed: f32,
    ) -> BoxedResult<'a, Vec<u8>> {
        Box::pin(self.synthesize_speech(text, voice, speed))
    }

    fn analyze_image_boxed<'a>(
        &'a self,
        photo: &'a Photo,
        prompt: &'a str,
    ) -> BoxedResult<'a, String> {
        Box::pin(self.analyze_image(photo, prompt))
    }
}

/// Type-erased conversation gateway for runtime selection.
///
/// Since `ConversationGateway` uses RPITIT it cannot be a trait object
/// directly; `BoxGateway` re-implements it by delegating to the inner
/// `ConversationGatewayDyn` object.
pub struct BoxGateway {
    inner: Box<dyn ConversationGatewayDyn>,
}

impl BoxGateway {
    /// Wrap a concrete gateway in a type-erased box.
    pub fn new<T: ConversationGateway + 'static>(gateway: T) -> Self {
        Self {
            inner: Box::new(gateway),
        }
    }
}

impl ConversationGateway for BoxGateway {
    async fn create_thread(&self) -> Result<String, GatewayError> {
        self.inner.create_thread_boxed().await
    }

    async fn post_message(&self, thread_id: &str, text: &str) -> Result<(), GatewayError> {
        self.inner.post_message_boxed(thread_id, text).await
    }

    async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<String, GatewayError> {
        self.inner.create_run_boxed(thread_id, agent_id).await
    }

    async fn run_status(&self, thread_id: &str, run_id: &str) -> Result<RunState, GatewayError> {
        self.inner.run_status_boxed(thread_id, run_id).await
    }

    async fn latest_assistant_message(
        &self,
        thread_id: &str,
    ) -> Result<Option<String>, GatewayError> {
        self.inner.latest_assistant_message_boxed(thread_id).await
    }

    async fn transcribe(&self, clip: &AudioClip, language: &str) -> Result<String, GatewayError> {
        self.inner.transcribe_boxed(clip, language).await
    }

    async fn synthesize_speech(
        &self,
        text: &str,
        voice: &str,
        speed: f32,
    ) -> Result<Vec<u8>, GatewayError> {
        self.inner.synthesize_speech_boxed(text, voice, speed).await
    }

    async fn analyze_image(&self, photo: &Photo, prompt: &str) -> Result<String, GatewayError> {
        self.inner.analyze_image_boxed(photo, prompt).await
    }
}
