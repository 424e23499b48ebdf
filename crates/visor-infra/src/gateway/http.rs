//! HttpGateway -- concrete [`ConversationGateway`] over an assistants-style
//! REST endpoint.
//!
//! Thread/message/run calls go to `/threads...` with the assistants beta
//! header; speech-to-text, text-to-speech, and vision analysis use the
//! audio and chat-completions endpoints of the same base URL. The bearer
//! credential is wrapped in [`secrecy::SecretString`] and only exposed when
//! building request headers; a missing credential short-circuits every call
//! before the network is touched.
//!
//! Idempotent calls pass through the linear-backoff retry layer.
//! `create_thread` and `create_run` deliberately do not -- a blind retry
//! could mint a duplicate thread or run.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use visor_core::device::{AudioClip, Photo};
use visor_core::gateway::ConversationGateway;
use visor_types::config::{GatewaySection, RetryConfig};
use visor_types::error::GatewayError;
use visor_types::run::RunState;

use super::retry::with_retry;
use super::types::{
    CreateMessageRequest, CreateRunRequest, EmptyRequest, ImageUrl, MessageList, RunObject,
    SpeechRequest, ThreadObject, TranscriptionResponse, VisionContentPart, VisionMessage,
    VisionRequest, VisionResponse, extract_assistant_text,
};

/// Assistants API version header sent on thread/message/run calls.
const ASSISTANTS_BETA: &str = "assistants=v2";

const TRANSCRIBE_MODEL: &str = "whisper-1";
const SPEECH_MODEL: &str = "tts-1";
const VISION_MODEL: &str = "gpt-4o-mini";
const VISION_MAX_TOKENS: u32 = 500;

/// HTTP implementation of the remote conversation gateway.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    retry: RetryConfig,
}

impl HttpGateway {
    pub fn new(
        config: &GatewaySection,
        api_key: Option<SecretString>,
        retry: RetryConfig,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| GatewayError::Transport(format!("could not build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            retry,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth(&self) -> Result<&SecretString, GatewayError> {
        self.api_key.as_ref().ok_or(GatewayError::MissingCredential)
    }

    /// Issue a request and classify the response status.
    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, GatewayError> {
        let response = builder.send().await.map_err(map_transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(match status.as_u16() {
            401 => GatewayError::Unauthorized,
            s if (400..500).contains(&s) => GatewayError::Client {
                status: s,
                message: body,
            },
            s => GatewayError::Server {
                status: s,
                message: body,
            },
        })
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
        response
            .json()
            .await
            .map_err(|e| GatewayError::Deserialization(e.to_string()))
    }
}

fn map_transport(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(err.to_string())
    }
}

// HttpGateway intentionally does not derive Debug; the SecretString field
// keeps the key out of formatting, but omitting Debug avoids the question.

impl ConversationGateway for HttpGateway {
    async fn create_thread(&self) -> Result<String, GatewayError> {
        let key = self.auth()?;
        let response = self
            .send(
                self.client
                    .post(self.url("/threads"))
                    .bearer_auth(key.expose_secret())
                    .header("OpenAI-Beta", ASSISTANTS_BETA)
                    .json(&EmptyRequest {}),
            )
            .await?;
        let thread: ThreadObject = Self::parse(response).await?;
        Ok(thread.id)
    }

    async fn post_message(&self, thread_id: &str, text: &str) -> Result<(), GatewayError> {
        let key = self.auth()?;
        with_retry(&self.retry, |_| async move {
            self.send(
                self.client
                    .post(self.url(&format!("/threads/{thread_id}/messages")))
                    .bearer_auth(key.expose_secret())
                    .header("OpenAI-Beta", ASSISTANTS_BETA)
                    .json(&CreateMessageRequest {
                        role: "user",
                        content: text,
                    }),
            )
            .await
            .map(|_| ())
        })
        .await
    }

    async fn create_run(&self, thread_id: &str, agent_id: &str) -> Result<String, GatewayError> {
        let key = self.auth()?;
        let response = self
            .send(
                self.client
                    .post(self.url(&format!("/threads/{thread_id}/runs")))
                    .bearer_auth(key.expose_secret())
                    .header("OpenAI-Beta", ASSISTANTS_BETA)
                    .json(&CreateRunRequest {
                        assistant_id: agent_id,
                    }),
            )
            .await?;
        let run: RunObject = Self::parse(response).await?;
        Ok(run.id)
    }

    async fn run_status(&self, thread_id: &str, run_id: &str) -> Result<RunState, GatewayError> {
        let key = self.auth()?;
        let run: RunObject = with_retry(&self.retry, |_| async move {
            let response = self
                .send(
                    self.client
                        .get(self.url(&format!("/threads/{thread_id}/runs/{run_id}")))
                        .bearer_auth(key.expose_secret())
                        .header("OpenAI-Beta", ASSISTANTS_BETA),
                )
                .await?;
            Self::parse(response).await
        })
        .await?;

        Ok(RunState {
            status: run
                .status
                .parse()
                .map_err(GatewayError::Deserialization)?,
            last_error: run.last_error.map(|e| e.message),
        })
    }

    async fn latest_assistant_message(
        &self,
        thread_id: &str,
    ) -> Result<Option<String>, GatewayError> {
        let key = self.auth()?;
        let list: MessageList = with_retry(&self.retry, |_| async move {
            let response = self
                .send(
                    self.client
                        .get(self.url(&format!(
                            "/threads/{thread_id}/messages?order=desc&limit=20"
                        )))
                        .bearer_auth(key.expose_secret())
                        .header("OpenAI-Beta", ASSISTANTS_BETA),
                )
                .await?;
            Self::parse(response).await
        })
        .await?;

        Ok(extract_assistant_text(list))
    }

    async fn transcribe(&self, clip: &AudioClip, language: &str) -> Result<String, GatewayError> {
        let key = self.auth()?;
        let parsed: TranscriptionResponse = with_retry(&self.retry, |_| async move {
            // Multipart forms are single-use; rebuild per attempt.
            let part = reqwest::multipart::Part::bytes(clip.bytes.clone())
                .file_name("capture.wav")
                .mime_str("audio/wav")
                .map_err(|e| GatewayError::Transport(format!("invalid multipart part: {e}")))?;
            let form = reqwest::multipart::Form::new()
                .part("file", part)
                .text("model", TRANSCRIBE_MODEL)
                .text("language", language.to_string());

            let response = self
                .send(
                    self.client
                        .post(self.url("/audio/transcriptions"))
                        .bearer_auth(key.expose_secret())
                        .multipart(form),
                )
                .await?;
            Self::parse(response).await
        })
        .await?;

        Ok(parsed.text)
    }

    async fn synthesize_speech(
        &self,
        text: &str,
        voice: &str,
        speed: f32,
    ) -> Result<Vec<u8>, GatewayError> {
        let key = self.auth()?;
        with_retry(&self.retry, |_| async move {
            let response = self
                .send(
                    self.client
                        .post(self.url("/audio/speech"))
                        .bearer_auth(key.expose_secret())
                        .json(&SpeechRequest {
                            model: SPEECH_MODEL,
                            input: text,
                            voice,
                            speed,
                        }),
                )
                .await?;
            response
                .bytes()
                .await
                .map(|bytes| bytes.to_vec())
                .map_err(map_transport)
        })
        .await
    }

    async fn analyze_image(&self, photo: &Photo, prompt: &str) -> Result<String, GatewayError> {
        let key = self.auth()?;
        let data_url = format!(
            "data:{};base64,{}",
            photo.mime_type,
            BASE64.encode(&photo.bytes)
        );

        let parsed: VisionResponse = with_retry(&self.retry, |_| {
            let data_url = data_url.clone();
            async move {
                let response = self
                    .send(
                        self.client
                            .post(self.url("/chat/completions"))
                            .bearer_auth(key.expose_secret())
                            .json(&VisionRequest {
                                model: VISION_MODEL,
                                messages: vec![VisionMessage {
                                    role: "user",
                                    content: vec![
                                        VisionContentPart::Text { text: prompt },
                                        VisionContentPart::ImageUrl {
                                            image_url: ImageUrl { url: data_url },
                                        },
                                    ],
                                }],
                                max_tokens: VISION_MAX_TOKENS,
                            }),
                    )
                    .await?;
                Self::parse(response).await
            }
        })
        .await?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| GatewayError::Deserialization("empty choices in response".to_string()))
    }
}
