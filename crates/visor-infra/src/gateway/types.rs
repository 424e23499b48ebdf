//! Wire types for the assistants-style REST contract.
//!
//! Request and response bodies for threads, messages, runs, transcription,
//! speech synthesis, and vision analysis. Kept private to the gateway
//! module; the rest of the system only sees domain types.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Threads, messages, runs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct ThreadObject {
    pub id: String,
}

/// `POST /threads` takes an empty JSON object.
#[derive(Debug, Serialize)]
pub(super) struct EmptyRequest {}

#[derive(Debug, Serialize)]
pub(super) struct CreateMessageRequest<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateRunRequest<'a> {
    pub assistant_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct RunObject {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub last_error: Option<RunLastError>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RunLastError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct MessageList {
    pub data: Vec<MessageObject>,
}

#[derive(Debug, Deserialize)]
pub(super) struct MessageObject {
    pub role: String,
    pub content: Vec<MessageContentPart>,
}

/// One block of a message body. Non-text blocks are ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(super) enum MessageContentPart {
    Text { text: TextContent },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub(super) struct TextContent {
    pub value: String,
}

/// The newest assistant-authored text in a (descending-ordered) listing.
pub(super) fn extract_assistant_text(list: MessageList) -> Option<String> {
    list.data
        .into_iter()
        .find(|message| message.role == "assistant")
        .and_then(|message| {
            message.content.into_iter().find_map(|part| match part {
                MessageContentPart::Text { text } => Some(text.value),
                MessageContentPart::Unknown => None,
            })
        })
}

// ---------------------------------------------------------------------------
// Conversion endpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct TranscriptionResponse {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub(super) struct SpeechRequest<'a> {
    pub model: &'a str,
    pub input: &'a str,
    pub voice: &'a str,
    pub speed: f32,
}

#[derive(Debug, Serialize)]
pub(super) struct VisionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<VisionMessage<'a>>,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize)]
pub(super) struct VisionMessage<'a> {
    pub role: &'a str,
    pub content: Vec<VisionContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(super) enum VisionContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
pub(super) struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct VisionResponse {
    pub choices: Vec<VisionChoice>,
}

#[derive(Debug, Deserialize)]
pub(super) struct VisionChoice {
    pub message: VisionChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub(super) struct VisionChoiceMessage {
    pub content: String,
}
