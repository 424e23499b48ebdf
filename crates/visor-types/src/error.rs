//! Error taxonomy for the Visor client.
//!
//! Errors are grouped per failure domain: transport/remote (gateway),
//! persistence (store), thread lifecycle, run execution, modality pipelines,
//! and session orchestration. Configuration errors (a missing credential)
//! are fatal to the requested action only and never crash the process.

use thiserror::Error;

use crate::run::RunStatus;

/// Errors from the remote conversation gateway.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// No bearer credential is configured. Short-circuits before any
    /// network call is made.
    #[error("no credential configured")]
    MissingCredential,

    /// The request never produced an HTTP response (DNS, connect, TLS...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The request timed out at the HTTP layer.
    #[error("request timed out")]
    Timeout,

    /// The credential was rejected (HTTP 401).
    #[error("credential rejected by remote system")]
    Unauthorized,

    /// A 4xx response: caller error, never retried.
    #[error("remote rejected request (HTTP {status}): {message}")]
    Client { status: u16, message: String },

    /// A 5xx response: remote fault, retried with backoff.
    #[error("remote system error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// The response body did not match the wire contract.
    #[error("malformed response: {0}")]
    Deserialization(String),
}

impl GatewayError {
    /// Whether the transport retry layer may re-issue the request.
    ///
    /// Only transient failures qualify; 4xx responses and credential
    /// problems are surfaced immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Transport(_) | GatewayError::Timeout | GatewayError::Server { .. }
        )
    }
}

/// Errors from local capture/playback hardware.
#[derive(Debug, Clone, Error)]
pub enum DeviceError {
    #[error("device unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Failed(String),

    /// The operation was cancelled before the device completed.
    #[error("cancelled")]
    Cancelled,
}

/// Errors from persistent storage (thread store, preference store).
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,
}

/// Errors from the thread lifecycle manager.
#[derive(Debug, Clone, Error)]
pub enum ThreadError {
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from driving a run to completion.
#[derive(Debug, Clone, Error)]
pub enum RunError {
    /// Posting the message or creating the run failed; no polling began.
    #[error("run submission failed: {0}")]
    Submission(GatewayError),

    /// A status poll or message fetch failed at the transport level.
    #[error("gateway error: {0}")]
    Gateway(GatewayError),

    /// The remote system reported a failure terminal state.
    #[error("run {status}: {message}")]
    Remote { status: RunStatus, message: String },

    /// The poll attempt budget was exhausted before a terminal state.
    /// The run's true final state is unknown -- worded distinctly from a
    /// remote-reported failure.
    #[error("run did not finish after {attempts} status checks")]
    PollTimeout { attempts: u32 },

    /// The run completed but the thread holds no assistant message.
    #[error("assistant produced no response")]
    NoResponse,
}

/// Errors from a modality pipeline invocation.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// Local hardware failure. Aborts the pipeline with no remote hand-off.
    #[error("capture failed: {0}")]
    Capture(#[from] DeviceError),

    /// The recording was shorter than the configured minimum.
    #[error("recording too short ({millis} ms)")]
    TooShort { millis: u64 },

    /// Transcription, image analysis, or speech synthesis failed.
    #[error("gateway error: {0}")]
    Gateway(GatewayError),

    #[error(transparent)]
    Thread(#[from] ThreadError),

    #[error(transparent)]
    Run(#[from] RunError),

    /// The invocation was cancelled (active mode exited).
    #[error("operation cancelled")]
    Cancelled,
}

/// Errors from the active-mode orchestrator.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("active mode required")]
    NotActive,

    /// Single-flight rejection: another exchange is already outstanding.
    #[error("operation already in progress")]
    Busy,

    #[error("no credential configured")]
    MissingCredential,

    #[error("unknown agent: '{0}'")]
    UnknownAgent(String),

    #[error(transparent)]
    Thread(#[from] ThreadError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(GatewayError::Transport("connection reset".into()).is_retryable());
        assert!(GatewayError::Timeout.is_retryable());
        assert!(
            GatewayError::Server {
                status: 503,
                message: "overloaded".into()
            }
            .is_retryable()
        );

        assert!(!GatewayError::Unauthorized.is_retryable());
        assert!(
            !GatewayError::Client {
                status: 404,
                message: "no such thread".into()
            }
            .is_retryable()
        );
        assert!(!GatewayError::MissingCredential.is_retryable());
        assert!(!GatewayError::Deserialization("bad json".into()).is_retryable());
    }

    #[test]
    fn poll_timeout_message_names_the_attempt_count() {
        let err = RunError::PollTimeout { attempts: 30 };
        assert_eq!(err.to_string(), "run did not finish after 30 status checks");
    }

    #[test]
    fn remote_error_carries_status_and_message() {
        let err = RunError::Remote {
            status: RunStatus::Failed,
            message: "model unavailable".into(),
        };
        assert_eq!(err.to_string(), "run failed: model unavailable");
    }
}
