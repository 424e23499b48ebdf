//! Transport-level retry with linear backoff.
//!
//! Re-issues a single gateway request after a transient failure (network
//! error, timeout, 5xx). 4xx responses and credential problems are never
//! retried. This layer is distinct from run-status polling, and it must
//! NEVER wrap `create_thread` or `create_run` -- a blindly retried create
//! can mint a duplicate thread or run.

use tracing::warn;

use visor_types::config::RetryConfig;
use visor_types::error::GatewayError;

/// Run `op` up to `config.max_attempts` times, sleeping
/// `backoff_base * attempt` between attempts while the error stays
/// retryable. The closure receives the 1-based attempt number.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, op: F) -> Result<T, GatewayError>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < config.max_attempts => {
                warn!(attempt, %err, "transient gateway failure, backing off");
                tokio::time::sleep(config.backoff_for(attempt)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            backoff_base_ms: 1,
        }
    }

    fn server_error() -> GatewayError {
        GatewayError::Server {
            status: 503,
            message: "overloaded".to_string(),
        }
    }

    #[tokio::test]
    async fn succeeds_first_try_without_extra_calls() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_retry(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, GatewayError>(42) }
        })
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_failures_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_retry(), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(server_error())
                } else {
                    Ok("recovered")
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_the_budget_and_surfaces_the_last_error() {
        let calls = AtomicU32::new(0);
        let err = with_retry(&fast_retry(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(server_error()) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, GatewayError::Server { status: 503, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_are_never_retried() {
        let calls = AtomicU32::new(0);
        let err = with_retry(&fast_retry(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<(), _>(GatewayError::Client {
                    status: 404,
                    message: "no such thread".to_string(),
                })
            }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, GatewayError::Client { status: 404, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
