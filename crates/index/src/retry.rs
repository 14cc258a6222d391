use std::future::Future;
use std::time::Duration;

use sa_domain::trace::TraceEvent;

/// Classification of a failure from the embedding/vector-store collaborator.
/// Mirrors the retryable error classes named in the indexing layer's error
/// handling design: rate limiting, server errors, and connection failures
/// are transient; everything else is surfaced immediately.
#[derive(Debug, Clone)]
pub enum RemoteError {
    RateLimited,
    ServerError(u16),
    ConnectionError,
    ConnectionTimeout,
    Permanent(String),
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::RateLimited => write!(f, "rate limited"),
            RemoteError::ServerError(code) => write!(f, "server error {code}"),
            RemoteError::ConnectionError => write!(f, "connection error"),
            RemoteError::ConnectionTimeout => write!(f, "connection timeout"),
            RemoteError::Permanent(msg) => write!(f, "permanent: {msg}"),
        }
    }
}

fn is_retryable(err: &RemoteError) -> bool {
    matches!(
        err,
        RemoteError::RateLimited
            | RemoteError::ServerError(_)
            | RemoteError::ConnectionError
            | RemoteError::ConnectionTimeout
    )
}

/// Runs `operation` with exponential backoff (`base_delay_ms * 2^attempt`)
/// for up to `max_retries` retries beyond the initial attempt. Transient
/// failures are retried; permanent failures (and the final retry) are
/// returned immediately.
pub async fn execute_with_retry<F, Fut, T>(
    operation: &str,
    max_retries: u32,
    base_delay_ms: u64,
    mut f: F,
) -> Result<T, RemoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let mut attempt = 0u32;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retryable = is_retryable(&err);
                TraceEvent::RetryAttempt {
                    operation: operation.to_string(),
                    attempt,
                    max_retries,
                    reason: err.to_string(),
                }
                .emit();
                if !retryable || attempt >= max_retries {
                    return Err(err);
                }
                let delay = base_delay_ms * 2u64.pow(attempt);
                tokio::time::sleep(Duration::from_millis(delay)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let attempts = AtomicU32::new(0);
        let result = execute_with_retry("embed", 2, 1, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(RemoteError::ServerError(503))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fails_fast_on_permanent_error() {
        let attempts = AtomicU32::new(0);
        let result: Result<i32, RemoteError> = execute_with_retry("embed", 3, 1, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(RemoteError::Permanent("bad request".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stops_after_max_retries_exhausted() {
        let attempts = AtomicU32::new(0);
        let result: Result<i32, RemoteError> = execute_with_retry("embed", 2, 1, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(RemoteError::ConnectionTimeout) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
