//! Retry logic with exponential backoff
//!
//! Used around the fetch stage, where the remote platform occasionally answers
//! with throttling or dropped connections. Delays grow exponentially and can be
//! jittered so parallel workers do not retry in lockstep.
//!
//! # Example
//!
//! ```no_run
//! use music_downloader::retry::{IsRetryable, with_retry};
//! use music_downloader::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! with_retry(&config, || async {
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, SourceError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Diagnostic fragments (lowercased) that mark a platform failure as temporary
const TRANSIENT_PATTERNS: &[&str] = &[
    "timed out",
    "timeout",
    "temporary failure",
    "connection reset",
    "connection refused",
    "network is unreachable",
    "http error 429",
    "too many requests",
    "http error 500",
    "http error 502",
    "http error 503",
    "http error 504",
    "incompleteread",
];

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, throttling, connection reset) should return `true`.
/// Permanent failures (invalid URL, private video, transcoder rejection) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

fn looks_transient(reason: &str) -> bool {
    let lower = reason.to_lowercase();
    TRANSIENT_PATTERNS.iter().any(|p| lower.contains(p))
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Source(e) => match e {
                SourceError::FetchFailed { reason, .. }
                | SourceError::ResolveFailed { reason, .. } => looks_transient(reason),
                // The URL and the stream list will not change between attempts
                SourceError::InvalidUrl { .. }
                | SourceError::NoAudioStream { .. }
                | SourceError::MalformedMetadata { .. } => false,
            },
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            Error::ExternalTool(msg) => looks_transient(msg),
            Error::Transcode(_)
            | Error::Tag(_)
            | Error::Config { .. }
            | Error::InvalidState { .. }
            | Error::DuplicateDestination(_)
            | Error::Cancelled
            | Error::Timeout { .. }
            | Error::Serialization(_)
            | Error::NotSupported(_)
            | Error::Other(_) => false,
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// `config.max_attempts` counts retries, so the operation runs at most
/// `max_attempts + 1` times. Returns the last error once attempts are exhausted
/// or as soon as a non-retryable error occurs.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                let jittered_delay = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };

                tokio::time::sleep(jittered_delay).await;

                let next_delay =
                    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next_delay.min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(error = %e, "Operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Add random jitter to a delay
///
/// The result lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    let jittered_secs = delay.as_secs_f64() * (1.0 + jitter_factor);
    Duration::from_secs_f64(jittered_secs)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    const URL: &str = "https://www.youtube.com/watch?v=x";

    fn resolve_failed(reason: &str) -> Error {
        Error::Source(SourceError::ResolveFailed {
            url: URL.to_string(),
            reason: reason.to_string(),
        })
    }

    fn fetch_failed(reason: &str) -> Error {
        Error::Source(SourceError::FetchFailed {
            url: URL.to_string(),
            reason: reason.to_string(),
        })
    }

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    /// Run `with_retry` over an operation that fails with `failures` in order,
    /// then succeeds. Returns the result and the number of calls.
    async fn run_script(
        config: &RetryConfig,
        failures: Vec<Error>,
    ) -> (Result<&'static str, Error>, u32) {
        let script = Mutex::new(VecDeque::from(failures));
        let calls = AtomicU32::new(0);
        let (script, calls_ref) = (&script, &calls);

        let result = with_retry(config, || async move {
            calls_ref.fetch_add(1, Ordering::SeqCst);
            let next = script.lock().unwrap().pop_front();
            match next {
                Some(e) => Err(e),
                None => Ok("resolved"),
            }
        })
        .await;

        (result, calls.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn throttling_and_server_errors_are_retried_until_resolved() {
        let (result, calls) = run_script(
            &fast_config(3),
            vec![
                resolve_failed("ERROR: [youtube] x: HTTP Error 429: Too Many Requests"),
                fetch_failed("ERROR: unable to download video data: HTTP Error 503"),
            ],
        )
        .await;

        assert_eq!(result.unwrap(), "resolved");
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn unavailable_video_fails_on_first_attempt() {
        let (result, calls) = run_script(
            &fast_config(3),
            vec![resolve_failed("ERROR: [youtube] x: Video unavailable")],
        )
        .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("Video unavailable"), "got: {}", err);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn persistent_connection_reset_returns_last_error() {
        let failures = (1..=5)
            .map(|n| Error::ExternalTool(format!("attempt {}: Connection reset by peer", n)))
            .collect();

        let (result, calls) = run_script(&fast_config(2), failures).await;

        assert_eq!(calls, 3, "first attempt plus two retries");
        assert!(result.unwrap_err().to_string().contains("attempt 3"));
    }

    #[tokio::test]
    async fn zero_retries_runs_once_even_when_transient() {
        let (result, calls) =
            run_script(&fast_config(0), vec![fetch_failed("ERROR: Read timed out.")]).await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn backoff_grows_until_capped() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(25),
            backoff_multiplier: 3.0,
            jitter: false,
        };
        let stamps = Mutex::new(Vec::new());
        let stamps_ref = &stamps;

        let result = with_retry(&config, || async move {
            stamps_ref.lock().unwrap().push(Instant::now());
            Err::<(), _>(fetch_failed("ERROR: HTTP Error 502: Bad Gateway"))
        })
        .await;

        assert!(result.is_err());
        let stamps = stamps.into_inner().unwrap();
        assert_eq!(stamps.len(), 4);

        // 10ms, then 30ms capped to 25ms, then 25ms
        let expected = [10, 25, 25].map(Duration::from_millis);
        for (gap, min) in stamps.windows(2).map(|w| w[1] - w[0]).zip(expected) {
            assert!(gap >= min, "gap {:?} shorter than {:?}", gap, min);
            assert!(gap < Duration::from_secs(1), "gap {:?} ignores the cap", gap);
        }
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let delay = Duration::from_millis(100);
        for _ in 0..20 {
            let jittered = add_jitter(delay);
            assert!(jittered >= delay);
            assert!(jittered <= delay * 2);
        }
    }

    #[test]
    fn test_throttled_fetch_is_retryable() {
        let err = Error::Source(SourceError::FetchFailed {
            url: "https://www.youtube.com/watch?v=x".to_string(),
            reason: "ERROR: unable to download video data: HTTP Error 429: Too Many Requests"
                .to_string(),
        });
        assert!(err.is_retryable());
    }

    #[test]
    fn test_unavailable_video_is_not_retryable() {
        let err = Error::Source(SourceError::ResolveFailed {
            url: "https://www.youtube.com/watch?v=x".to_string(),
            reason: "ERROR: [youtube] x: Video unavailable".to_string(),
        });
        assert!(!err.is_retryable());

        let err = Error::Source(SourceError::InvalidUrl {
            url: "nope".to_string(),
            reason: "relative URL without a base".to_string(),
        });
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_is_retryable_io() {
        let timeout = Error::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "t"));
        assert!(timeout.is_retryable());
        let missing = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "n"));
        assert!(!missing.is_retryable());
    }

    #[test]
    fn test_cancellation_is_never_retried() {
        assert!(!Error::Cancelled.is_retryable());
        assert!(
            !Error::Timeout {
                stage: "fetch".to_string(),
                limit: Duration::from_secs(1),
            }
            .is_retryable()
        );
    }
}
