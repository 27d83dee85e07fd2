//! Retry logic with exponential backoff
//!
//! Used for the calls whose failure would otherwise fail a whole task
//! (chapter catalog resolution) and for the key registration handshake.
//! Per-chapter mirror calls are not retried here; the fallback list is their
//! retry policy.
//!
//! # Example
//!
//! ```no_run
//! use novel_dl::retry::{IsRetryable, retry_with_backoff};
//! use novel_dl::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
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
//! let result = retry_with_backoff(&config, || async {
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{AcquisitionError, Error};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, refused connections, 5xx responses) should
/// return `true`. Everything that would fail the same way again returns `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for AcquisitionError {
    fn is_retryable(&self) -> bool {
        match self {
            AcquisitionError::Transport(_) | AcquisitionError::Timeout(_) => true,
            // A bad handshake or payload is answered by falling back to mirrors
            AcquisitionError::Handshake(_)
            | AcquisitionError::Decrypt(_)
            | AcquisitionError::UnexpectedResponse(_)
            | AcquisitionError::ChapterUnavailable { .. }
            | AcquisitionError::CatalogUnavailable(_) => false,
        }
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect(),
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
            Error::Acquisition(e) => e.is_retryable(),
            Error::Config { .. }
            | Error::Task(_)
            | Error::Serialization(_)
            | Error::NotFound(_)
            | Error::InvalidInput(_)
            | Error::ShuttingDown
            | Error::ApiServerError(_)
            | Error::Other(_) => false,
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// Makes at most `1 + config.max_attempts` calls. Returns the first success,
/// the first non-retryable error, or the last error once retries run out.
pub async fn retry_with_backoff<F, Fut, T, E>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    retry_with_backoff_when(config, operation, E::is_retryable).await
}

/// Like [`retry_with_backoff`], retrying only errors accepted by `retry_if`
///
/// Lets a call site narrow the retry policy, e.g. to hand a timed-out call
/// over to a fallback instead of waiting out another timeout.
pub async fn retry_with_backoff_when<F, Fut, T, E, P>(
    config: &RetryConfig,
    mut operation: F,
    retry_if: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
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
            Err(e) if retry_if(&e) && attempt < config.max_attempts => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                let wait = if config.jitter { add_jitter(delay) } else { delay };
                tokio::time::sleep(wait).await;

                let next_delay =
                    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next_delay.min(config.max_delay);
            }
            Err(e) => {
                if retry_if(&e) {
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

/// Stretch a delay by a random factor in `[1, 2]`
fn add_jitter(delay: Duration) -> Duration {
    let jitter_factor: f64 = rand::thread_rng().gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
