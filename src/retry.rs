//! Connection retry with a fixed backoff
//!
//! Connect-phase failures are transient: each failed or timed-out attempt is
//! followed by a fixed delay and another attempt, with no attempt ceiling. The
//! loop only ends on a successful connect, a non-retryable error, or
//! cancellation.
//!
//! # Example
//!
//! ```no_run
//! use nntp_importer::config::{RetryConfig, ServerConfig};
//! use nntp_importer::retry::connect_session;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> nntp_importer::Result<()> {
//! let cancel = CancellationToken::new();
//! let server = ServerConfig::new("news.example.com");
//! if let Some(mut session) = connect_session(&server, &RetryConfig::default(), &cancel).await? {
//!     session.greeting().await?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::{RetryConfig, ServerConfig};
use crate::error::{Error, Result};
use crate::nntp::NntpSession;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Trait for errors that can be classified as retryable or not
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        // Only failures to establish the connection are retried. Anything that
        // goes wrong once a session exists ends the job.
        matches!(self, Error::Connect { .. } | Error::ConnectTimeout { .. })
    }
}

/// Sleep for `duration` unless cancelled first.
///
/// Returns `false` if the token was cancelled.
pub async fn sleep_or_cancelled(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancel.cancelled() => false,
    }
}

/// Run `connect` until it succeeds, waiting `retry_delay` after each retryable failure.
///
/// Returns `Ok(None)` if cancellation is requested before a connection is made.
pub async fn connect_with_retry<F, Fut, T>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut connect: F,
) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut failures: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            return Ok(None);
        }

        let result = tokio::select! {
            result = connect() => result,
            _ = cancel.cancelled() => return Ok(None),
        };

        match result {
            Ok(conn) => {
                if failures > 0 {
                    info!(attempts = failures + 1, "Connected after retry");
                }
                return Ok(Some(conn));
            }
            Err(e) if e.is_retryable() => {
                failures += 1;
                warn!(
                    error = %e,
                    attempt = failures,
                    "Unable to connect, retrying in {} seconds",
                    config.retry_delay.as_secs()
                );
                if !sleep_or_cancelled(cancel, config.retry_delay).await {
                    return Ok(None);
                }
            }
            Err(e) => return Err(e),
        }
    }
}

/// Open an [`NntpSession`] to `server`, retrying forever with the configured backoff
pub async fn connect_session(
    server: &ServerConfig,
    config: &RetryConfig,
    cancel: &CancellationToken,
) -> Result<Option<NntpSession>> {
    connect_with_retry(config, cancel, || {
        NntpSession::connect(server, config.connect_timeout)
    })
    .await
}
