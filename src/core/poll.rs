//! Polling of asynchronous server operations
//!
//! [`poll`] retries a fallible async action until it succeeds, the attempt
//! cap is reached, or the deadline passes. Only transient errors are
//! retried; anything else is returned immediately.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::defaults;
use crate::core::duration;
use crate::error::{self, CliError};

/// Poll limits
///
/// `tries == 0` means unbounded attempts, `timeout == 0` means no deadline;
/// when both are zero exactly one attempt is made. A zero `delay` selects
/// binary-exponential backoff starting at two seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOptions {
    /// Maximum attempts
    pub tries: u32,
    /// Fixed wait between attempts
    pub delay: Duration,
    /// Overall deadline
    pub timeout: Duration,
}

impl PollOptions {
    /// Exponential backoff bounded by a deadline
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Wait before attempt `attempt + 1`, where `attempt` starts at 1
    pub fn wait_after(&self, attempt: u32) -> Duration {
        if self.delay.is_zero() {
            defaults::POLL_BASE_DELAY.saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
        } else {
            self.delay
        }
    }
}

/// Terminal poll failures
#[derive(Error, Debug)]
pub enum PollError {
    /// Deadline passed
    #[error("timed out after {}, last error: {last:#}", format_timeout(.timeout))]
    TimedOut {
        timeout: Duration,
        last: anyhow::Error,
    },

    /// Attempt cap reached
    #[error("after {attempts} attempts, last error: {last:#}")]
    Exhausted { attempts: u32, last: anyhow::Error },
}

fn format_timeout(timeout: &Duration) -> String {
    duration::format(*timeout)
}

/// Retry `action` according to `options`
pub async fn poll<T, F, Fut>(
    cancel: &CancellationToken,
    options: PollOptions,
    mut action: F,
) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let deadline = (!options.timeout.is_zero()).then(|| Instant::now() + options.timeout);
    let mut attempts = 0u32;
    let mut last: Option<anyhow::Error> = None;

    loop {
        if let (Some(deadline), Some(_)) = (deadline, last.as_ref()) {
            if Instant::now() >= deadline {
                return Err(PollError::TimedOut {
                    timeout: options.timeout,
                    last: last.take().unwrap_or_else(|| anyhow::anyhow!("no attempts made")),
                }
                .into());
            }
        }
        if cancel.is_cancelled() {
            return Err(CliError::Cancel.into());
        }

        attempts += 1;
        tracing::debug!("poll attempt {}", attempts);
        let err = match action().await {
            Ok(value) => return Ok(value),
            Err(err) if !error::is_transient(&err) => return Err(err),
            Err(err) => err,
        };

        if options.tries == 0 && deadline.is_none() {
            return Err(err);
        }
        if options.tries > 0 && attempts >= options.tries {
            return Err(PollError::Exhausted {
                attempts,
                last: err,
            }
            .into());
        }
        last = Some(err);

        let mut wait = options.wait_after(attempts);
        if let Some(deadline) = deadline {
            wait = wait.min(deadline.saturating_duration_since(Instant::now()));
        }
        tokio::select! {
            () = tokio::time::sleep(wait) => {}
            () = cancel.cancelled() => return Err(CliError::Cancel.into()),
        }
    }
}
