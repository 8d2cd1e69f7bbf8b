//! Retry-with-delay primitive shared by resource lookups and stack waits.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{Error, Result};

/// Default delay between two attempts.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(10);

/// How often and how long an operation is retried.
///
/// `retries` counts the attempts made after the first one: `0` means a single
/// attempt and a negative value retries forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: i64,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 0,
            delay: DEFAULT_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: i64, delay: Duration) -> Self {
        Self { retries, delay }
    }

    /// Retry forever.
    pub fn unbounded(delay: Duration) -> Self {
        Self { retries: -1, delay }
    }

    pub fn is_unbounded(&self) -> bool {
        self.retries < 0
    }

    /// Whether another attempt may follow `attempts` failed ones.
    pub fn allows_another(&self, attempts: u64) -> bool {
        self.is_unbounded() || attempts <= self.retries as u64
    }
}

/// The last error of an operation that ran out of attempts.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u64,
    pub last: E,
}

/// Run `op` until it succeeds or the policy runs out of attempts.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    subject: &str,
    mut op: F,
) -> std::result::Result<T, Exhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Display,
{
    let mut attempts = 0u64;
    loop {
        attempts += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if policy.allows_another(attempts) => {
                warn!(subject, attempt = attempts, error = %e, "Not ready, retrying");
                sleep(policy.delay).await;
            }
            Err(e) => return Err(Exhausted { attempts, last: e }),
        }
    }
}

/// Poll a status until it is complete or failed.
///
/// `cached` is consumed as the first observation instead of calling `fetch`,
/// which avoids a redundant call right after a status-changing operation.
/// A failed status becomes [`Error::StackFailed`]; running out of attempts
/// becomes [`Error::ExhaustedRetries`].
pub async fn poll_until_terminal<S, F, Fut, C, X>(
    policy: &RetryPolicy,
    subject: &str,
    mut cached: Option<S>,
    mut fetch: F,
    is_complete: C,
    is_failed: X,
) -> Result<S>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<S>>,
    C: Fn(&S) -> bool,
    X: Fn(&S) -> bool,
    S: Display,
{
    let mut attempts = 0u64;
    loop {
        attempts += 1;
        let status = match cached.take() {
            Some(status) => status,
            None => fetch().await?,
        };

        if is_complete(&status) {
            return Ok(status);
        }
        if is_failed(&status) {
            return Err(Error::StackFailed {
                stack: subject.to_string(),
                status: status.to_string(),
            });
        }
        if !policy.allows_another(attempts) {
            return Err(Error::ExhaustedRetries {
                subject: subject.to_string(),
                attempts,
            });
        }

        debug!(subject, %status, attempt = attempts, "Waiting");
        sleep(policy.delay).await;
    }
}
