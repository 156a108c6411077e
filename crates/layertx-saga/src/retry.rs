use std::sync::Arc;
use std::thread;
use std::time::Duration;

use layertx_core::{Context, Error, recover};
use tracing::{debug, warn};

use crate::backoff::{Backoff, ExponentialBackoff};
use crate::jitter::{Jitter, NoJitter};

/// How often and how patiently a failed operation is retried.
pub trait RetryPolicy: Send + Sync {
    /// Retries after the first, unconditional attempt.
    fn attempts(&self) -> u32;

    /// Pause after failed retry `attempt` (1-based) before the next one.
    fn delay(&self, attempt: u32) -> Duration;

    /// Report every failure instead of only the last one.
    fn return_all_errors(&self) -> bool {
        false
    }
}

impl<P: RetryPolicy + ?Sized> RetryPolicy for Box<P> {
    fn attempts(&self) -> u32 {
        (**self).attempts()
    }

    fn delay(&self, attempt: u32) -> Duration {
        (**self).delay(attempt)
    }

    fn return_all_errors(&self) -> bool {
        (**self).return_all_errors()
    }
}

impl<P: RetryPolicy + ?Sized> RetryPolicy for Arc<P> {
    fn attempts(&self) -> u32 {
        (**self).attempts()
    }

    fn delay(&self, attempt: u32) -> Duration {
        (**self).delay(attempt)
    }

    fn return_all_errors(&self) -> bool {
        (**self).return_all_errors()
    }
}

/// Fixed pause between retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantRetry {
    attempts: u32,
    delay: Duration,
    return_all_errors: bool,
}

impl ConstantRetry {
    #[must_use]
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts,
            delay,
            return_all_errors: false,
        }
    }

    #[must_use]
    pub fn with_all_errors(mut self) -> Self {
        self.return_all_errors = true;
        self
    }
}

impl RetryPolicy for ConstantRetry {
    fn attempts(&self) -> u32 {
        self.attempts
    }

    fn delay(&self, _attempt: u32) -> Duration {
        self.delay
    }

    fn return_all_errors(&self) -> bool {
        self.return_all_errors
    }
}

/// Pause computed by a [`Backoff`] strategy, optionally capped, then passed
/// through a [`Jitter`] strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffRetry<B = ExponentialBackoff, J = NoJitter> {
    attempts: u32,
    base: Duration,
    max_delay: Option<Duration>,
    backoff: B,
    jitter: J,
    return_all_errors: bool,
}

impl BackoffRetry {
    /// `base * 2^attempt` without jitter.
    #[must_use]
    pub fn exponential(attempts: u32, base: Duration) -> Self {
        Self::new(attempts, base, ExponentialBackoff, NoJitter)
    }
}

impl<B, J> BackoffRetry<B, J>
where
    B: Backoff,
    J: Jitter,
{
    #[must_use]
    pub fn new(attempts: u32, base: Duration, backoff: B, jitter: J) -> Self {
        Self {
            attempts,
            base,
            max_delay: None,
            backoff,
            jitter,
            return_all_errors: false,
        }
    }

    /// Cap the backoff before jitter is applied.
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    #[must_use]
    pub fn with_jitter<J2: Jitter>(self, jitter: J2) -> BackoffRetry<B, J2> {
        BackoffRetry {
            attempts: self.attempts,
            base: self.base,
            max_delay: self.max_delay,
            backoff: self.backoff,
            jitter,
            return_all_errors: self.return_all_errors,
        }
    }

    #[must_use]
    pub fn with_all_errors(mut self) -> Self {
        self.return_all_errors = true;
        self
    }

    #[must_use]
    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }
}

impl<B, J> RetryPolicy for BackoffRetry<B, J>
where
    B: Backoff,
    J: Jitter,
{
    fn attempts(&self) -> u32 {
        self.attempts
    }

    fn delay(&self, attempt: u32) -> Duration {
        let mut delay = self.backoff.backoff(attempt, self.base);
        if let Some(max_delay) = self.max_delay {
            delay = delay.min(max_delay);
        }
        self.jitter.jitter(delay)
    }

    fn return_all_errors(&self) -> bool {
        self.return_all_errors
    }
}

/// Run `op` once and then retry it according to `policy`.
///
/// The first retry follows the first failure immediately; `policy.delay(n)`
/// is slept after failed retry `n` when another retry follows. The context is
/// checked before every retry.
///
/// # Errors
///
/// - the single failure when `policy.attempts()` is zero
/// - [`Error::Retries`] with one [`Error::Attempt`] per failure when the
///   policy returns all errors, otherwise the last failure
/// - [`Error::RetryInterrupted`] when the context was interrupted between
///   attempts
pub fn retry<P, F>(policy: &P, ctx: &Context, op: F) -> Result<(), Error>
where
    P: RetryPolicy + ?Sized,
    F: Fn(&Context) -> Result<(), Error>,
{
    let mut last = match op(ctx) {
        Ok(()) => return Ok(()),
        Err(error) => error,
    };
    let total = policy.attempts();
    if total == 0 {
        return Err(last);
    }

    let mut failures = Vec::new();
    for attempt in 1..=total {
        if let Err(reason) = ctx.check() {
            failures.push(last);
            warn!(%reason, attempts = failures.len(), "retry interrupted");
            return Err(Error::RetryInterrupted {
                reason,
                attempts: numbered(failures),
            });
        }

        debug!(attempt, of = total, error = %last, "retrying");
        match op(ctx) {
            Ok(()) => {
                debug!(attempt, "retry succeeded");
                return Ok(());
            }
            Err(error) => failures.push(std::mem::replace(&mut last, error)),
        }

        if attempt < total {
            thread::sleep(policy.delay(attempt));
        }
    }

    warn!(attempts = total.saturating_add(1), error = %last, "all attempts failed");
    if policy.return_all_errors() {
        failures.push(last);
        Err(Error::Retries {
            attempts: numbered(failures),
        })
    } else {
        Err(last)
    }
}

fn numbered(failures: Vec<Error>) -> Vec<Error> {
    (0_u32..)
        .zip(failures)
        .map(|(attempt, source)| Error::Attempt {
            attempt,
            source: Box::new(source),
        })
        .collect()
}

/// Decorate `op` with [`retry`].
pub fn with_retry<P, F>(policy: P, op: F) -> impl Fn(&Context) -> Result<(), Error> + Send + Sync
where
    P: RetryPolicy,
    F: Fn(&Context) -> Result<(), Error> + Send + Sync,
{
    move |ctx| retry(&policy, ctx, &op)
}

/// Decorate `op` so that a panic becomes [`Error::Panicked`].
pub fn with_panic_recovery<F>(op: F) -> impl Fn(&Context) -> Result<(), Error> + Send + Sync
where
    F: Fn(&Context) -> Result<(), Error> + Send + Sync,
{
    move |ctx| recover(|| op(ctx))
}
