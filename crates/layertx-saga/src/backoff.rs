use std::time::Duration;

/// Maps a retry number and a base delay to the delay before the next retry.
pub trait Backoff: Send + Sync {
    fn backoff(&self, attempt: u32, base: Duration) -> Duration;
}

impl<B: Backoff + ?Sized> Backoff for Box<B> {
    fn backoff(&self, attempt: u32, base: Duration) -> Duration {
        (**self).backoff(attempt, base)
    }
}

/// `base * 2^attempt`, saturating at `Duration::MAX`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExponentialBackoff;

impl Backoff for ExponentialBackoff {
    fn backoff(&self, attempt: u32, base: Duration) -> Duration {
        if base.is_zero() {
            return Duration::ZERO;
        }
        1_u128
            .checked_shl(attempt)
            .and_then(|factor| base.as_nanos().checked_mul(factor))
            .map_or(Duration::MAX, saturating_from_nanos)
    }
}

fn saturating_from_nanos(nanos: u128) -> Duration {
    const NANOS_PER_SEC: u128 = 1_000_000_000;
    let Ok(secs) = u64::try_from(nanos / NANOS_PER_SEC) else {
        return Duration::MAX;
    };
    let subsec = u32::try_from(nanos % NANOS_PER_SEC).unwrap_or_default();
    Duration::new(secs, subsec)
}

/// Always `base`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConstantBackoff;

impl Backoff for ConstantBackoff {
    fn backoff(&self, _attempt: u32, base: Duration) -> Duration {
        base
    }
}
