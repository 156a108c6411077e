use std::time::Duration;

use rand::Rng;

/// Randomizes a computed delay so that many callers retrying the same
/// failure do not retry in lockstep.
pub trait Jitter: Send + Sync {
    fn jitter(&self, delay: Duration) -> Duration;
}

impl<J: Jitter + ?Sized> Jitter for Box<J> {
    fn jitter(&self, delay: Duration) -> Duration {
        (**self).jitter(delay)
    }
}

/// Leaves the delay unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoJitter;

impl Jitter for NoJitter {
    fn jitter(&self, delay: Duration) -> Duration {
        delay
    }
}

/// Uniform in `[0, delay)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FullJitter;

impl Jitter for FullJitter {
    fn jitter(&self, delay: Duration) -> Duration {
        random_below(delay)
    }
}

/// `delay / 2` plus uniform in `[0, delay / 2)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EqualJitter;

impl Jitter for EqualJitter {
    fn jitter(&self, delay: Duration) -> Duration {
        let half = delay / 2;
        half + random_below(half)
    }
}

fn random_below(bound: Duration) -> Duration {
    let nanos = u64::try_from(bound.as_nanos()).unwrap_or(u64::MAX);
    if nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rand::thread_rng().gen_range(0..nanos))
}
