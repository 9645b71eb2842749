use std::{num::NonZeroU32, thread};

use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};

/// The admission gate consulted before every task is enqueued.
///
/// Any limiter that can block the calling thread until a permit is
/// available can be injected with
/// [`PoolBuilder::limiter`](crate::PoolBuilder::limiter).
pub trait Limiter: Send + Sync {
    /// Blocks until one permit is available and consumes it.
    fn take(&self);
}

/// A [`Limiter`] backed by `governor`'s direct in-memory limiter.
///
/// The burst size is one, so permits are evenly spaced: the first is
/// granted immediately, every following one `1/rate` seconds after
/// the previous.
pub struct GovernorLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    clock: DefaultClock,
}

impl GovernorLimiter {
    /// Creates a limiter granting `rate` permits per second.
    #[must_use]
    pub fn per_second(rate: NonZeroU32) -> Self {
        let clock = DefaultClock::default();
        let quota = Quota::per_second(rate).allow_burst(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct_with_clock(quota, &clock),
            clock,
        }
    }
}

impl Limiter for GovernorLimiter {
    fn take(&self) {
        while let Err(not_until) = self.limiter.check() {
            thread::sleep(not_until.wait_time_from(self.clock.now()));
        }
    }
}

impl std::fmt::Debug for GovernorLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GovernorLimiter").finish_non_exhaustive()
    }
}
