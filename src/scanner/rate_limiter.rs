//! Request pacing for the path prober.
//!
//! Token bucket limiter so a large wordlist does not hammer the target.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;

type DirectLimiter = GovLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared requests-per-second limiter. Clones draw from the same bucket.
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<DirectLimiter>,
}

impl RateLimiter {
    /// Limit to `rate` requests per second with no burst allowance.
    pub fn new(rate: NonZeroU32) -> Self {
        Self::with_burst(rate, nonzero!(1u32))
    }

    /// Limiter for an optional configured rate; `0` means unlimited.
    pub fn per_second(rate: u32) -> Option<Self> {
        NonZeroU32::new(rate).map(Self::new)
    }

    /// Allow a burst of up to `burst` requests before pacing starts.
    pub fn with_burst(rate: NonZeroU32, burst: NonZeroU32) -> Self {
        let quota = Quota::per_second(rate).allow_burst(burst);
        Self {
            limiter: Arc::new(GovLimiter::direct(quota)),
        }
    }

    /// Wait until the next request may be sent.
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish_non_exhaustive()
    }
}
