//! Rate limiting for network scans.
//!
//! Provides token bucket rate limiting to control the pace of probe
//! admission and prevent network flooding.

use governor::{Quota, RateLimiter as GovLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

type DirectLimiter = GovLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A rate limiter for controlling probe admission speed.
///
/// Uses a token bucket algorithm to enforce a maximum probes-per-second
/// limit. Clones share the same bucket.
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<DirectLimiter>,
}

impl RateLimiter {
    /// Create a limiter allowing `rate` probes per second.
    ///
    /// Returns `None` for a rate of 0, which means unlimited.
    pub fn new(rate: u32) -> Option<Self> {
        let rate = NonZeroU32::new(rate)?;
        let quota = Quota::per_second(rate);
        Some(Self {
            limiter: Arc::new(GovLimiter::direct(quota)),
        })
    }

    /// Wait until a token is available.
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_zero_rate_is_unlimited() {
        assert!(RateLimiter::new(0).is_none());
        assert!(RateLimiter::new(1).is_some());
    }

    #[tokio::test]
    async fn test_rate_limiter_wait() {
        let limiter = RateLimiter::new(1000).unwrap();
        // Wait should complete quickly with high rate
        limiter.wait().await;
    }

    #[tokio::test]
    async fn test_rate_limiter_paces() {
        let limiter = RateLimiter::new(10).unwrap();
        let start = Instant::now();
        for _ in 0..12 {
            limiter.wait().await;
        }
        // The bucket starts full (10 tokens); the last two wait ~100ms each.
        assert!(start.elapsed() >= Duration::from_millis(150));
    }
}
