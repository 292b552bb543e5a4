//! Admission control for scan units.
//!
//! The [`Throttle`] hands out at most `limit` permits at a time; a unit runs
//! only while it holds one. Waiting for a permit (or a rate-limit token)
//! always races the session's [`CancelToken`], so a stop request takes
//! effect at the next admission point even while the dispatcher is parked.
//! Units that already hold a permit are never interrupted.

use super::rate_limiter::RateLimiter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cooperative cancellation flag shared between a session and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    state: Arc<CancelState>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Idempotent.
    pub fn cancel(&self) {
        if !self.state.cancelled.swap(true, Ordering::SeqCst) {
            self.state.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking so a concurrent cancel() is not missed.
            let notified = self.state.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Proof of admission; the slot frees when this is dropped.
#[derive(Debug)]
pub struct Permit {
    _permit: OwnedSemaphorePermit,
}

/// Bounded admission gate for probes.
#[derive(Debug)]
pub struct Throttle {
    semaphore: Arc<Semaphore>,
    limit: usize,
    rate: Option<RateLimiter>,
    cancel: CancelToken,
}

impl Throttle {
    pub fn new(limit: usize, rate: Option<RateLimiter>, cancel: CancelToken) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
            rate,
            cancel,
        }
    }

    /// Wait for a free slot. Returns `None` once the session is cancelled.
    pub async fn admit(&self) -> Option<Permit> {
        if self.cancel.is_cancelled() {
            return None;
        }

        if let Some(rate) = &self.rate {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                _ = rate.wait() => {}
            }
        }

        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            permit = Arc::clone(&self.semaphore).acquire_owned() => permit.ok()?,
        };

        // A cancel that landed while the permit was being granted still wins.
        if self.cancel.is_cancelled() {
            return None;
        }
        Some(Permit { _permit: permit })
    }

    /// Probes currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.limit - self.semaphore.available_permits()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_admits_up_to_limit() {
        let throttle = Throttle::new(2, None, CancelToken::new());
        let a = throttle.admit().await.unwrap();
        let _b = throttle.admit().await.unwrap();
        assert_eq!(throttle.in_flight(), 2);

        let blocked = tokio::time::timeout(Duration::from_millis(50), throttle.admit()).await;
        assert!(blocked.is_err(), "third admission should wait");

        drop(a);
        assert_eq!(throttle.in_flight(), 1);
        assert!(throttle.admit().await.is_some());
    }

    #[tokio::test]
    async fn test_cancel_refuses_admission() {
        let cancel = CancelToken::new();
        let throttle = Throttle::new(4, None, cancel.clone());
        cancel.cancel();
        assert!(throttle.admit().await.is_none());
        assert_eq!(throttle.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_cancel_wakes_parked_dispatcher() {
        let cancel = CancelToken::new();
        let throttle = Arc::new(Throttle::new(1, None, cancel.clone()));
        let held = throttle.admit().await.unwrap();

        let waiter = {
            let throttle = Arc::clone(&throttle);
            tokio::spawn(async move { throttle.admit().await.is_some() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let admitted = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("parked admit should wake on cancel")
            .unwrap();
        assert!(!admitted);
        drop(held);
    }

    #[tokio::test]
    async fn test_cancel_wakes_dispatcher_waiting_on_rate() {
        let cancel = CancelToken::new();
        let throttle = Arc::new(Throttle::new(8, RateLimiter::new(1), cancel.clone()));
        // The single burst token goes to the first admission.
        drop(throttle.admit().await.unwrap());

        let waiter = {
            let throttle = Arc::clone(&throttle);
            tokio::spawn(async move { throttle.admit().await.is_some() })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();

        let admitted = tokio::time::timeout(Duration::from_millis(300), waiter)
            .await
            .expect("admit waiting on a rate token should wake on cancel")
            .unwrap();
        assert!(!admitted);
        assert_eq!(throttle.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_future_after_cancel() {
        let cancel = CancelToken::new();
        cancel.cancel();
        cancel.cancel();
        tokio::time::timeout(Duration::from_millis(50), cancel.cancelled())
            .await
            .unwrap();
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_zero_limit_clamped() {
        let throttle = Throttle::new(0, None, CancelToken::new());
        assert_eq!(throttle.limit(), 1);
    }
}
