//! Concurrency and pacing limits for outbound requests.
//!
//! A [`RateLimiter`] caps how many requests are in flight at once and, when
//! configured, paces request starts to a per-second quota. Clones share the
//! same budget.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::Quota;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::source::SourceError;

type DirectRateLimiter = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Clone)]
pub struct RateLimiter {
    in_flight: Arc<Semaphore>,
    pacing: Option<Arc<DirectRateLimiter>>,
    max_in_flight: usize,
}

/// Held for the duration of one request; dropping it frees the slot.
#[derive(Debug)]
pub struct RatePermit {
    _permit: OwnedSemaphorePermit,
}

impl RateLimiter {
    /// `max_in_flight` is clamped to at least one. A `requests_per_second` of
    /// `None` or zero disables pacing.
    pub fn new(max_in_flight: usize, requests_per_second: Option<u32>) -> Self {
        let max_in_flight = max_in_flight.max(1);
        let pacing = requests_per_second
            .and_then(NonZeroU32::new)
            .map(|rate| Quota::per_second(rate).allow_burst(NonZeroU32::MIN))
            .map(|quota| Arc::new(governor::RateLimiter::direct(quota)));

        Self {
            in_flight: Arc::new(Semaphore::new(max_in_flight)),
            pacing,
            max_in_flight,
        }
    }

    /// Wait for a free slot, then for pacing budget. Pacing allows no burst.
    pub async fn acquire(&self) -> Result<RatePermit, SourceError> {
        let permit = Arc::clone(&self.in_flight)
            .acquire_owned()
            .await
            .map_err(|_| SourceError::internal("rate limiter closed"))?;

        if let Some(pacing) = &self.pacing {
            pacing.until_ready().await;
        }

        Ok(RatePermit { _permit: permit })
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn available(&self) -> usize {
        self.in_flight.available_permits()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(10, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn permits_are_returned_on_drop() {
        let limiter = RateLimiter::new(2, None);

        let first = limiter.acquire().await.expect("first");
        let _second = limiter.acquire().await.expect("second");
        assert_eq!(limiter.available(), 0);

        drop(first);
        assert_eq!(limiter.available(), 1);
    }

    #[tokio::test]
    async fn zero_capacity_is_clamped_to_one() {
        let limiter = RateLimiter::new(0, Some(0));
        assert_eq!(limiter.max_in_flight(), 1);
        let _permit = limiter.acquire().await.expect("permit");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_exceeds_max_in_flight() {
        let limiter = RateLimiter::new(3, None);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks = (0..12).map(|_| {
            let limiter = limiter.clone();
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            tokio::spawn(async move {
                let _permit = limiter.acquire().await.expect("permit");
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            })
        });
        for task in futures::future::join_all(tasks).await {
            task.expect("task");
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn pacing_spreads_request_starts() {
        let limiter = RateLimiter::new(10, Some(20));
        let started = Instant::now();

        for _ in 0..3 {
            let _permit = limiter.acquire().await.expect("permit");
        }

        // First cell is immediate, the next two wait ~50ms each.
        assert!(started.elapsed() >= Duration::from_millis(80));
    }
}
