//! Cooperative rate limiting for outbound API calls.
//!
//! Each API category owns one [`RateLimit`] bucket allowing `calls` requests
//! per `per` window. A caller that would exceed the budget sets a shared
//! deadline and sleeps until it passes; every other caller arriving in the
//! meantime waits behind the same deadline and re-checks afterwards.
//!
//! Bucket state sits behind a mutex that is never held across an `.await`,
//! so waiting on one bucket does not block other buckets or unrelated tasks.
//!
//! # Window expiry
//!
//! When a window elapses naturally, the next call opens a fresh window
//! (`first_call = now`, `calls = 1`). The counter never keeps growing across
//! stale windows.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Extra delay added on top of the window before a blocked caller retries.
const GRACE: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct BucketState {
    first_call: Option<Instant>,
    calls: u32,
    wait_end: Option<Instant>,
}

/// Outcome of one admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Granted,
    Wait(Instant),
}

/// A shared call budget for one API category.
#[derive(Debug)]
pub struct RateLimit {
    name: &'static str,
    calls: u32,
    per: Duration,
    state: Mutex<BucketState>,
}

impl RateLimit {
    /// Creates a bucket allowing `calls` requests per `per`.
    pub fn new(name: &'static str, calls: u32, per: Duration) -> Self {
        Self {
            name,
            calls: calls.max(1),
            per,
            state: Mutex::new(BucketState::default()),
        }
    }

    /// Returns the bucket name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the allowed number of calls per window.
    pub fn calls(&self) -> u32 {
        self.calls
    }

    /// Returns the window length.
    pub fn per(&self) -> Duration {
        self.per
    }

    /// Waits until the bucket admits one more call.
    pub async fn acquire(&self) {
        loop {
            match self.try_acquire(Instant::now()) {
                Admission::Granted => return,
                Admission::Wait(deadline) => {
                    debug!(
                        bucket = self.name,
                        wait_ms = deadline.saturating_duration_since(Instant::now()).as_millis() as u64,
                        "Rate limit reached, waiting"
                    );
                    tokio::time::sleep_until(deadline).await;
                }
            }
        }
    }

    fn try_acquire(&self, now: Instant) -> Admission {
        let mut state = self.state.lock();

        if let Some(wait_end) = state.wait_end {
            if now < wait_end {
                return Admission::Wait(wait_end);
            }
            *state = BucketState::default();
        }

        match state.first_call {
            Some(first_call) if now.duration_since(first_call) < self.per => {
                state.calls += 1;
                if state.calls > self.calls {
                    let wait_end = now + self.per + GRACE;
                    state.wait_end = Some(wait_end);
                    return Admission::Wait(wait_end);
                }
            }
            _ => {
                state.first_call = Some(now);
                state.calls = 1;
            }
        }

        Admission::Granted
    }
}

// =============================================================================
// Presets
// =============================================================================

/// The per-category buckets used by one API client.
///
/// Limits follow the platform's published rate limits.
#[derive(Debug)]
pub struct RateLimits {
    /// Most endpoints: 2000 requests per second.
    pub other: RateLimit,
    /// Webhook endpoint get/set: 1000 requests per minute.
    pub webhook_endpoint: RateLimit,
    /// Statistics, broadcast and webhook test: 60 requests per hour.
    pub stats_and_broadcast: RateLimit,
    /// Audience and ads endpoints: 60 requests per minute.
    pub audience_and_ads: RateLimit,
    /// Rich menu creation and deletion: 100 requests per hour.
    pub rich_menu: RateLimit,
    /// Batch replace/unlink of rich menus: 3 requests per hour.
    pub rich_menu_batch: RateLimit,
}

impl RateLimits {
    /// Creates the buckets with the platform defaults.
    pub fn new() -> Self {
        const MINUTE: Duration = Duration::from_secs(60);
        const HOUR: Duration = Duration::from_secs(3600);

        Self {
            other: RateLimit::new("other", 2000, Duration::from_secs(1)),
            webhook_endpoint: RateLimit::new("webhook_endpoint", 1000, MINUTE),
            stats_and_broadcast: RateLimit::new("stats_and_broadcast", 60, HOUR),
            audience_and_ads: RateLimit::new("audience_and_ads", 60, MINUTE),
            rich_menu: RateLimit::new("rich_menu", 100, HOUR),
            rich_menu_batch: RateLimit::new("rich_menu_batch", 3, HOUR),
        }
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_within_budget_never_waits() {
        let limit = RateLimit::new("test", 5, Duration::from_secs(10));
        let start = Instant::now();

        for _ in 0..5 {
            limit.acquire().await;
        }

        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exceeding_budget_waits_full_window() {
        let limit = RateLimit::new("test", 3, Duration::from_secs(10));
        let start = Instant::now();

        for _ in 0..3 {
            limit.acquire().await;
        }
        limit.acquire().await;

        assert!(Instant::now().duration_since(start) >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_natural_expiry_opens_fresh_window() {
        let limit = RateLimit::new("test", 2, Duration::from_secs(1));

        limit.acquire().await;
        limit.acquire().await;
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let start = Instant::now();
        limit.acquire().await;
        limit.acquire().await;
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiters_share_one_deadline() {
        let limit = Arc::new(RateLimit::new("test", 1, Duration::from_secs(5)));
        let start = Instant::now();

        limit.acquire().await;

        let mut tasks = Vec::new();
        for _ in 0..2 {
            let limit = Arc::clone(&limit);
            tasks.push(tokio::spawn(async move {
                limit.acquire().await;
                Instant::now()
            }));
        }

        let mut finished = Vec::new();
        for task in tasks {
            finished.push(task.await.unwrap());
        }
        finished.sort();

        // One caller gets the fresh window, the other has to wait it out too.
        assert!(finished[0].duration_since(start) >= Duration::from_secs(5));
        assert!(finished[1].duration_since(start) >= Duration::from_secs(10));
    }

    #[test]
    fn test_presets() {
        let limits = RateLimits::new();
        assert_eq!(limits.other.calls(), 2000);
        assert_eq!(limits.other.per(), Duration::from_secs(1));
        assert_eq!(limits.webhook_endpoint.calls(), 1000);
        assert_eq!(limits.stats_and_broadcast.per(), Duration::from_secs(3600));
        assert_eq!(limits.rich_menu_batch.calls(), 3);
    }
}
