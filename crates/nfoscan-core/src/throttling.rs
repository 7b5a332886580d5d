use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter as GovernorLimiter};

use crate::ResolveError;

type DirectRateLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared request budget for brokerage calls.
///
/// Clones share the same budget, so one handle can be passed to several runs.
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Option<Arc<DirectRateLimiter>>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limited", &self.limiter.is_some())
            .finish()
    }
}

impl RateLimiter {
    /// At most `requests` calls per second, with no burst beyond one.
    pub fn per_second(requests: u32) -> Self {
        Self::from_quota(quota_from_window(Duration::from_secs(1), requests, 1))
    }

    /// Enforces a minimum spacing between consecutive calls.
    pub fn with_min_interval(interval: Duration) -> Self {
        if interval.is_zero() {
            return Self::unlimited();
        }
        let period = interval.max(Duration::from_millis(1));
        match Quota::with_period(period) {
            Some(quota) => Self::from_quota(quota),
            None => Self::unlimited(),
        }
    }

    pub fn unlimited() -> Self {
        Self { limiter: None }
    }

    fn from_quota(quota: Quota) -> Self {
        Self {
            limiter: Some(Arc::new(GovernorLimiter::direct(quota))),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.limiter.is_none()
    }

    /// Waits for a permit for at most `max_wait`.
    pub async fn acquire(&self, max_wait: Duration) -> Result<(), ResolveError> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };

        if limiter.check().is_ok() {
            return Ok(());
        }

        tokio::time::timeout(max_wait, limiter.until_ready())
            .await
            .map_err(|_| ResolveError::RateLimitTimeout {
                waited_ms: u64::try_from(max_wait.as_millis()).unwrap_or(u64::MAX),
            })
    }
}

fn quota_from_window(window: Duration, limit: u32, burst: u32) -> Quota {
    let safe_limit = limit.max(1);
    let burst = NonZeroU32::new(burst.max(1)).unwrap_or(NonZeroU32::MIN);

    let seconds_per_cell = (window.as_secs_f64() / f64::from(safe_limit)).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
        .allow_burst(burst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unlimited_limiter_never_waits() {
        let limiter = RateLimiter::unlimited();
        for _ in 0..100 {
            limiter
                .acquire(Duration::ZERO)
                .await
                .expect("unlimited permit");
        }
    }

    #[tokio::test]
    async fn exhausted_budget_times_out() {
        let limiter = RateLimiter::with_min_interval(Duration::from_secs(60));
        limiter
            .acquire(Duration::from_millis(10))
            .await
            .expect("first permit is immediate");

        let err = limiter
            .acquire(Duration::from_millis(10))
            .await
            .expect_err("second permit must wait a minute");
        assert_eq!(err, ResolveError::RateLimitTimeout { waited_ms: 10 });
    }

    #[tokio::test]
    async fn clones_share_one_budget() {
        let limiter = RateLimiter::per_second(1);
        let clone = limiter.clone();

        limiter
            .acquire(Duration::from_millis(5))
            .await
            .expect("first permit is immediate");
        assert!(clone.acquire(Duration::from_millis(5)).await.is_err());
    }

    #[test]
    fn quota_spreads_window_over_limit() {
        let quota = quota_from_window(Duration::from_secs(1), 4, 1);
        assert_eq!(quota.replenish_interval(), Duration::from_millis(250));
    }
}
