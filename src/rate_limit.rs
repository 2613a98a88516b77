//! Per-state request pacing.
//!
//! Each licensing board gets its own limiter allowing one request per
//! configured interval. Boards do not share a budget, so a slow state never
//! holds up requests to another.

use crate::config::RateLimitConfig;
use crate::states::StateCode;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

type DefaultDirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Minimum-interval limiter keyed by state.
pub struct StateRateLimiter {
    config: RateLimitConfig,
    /// `None` marks a state with limiting disabled (zero interval).
    limiters: Mutex<HashMap<StateCode, Option<Arc<DefaultDirectRateLimiter>>>>,
}

impl StateRateLimiter {
    /// Create a limiter from configuration.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            limiters: Mutex::new(HashMap::new()),
        }
    }

    /// Create a limiter applying the same interval to every state.
    #[must_use]
    pub fn with_interval(interval: Duration) -> Self {
        Self::new(RateLimitConfig {
            min_interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            ..RateLimitConfig::default()
        })
    }

    /// Minimum interval enforced for `state`.
    #[must_use]
    pub fn interval_for(&self, state: StateCode) -> Duration {
        self.config.interval_for(state)
    }

    fn limiter_for(&self, state: StateCode) -> Option<Arc<DefaultDirectRateLimiter>> {
        let mut limiters = self.limiters.lock();
        limiters
            .entry(state)
            .or_insert_with(|| {
                Quota::with_period(self.config.interval_for(state))
                    .map(|quota| Arc::new(RateLimiter::direct(quota)))
            })
            .clone()
    }

    /// Wait until a request to `state` may be sent.
    ///
    /// Returns immediately when the state's interval has elapsed since the
    /// previous acquire, otherwise sleeps until it has.
    pub async fn acquire(&self, state: StateCode) {
        let Some(limiter) = self.limiter_for(state) else {
            return;
        };

        if limiter.check().is_ok() {
            return;
        }

        let started = Instant::now();
        limiter.until_ready().await;
        debug!(
            "Rate limited {} for {}ms",
            state,
            started.elapsed().as_millis()
        );
    }

    /// Take a slot for `state` if one is available right now.
    pub fn try_acquire(&self, state: StateCode) -> bool {
        self.limiter_for(state)
            .map_or(true, |limiter| limiter.check().is_ok())
    }
}
