use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Paces outgoing requests.
///
/// [`RateLimiter::reserve`] books the next request slot and returns how long
/// the caller must wait before sending. Implementations must be safe to
/// share between threads.
pub trait RateLimiter: Send + Sync {
    /// Reserve a slot and return the delay before it opens.
    fn reserve(&self) -> Duration;
}

/// A limiter that never delays.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRateLimit;

impl RateLimiter for NoRateLimit {
    fn reserve(&self) -> Duration {
        Duration::ZERO
    }
}

/// Enforces a minimum interval between consecutive requests.
#[derive(Debug)]
pub struct MinIntervalLimiter {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl MinIntervalLimiter {
    /// Allow at most one request per `interval`.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Configured spacing between requests.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    fn reserve_at(&self, now: Instant) -> Duration {
        let mut next_slot = self
            .next_slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let slot = next_slot.map_or(now, |slot| slot.max(now));
        *next_slot = Some(slot + self.interval);
        slot.saturating_duration_since(now)
    }
}

impl RateLimiter for MinIntervalLimiter {
    fn reserve(&self) -> Duration {
        self.reserve_at(Instant::now())
    }
}
