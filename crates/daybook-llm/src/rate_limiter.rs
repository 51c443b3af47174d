use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Injectable clock, the way `xchecker-lock` injects time in its tests
/// instead of sleeping real wall-clock seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// FIFO rate limiter: callers are serialized by an internal mutex and each
/// `acquire()` sleeps only long enough to respect `min_delay` since the
/// previous acquire. `min_delay = 0` disables the wait but still serializes.
pub struct RateLimiter {
    min_delay: Duration,
    last_acquire: Mutex<Option<Instant>>,
    clock: Box<dyn Clock>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(min_delay_ms: u64) -> Self {
        RateLimiter {
            min_delay: Duration::from_millis(min_delay_ms),
            last_acquire: Mutex::new(None),
            clock: Box::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(min_delay_ms: u64, clock: Box<dyn Clock>) -> Self {
        RateLimiter {
            min_delay: Duration::from_millis(min_delay_ms),
            last_acquire: Mutex::new(None),
            clock,
        }
    }

    /// Blocks the calling task until it is safe to issue the next provider
    /// call. Holds the internal mutex only long enough to compute the
    /// required sleep duration, so concurrent callers queue in arrival
    /// order without serializing the actual sleep.
    pub async fn acquire(&self) {
        let now = self.clock.now();
        let wait = {
            let mut guard = self.last_acquire.lock().unwrap_or_else(|e| e.into_inner());
            let wait = match *guard {
                Some(last) => {
                    let elapsed = now.saturating_duration_since(last);
                    self.min_delay.saturating_sub(elapsed)
                }
                None => Duration::ZERO,
            };
            *guard = Some(now + wait);
            wait
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct FakeClock {
        now_ms: AtomicU64,
        epoch: Instant,
    }

    impl FakeClock {
        fn new() -> Self {
            FakeClock { now_ms: AtomicU64::new(0), epoch: Instant::now() }
        }

        fn advance(&self, ms: u64) {
            self.now_ms.fetch_add(ms, Ordering::SeqCst);
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            self.epoch + Duration::from_millis(self.now_ms.load(Ordering::SeqCst))
        }
    }

    #[tokio::test]
    async fn zero_delay_never_sleeps() {
        let limiter = RateLimiter::new(0);
        limiter.acquire().await;
        limiter.acquire().await;
    }

    #[tokio::test]
    async fn records_last_acquire_time() {
        let clock = std::sync::Arc::new(FakeClock::new());
        let limiter = RateLimiter::with_clock(100, Box::new(ClockHandle(clock.clone())));
        limiter.acquire().await;
        clock.advance(200);
        limiter.acquire().await;
    }

    struct ClockHandle(std::sync::Arc<FakeClock>);
    impl Clock for ClockHandle {
        fn now(&self) -> Instant {
            self.0.now()
        }
    }
}
