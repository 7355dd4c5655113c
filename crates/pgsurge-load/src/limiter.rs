//! Token-bucket rate limiter shared by all same-class workers.
//!
//! Tokens refill continuously at the configured rate; burst equals the rate
//! (with a floor of one) so momentary bursts do not amplify. The rate can
//! be retuned live without draining the bucket, which avoids microbursts
//! when the rate is raised. Waits are cancellation-aware: a woken waiter
//! that observes cancellation returns without consuming a token.
//!
//! A rate of zero admits nothing; waiters block until cancellation or a
//! retune.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Scale factor giving sub-token precision to the refill arithmetic.
const TOKEN_SCALE: u64 = 1_000_000;

/// Idle poll interval while the rate is zero.
const ZERO_RATE_POLL: Duration = Duration::from_millis(100);

pub struct RateLimiter {
    /// Target rate in tokens per second. Zero admits nothing.
    rate: AtomicU64,
    /// Bucket capacity, scaled. Always `max(rate, 1) * TOKEN_SCALE`.
    burst: AtomicU64,
    /// Available tokens, scaled.
    tokens: AtomicU64,
    /// Last refill timestamp in nanoseconds since creation.
    last_refill_ns: AtomicU64,
    created: Instant,
    /// Wakes waiters when the rate changes.
    retune: Notify,
}

impl RateLimiter {
    pub fn new(rate: u64) -> Self {
        let burst = rate.max(1) * TOKEN_SCALE;
        Self {
            rate: AtomicU64::new(rate),
            burst: AtomicU64::new(burst),
            tokens: AtomicU64::new(if rate > 0 { burst } else { 0 }),
            last_refill_ns: AtomicU64::new(0),
            created: Instant::now(),
            retune: Notify::new(),
        }
    }

    /// Current target rate.
    pub fn rate(&self) -> u64 {
        self.rate.load(Ordering::Relaxed)
    }

    /// Retune the limiter in place. Takes effect immediately; existing
    /// tokens are kept (clamped to the new burst) so raising the rate does
    /// not cause a spike and lowering it does not stall waiters.
    pub fn set_rate(&self, rate: u64) {
        let burst = rate.max(1) * TOKEN_SCALE;
        self.rate.store(rate, Ordering::Release);
        self.burst.store(burst, Ordering::Release);

        // Clamp stored tokens down to the new capacity.
        loop {
            let current = self.tokens.load(Ordering::Relaxed);
            if current <= burst {
                break;
            }
            if self
                .tokens
                .compare_exchange_weak(current, burst, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }

        self.retune.notify_waiters();
    }

    /// Try to take one token without waiting.
    pub fn try_acquire(&self) -> bool {
        let rate = self.rate.load(Ordering::Relaxed);
        if rate == 0 {
            return false;
        }

        self.refill(rate);

        loop {
            let current = self.tokens.load(Ordering::Relaxed);
            if current < TOKEN_SCALE {
                return false;
            }
            match self.tokens.compare_exchange_weak(
                current,
                current - TOKEN_SCALE,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(_) => continue,
            }
        }
    }

    /// Wait until a token is available or the token is cancelled.
    ///
    /// Returns `true` with one token consumed, or `false` on cancellation
    /// with no token consumed.
    pub async fn wait(&self, cancel: &CancellationToken) -> bool {
        loop {
            let rate = self.rate.load(Ordering::Relaxed);

            if rate == 0 {
                tokio::select! {
                    _ = cancel.cancelled() => return false,
                    _ = self.retune.notified() => continue,
                    _ = tokio::time::sleep(ZERO_RATE_POLL) => continue,
                }
            }

            if self.try_acquire() {
                return true;
            }

            // Sleep roughly one token interval; bounded so retunes and
            // cancellation are observed promptly even at very low rates.
            let backoff =
                Duration::from_secs_f64((1.0 / rate as f64).clamp(0.000_05, 0.1));
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = self.retune.notified() => {}
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }

    fn refill(&self, rate: u64) {
        let now_ns = self.created.elapsed().as_nanos() as u64;
        let last_ns = self.last_refill_ns.load(Ordering::Relaxed);
        let elapsed_ns = now_ns.saturating_sub(last_ns);

        // Skip sub-microsecond refills to avoid CAS churn.
        if elapsed_ns < 1_000 {
            return;
        }

        // tokens = rate * elapsed_ns * TOKEN_SCALE / 1e9, reordered so the
        // intermediate fits comfortably: TOKEN_SCALE / 1e9 == 1 / 1000.
        let new_tokens = (rate as u128 * elapsed_ns as u128 / 1_000) as u64;
        if new_tokens == 0 {
            return;
        }

        if self
            .last_refill_ns
            .compare_exchange(last_ns, now_ns, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            // Another worker refilled concurrently.
            return;
        }

        let burst = self.burst.load(Ordering::Relaxed);
        loop {
            let current = self.tokens.load(Ordering::Relaxed);
            let next = current.saturating_add(new_tokens).min(burst);
            if next <= current {
                break;
            }
            match self.tokens.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(_) => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_basic_limiting() {
        let limiter = RateLimiter::new(10);
        // The initial bucket holds one second worth of tokens.
        for _ in 0..10 {
            assert!(limiter.try_acquire());
        }
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn test_zero_rate_admits_nothing() {
        let limiter = RateLimiter::new(0);
        assert!(!limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_zero_rate_blocks_until_cancelled() {
        let limiter = RateLimiter::new(0);
        let cancel = CancellationToken::new();

        let blocked =
            tokio::time::timeout(Duration::from_millis(50), limiter.wait(&cancel)).await;
        assert!(blocked.is_err());

        cancel.cancel();
        assert!(!limiter.wait(&cancel).await);
    }

    #[tokio::test]
    async fn test_cancelled_wait_consumes_nothing() {
        let limiter = RateLimiter::new(1);
        assert!(limiter.try_acquire());

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(!limiter.wait(&cancel).await);

        // The bucket refills on its own schedule; cancellation must not
        // have consumed the pending token.
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert!(limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_wait_grants_after_refill() {
        let limiter = RateLimiter::new(100);
        while limiter.try_acquire() {}

        let cancel = CancellationToken::new();
        let granted =
            tokio::time::timeout(Duration::from_millis(500), limiter.wait(&cancel)).await;
        assert_eq!(granted, Ok(true));
    }

    #[tokio::test]
    async fn test_retune_takes_effect_live() {
        let limiter = RateLimiter::new(1);
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());

        limiter.set_rate(1_000);
        assert_eq!(limiter.rate(), 1_000);

        let cancel = CancellationToken::new();
        let granted =
            tokio::time::timeout(Duration::from_millis(200), limiter.wait(&cancel)).await;
        assert_eq!(granted, Ok(true));
    }

    #[tokio::test]
    async fn test_retune_to_zero_stops_grants() {
        let limiter = RateLimiter::new(100);
        assert!(limiter.try_acquire());

        limiter.set_rate(0);
        assert!(!limiter.try_acquire());
    }
}
