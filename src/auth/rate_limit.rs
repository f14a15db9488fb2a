//! Rate limiting primitives for passcode submissions.
//!
//! Attempts are tracked in memory per key (`client:module`) inside a sliding
//! window. State lives for the process lifetime only; a multi-process
//! deployment would need a shared counter store instead.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

pub const DEFAULT_MAX_ATTEMPTS: usize = 5;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
/// Sweep idle keys once the table grows past this many entries, at most once
/// per window.
const SWEEP_THRESHOLD: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

pub trait RateLimiter: Send + Sync {
    /// Check `key` and, when allowed, record the attempt.
    fn check(&self, key: &str) -> RateLimitDecision;

    fn is_limited(&self, key: &str) -> bool {
        self.check(key) == RateLimitDecision::Limited
    }
}

#[must_use]
pub fn limiter_key(client: &str, module: &str) -> String {
    format!("{client}:{module}")
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check(&self, _key: &str) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_attempts: usize,
    window: Duration,
    attempts: Mutex<Attempts>,
}

#[derive(Debug, Default)]
struct Attempts {
    keys: HashMap<String, VecDeque<Instant>>,
    last_sweep: Option<Instant>,
}

impl Attempts {
    fn sweep_due(&self, now: Instant, window: Duration) -> bool {
        if self.keys.len() <= SWEEP_THRESHOLD {
            return false;
        }
        match self.last_sweep {
            Some(at) => now.saturating_duration_since(at) >= window,
            None => true,
        }
    }
}

impl Default for SlidingWindowLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW)
    }
}

impl SlidingWindowLimiter {
    #[must_use]
    pub fn new(max_attempts: usize, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            attempts: Mutex::new(Attempts::default()),
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Prune, check and record as one critical section, evaluated at `now`.
    pub fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);

        if attempts.sweep_due(now, self.window) {
            attempts.keys.retain(|_, history| {
                prune(history, now, self.window);
                !history.is_empty()
            });
            attempts.last_sweep = Some(now);
        }

        let history = attempts.keys.entry(key.to_string()).or_default();
        prune(history, now, self.window);

        if history.len() >= self.max_attempts {
            return RateLimitDecision::Limited;
        }

        history.push_back(now);
        RateLimitDecision::Allowed
    }
}

impl RateLimiter for SlidingWindowLimiter {
    fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }
}

fn prune(history: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while history
        .front()
        .is_some_and(|at| now.saturating_duration_since(*at) >= window)
    {
        history.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn noop_rate_limiter_allows() {
        let limiter = NoopRateLimiter;
        for _ in 0..100 {
            assert_eq!(limiter.check("1.2.3.4:demo"), RateLimitDecision::Allowed);
        }
    }

    #[test]
    fn sixth_attempt_in_window_is_limited() {
        let limiter = SlidingWindowLimiter::default();
        let start = Instant::now();
        let results: Vec<bool> = (0..6u64)
            .map(|i| {
                limiter.check_at("k", start + Duration::from_millis(i * 10))
                    == RateLimitDecision::Limited
            })
            .collect();
        assert_eq!(results, vec![false, false, false, false, false, true]);
    }

    #[test]
    fn limited_attempts_are_not_recorded() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();
        assert_eq!(limiter.check_at("k", start), RateLimitDecision::Allowed);
        assert_eq!(
            limiter.check_at("k", start + Duration::from_secs(30)),
            RateLimitDecision::Allowed
        );
        // Hammering while limited must not extend the lockout.
        for i in 31..59 {
            assert_eq!(
                limiter.check_at("k", start + Duration::from_secs(i)),
                RateLimitDecision::Limited
            );
        }
        assert_eq!(
            limiter.check_at("k", start + Duration::from_secs(60)),
            RateLimitDecision::Allowed
        );
    }

    #[test]
    fn window_elapsing_resets_the_counter() {
        let limiter = SlidingWindowLimiter::default();
        let start = Instant::now();
        for _ in 0..5 {
            assert!(!limiter.is_limited_at("k", start));
        }
        assert!(limiter.is_limited_at("k", start + Duration::from_secs(59)));
        assert!(!limiter.is_limited_at("k", start + Duration::from_secs(60)));
    }

    #[test]
    fn keys_are_isolated() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(!limiter.is_limited_at(&limiter_key("10.0.0.1", "demo"), now));
        assert!(limiter.is_limited_at(&limiter_key("10.0.0.1", "demo"), now));
        assert!(!limiter.is_limited_at(&limiter_key("10.0.0.2", "demo"), now));
        assert!(!limiter.is_limited_at(&limiter_key("10.0.0.1", "docs"), now));
    }

    #[test]
    fn concurrent_callers_admit_exactly_max_attempts() {
        let limiter = Arc::new(SlidingWindowLimiter::default());
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                thread::spawn(move || limiter.check("shared") == RateLimitDecision::Allowed)
            })
            .collect();
        let allowed = handles
            .into_iter()
            .filter_map(|handle| handle.join().ok())
            .filter(|allowed| *allowed)
            .count();
        assert_eq!(allowed, DEFAULT_MAX_ATTEMPTS);
    }

    #[test]
    fn idle_keys_are_swept() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(1));
        let start = Instant::now();
        for i in 0..=SWEEP_THRESHOLD {
            limiter.check_at(&format!("client-{i}"), start);
        }
        limiter.check_at("late", start + Duration::from_secs(2));
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn sweeps_run_at_most_once_per_window() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(1));
        let start = Instant::now();
        for i in 0..=SWEEP_THRESHOLD {
            limiter.check_at(&format!("client-{i}"), start);
        }
        // First sweep: nothing has expired yet.
        limiter.check_at("a", start + Duration::from_millis(500));
        assert_eq!(limiter.tracked_keys(), SWEEP_THRESHOLD + 2);

        // Everything from `start` is idle now, but the last sweep is too recent.
        limiter.check_at("b", start + Duration::from_millis(1200));
        assert_eq!(limiter.tracked_keys(), SWEEP_THRESHOLD + 3);

        limiter.check_at("c", start + Duration::from_millis(1500));
        assert_eq!(limiter.tracked_keys(), 2);
    }

    impl SlidingWindowLimiter {
        fn tracked_keys(&self) -> usize {
            self.attempts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .keys
                .len()
        }

        fn is_limited_at(&self, key: &str, now: Instant) -> bool {
            self.check_at(key, now) == RateLimitDecision::Limited
        }
    }
}
