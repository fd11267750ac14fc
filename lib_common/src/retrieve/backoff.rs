//! # Backoff Policy
//!
//! Computes how long to wait before the next attempt of a failed request.
//!
//! A server-provided hint (`Retry-After`) always wins. Without one, the delay
//! grows exponentially from `initial` up to `cap` and is jittered over the upper
//! half of the window, `[base / 2, base)`, so batches that fail together do not
//! retry in lockstep.
//!
//! The policy holds no mutable state; every call is independent.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

/// Default delay for the first retry.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(250);
/// Default upper bound for any computed delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(4000);

/// # Backoff Policy
///
/// Exponential backoff with upper-half jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay window used for attempt 1.
    pub initial: Duration,
    /// Ceiling for the delay window.
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: DEFAULT_INITIAL_DELAY,
            cap: DEFAULT_MAX_DELAY,
        }
    }
}

impl BackoffPolicy {
    /// Creates a policy from an initial window and a cap.
    pub fn new(initial: Duration, cap: Duration) -> Self {
        Self { initial, cap }
    }

    /// Upper edge of the jitter window for a 1-based `attempt`:
    /// `min(cap, initial * 2^(attempt - 1))`. Attempt 0 is treated as 1.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.max(1) - 1;
        let factor = 2u32.saturating_pow(exponent);
        self.initial.saturating_mul(factor).min(self.cap)
    }

    /// Delay before the next attempt, drawing jitter from the thread-local RNG.
    pub fn compute_delay(&self, attempt: u32, server_hint: Option<Duration>) -> Duration {
        self.compute_delay_with(attempt, server_hint, &mut rand::rng())
    }

    /// Same as [`compute_delay`](Self::compute_delay) with an explicit RNG.
    pub fn compute_delay_with<R: Rng + ?Sized>(
        &self,
        attempt: u32,
        server_hint: Option<Duration>,
        rng: &mut R,
    ) -> Duration {
        if let Some(hint) = server_hint {
            return hint;
        }

        let upper = u64::try_from(self.base_delay(attempt).as_millis()).unwrap_or(u64::MAX);
        if upper == 0 {
            return Duration::ZERO;
        }
        // upper >= 1 here, so lower < upper and the range is never empty
        let lower = upper / 2;
        Duration::from_millis(rng.random_range(lower..upper))
    }
}

/// Parses an HTTP `Retry-After` value relative to `now`.
///
/// Accepts delta-seconds (fractions allowed) or an HTTP date. Dates in the past
/// and negative numbers clamp to zero. Returns `None` for anything else.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(seconds) = value.parse::<f64>() {
        if !seconds.is_finite() {
            return None;
        }
        return Duration::try_from_secs_f64(seconds.max(0.0)).ok();
    }

    let when = DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()?
        .with_timezone(&Utc);

    Some((when - now).to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn base_delay_doubles_until_cap() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.base_delay(1), Duration::from_millis(250));
        assert_eq!(policy.base_delay(2), Duration::from_millis(500));
        assert_eq!(policy.base_delay(3), Duration::from_millis(1000));
        assert_eq!(policy.base_delay(5), Duration::from_millis(4000));
        assert_eq!(policy.base_delay(6), Duration::from_millis(4000));
        assert_eq!(policy.base_delay(200), Duration::from_millis(4000));
        assert_eq!(policy.base_delay(0), policy.base_delay(1));
    }

    #[test]
    fn jitter_stays_in_upper_half_and_under_cap() {
        let policy = BackoffPolicy::default();
        let mut rng = StdRng::seed_from_u64(7);
        let mut previous_lower = Duration::ZERO;

        for attempt in 1..=10 {
            let base = policy.base_delay(attempt);
            let lower = base / 2;
            assert!(lower >= previous_lower);
            previous_lower = lower;

            for _ in 0..200 {
                let delay = policy.compute_delay_with(attempt, None, &mut rng);
                assert!(delay >= lower, "attempt {attempt}: {delay:?} < {lower:?}");
                assert!(delay < base, "attempt {attempt}: {delay:?} >= {base:?}");
                assert!(delay < policy.cap);
            }
        }
    }

    #[test]
    fn server_hint_wins_over_backoff() {
        let policy = BackoffPolicy::default();
        let hint = Duration::from_secs(9);
        assert_eq!(policy.compute_delay(1, Some(hint)), hint);
        assert_eq!(policy.compute_delay(8, Some(Duration::ZERO)), Duration::ZERO);
    }

    #[test]
    fn one_millisecond_window_gives_zero_delay() {
        let policy = BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(1));
        let mut rng = StdRng::seed_from_u64(1);
        for attempt in 1..=4 {
            assert_eq!(policy.compute_delay_with(attempt, None, &mut rng), Duration::ZERO);
        }
    }

    #[test]
    fn capped_attempts_never_reach_the_cap() {
        let policy = BackoffPolicy::default();
        let cap = Duration::from_millis(4000);
        for _ in 0..5000 {
            assert!(policy.compute_delay(6, None) < cap);
        }
    }

    #[test]
    fn zero_window_gives_zero_delay() {
        let policy = BackoffPolicy::new(Duration::ZERO, Duration::ZERO);
        assert_eq!(policy.compute_delay(3, None), Duration::ZERO);
    }

    #[test]
    fn retry_after_seconds() {
        let now = Utc::now();
        assert_eq!(parse_retry_after("3", now), Some(Duration::from_secs(3)));
        assert_eq!(parse_retry_after(" 1.5 ", now), Some(Duration::from_millis(1500)));
        assert_eq!(parse_retry_after("-4", now), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("", now), None);
        assert_eq!(parse_retry_after("soon", now), None);
        assert_eq!(parse_retry_after("NaN", now), None);
    }

    #[test]
    fn retry_after_http_date() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 30).unwrap();
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", now),
            Some(Duration::from_secs(30))
        );
        // Already passed.
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:00:00 GMT", now),
            Some(Duration::ZERO)
        );
    }
}
