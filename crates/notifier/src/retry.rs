//! Retry policy — first-class backoff and exhaustion state.
//!
//! Retry count, backoff and the wall-clock window live here as explicit
//! testable values rather than implicit job-runner behavior. Attempt
//! count and window are both evaluated before every retry; whichever
//! exhausts first terminates the chain.

use std::time::Duration;

use chrono::{DateTime, Utc};

use architex_common::config::AppConfig;

/// Default maximum delivery tries per failure chain.
const DEFAULT_MAX_TRIES: u32 = 3;

/// Default base backoff delay.
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(60);

/// Default wall-clock retry window from first failure.
const DEFAULT_WINDOW: Duration = Duration::from_secs(2 * 60 * 60);

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_tries: u32,
    pub base_delay: Duration,
    pub window: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_tries: DEFAULT_MAX_TRIES,
            base_delay: DEFAULT_BASE_DELAY,
            window: DEFAULT_WINDOW,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_tries: config.retry_max_tries,
            base_delay: Duration::from_secs(config.retry_base_delay_secs),
            window: Duration::from_secs(config.retry_window_secs),
        }
    }

    /// Backoff delay scheduled after the `attempts`-th failure:
    /// `base_delay × 3^attempts`, so successive delays grow 3× each retry.
    pub fn backoff(&self, attempts: u32) -> Duration {
        self.base_delay * 3u32.pow(attempts)
    }

    /// Whether the wall-clock retry window has elapsed.
    pub fn window_elapsed(&self, first_failed_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(first_failed_at)
            .to_std()
            .map(|elapsed| elapsed >= self.window)
            .unwrap_or(false)
    }

    /// Whether the chain must stop retrying: attempt count reached or
    /// window elapsed, whichever comes first.
    pub fn is_exhausted(
        &self,
        attempts: u32,
        first_failed_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        attempts >= self.max_tries || self.window_elapsed(first_failed_at, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_backoff_sequence_grows_threefold() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(180));
        assert_eq!(policy.backoff(2), Duration::from_secs(540));
        assert_eq!(policy.backoff(3), Duration::from_secs(1620));
    }

    #[test]
    fn test_backoff_respects_custom_base_delay() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(10),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(1), Duration::from_secs(30));
        assert_eq!(policy.backoff(2), Duration::from_secs(90));
    }

    #[test]
    fn test_exhausted_by_attempt_count() {
        let policy = RetryPolicy::default();
        let start = Utc.with_ymd_and_hms(2025, 5, 6, 12, 0, 0).unwrap();

        assert!(!policy.is_exhausted(1, start, start));
        assert!(!policy.is_exhausted(2, start, start));
        assert!(policy.is_exhausted(3, start, start));
    }

    #[test]
    fn test_exhausted_by_window() {
        let policy = RetryPolicy::default();
        let start = Utc.with_ymd_and_hms(2025, 5, 6, 12, 0, 0).unwrap();
        let within = start + chrono::Duration::minutes(119);
        let past = start + chrono::Duration::hours(2);

        assert!(!policy.is_exhausted(1, start, within));
        assert!(policy.is_exhausted(1, start, past));
    }

    #[test]
    fn test_whichever_comes_first_wins() {
        let policy = RetryPolicy::default();
        let start = Utc.with_ymd_and_hms(2025, 5, 6, 12, 0, 0).unwrap();

        // Attempts left but window gone.
        assert!(policy.is_exhausted(2, start, start + chrono::Duration::hours(3)));
        // Window left but attempts gone.
        assert!(policy.is_exhausted(3, start, start + chrono::Duration::minutes(1)));
    }

    #[test]
    fn test_clock_skew_does_not_elapse_window() {
        let policy = RetryPolicy::default();
        let start = Utc.with_ymd_and_hms(2025, 5, 6, 12, 0, 0).unwrap();
        // A first-failure timestamp in the future must not count as elapsed.
        assert!(!policy.window_elapsed(start, start - chrono::Duration::minutes(5)));
    }
}
