//! Retry and backoff policy for fal.ai queue submissions.
//!
//! Submission is retried with backoff. Once a job is queued, transient status
//! check failures are polled through, bounded by the client's generation
//! timeout.

use std::time::Duration;

/// Default number of retry attempts for rate-limited requests.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default number of retry attempts for transient network errors.
pub const DEFAULT_NETWORK_RETRIES: u32 = 3;

/// Base delay for exponential backoff (1 second).
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Maximum delay cap for exponential backoff (60 seconds).
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(60);

/// How many times, and how patiently, a submission is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub network_retries: u32,
    pub rate_limit_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            network_retries: DEFAULT_NETWORK_RETRIES,
            rate_limit_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_max: DEFAULT_BACKOFF_MAX,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries. Useful in tests.
    pub fn none() -> Self {
        Self {
            network_retries: 0,
            rate_limit_retries: 0,
            ..Self::default()
        }
    }

    /// Backoff before retry number `attempt` (zero-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.backoff_base, self.backoff_max)
    }

    /// Delay after a 429, preferring the server's Retry-After hint.
    pub fn rate_limit_delay(&self, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
        match retry_after_secs {
            Some(secs) => Duration::from_secs(secs).min(self.backoff_max),
            None => self.backoff(attempt),
        }
    }
}

/// Determine if a reqwest error is a transient network error that should be retried.
///
/// Returns true for connection errors, timeouts, interrupted bodies and
/// 502/503/504 gateway responses.
pub fn is_transient_network_error(error: &reqwest::Error) -> bool {
    if error.is_connect() || error.is_timeout() || error.is_body() {
        return true;
    }

    error.status().map(|s| is_transient_status(s.as_u16())).unwrap_or(false)
}

/// Gateway statuses (502/503/504) that usually clear up on their own.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 502..=504)
}

/// Parse the Retry-After header value (integer seconds only).
pub fn parse_retry_after(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}

/// Calculate exponential backoff delay with jitter.
///
/// Uses the formula: min(base * 2^attempt + jitter, max_delay)
/// where jitter is half the base, capped at 500ms.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exponential = base.saturating_mul(2u32.saturating_pow(attempt));
    let jitter_ms = (base.as_millis() as u64).min(1000);
    let jitter = Duration::from_millis(jitter_ms / 2);
    exponential.saturating_add(jitter).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_transient_status() {
        assert!(is_transient_status(502));
        assert!(is_transient_status(503));
        assert!(is_transient_status(504));
        assert!(!is_transient_status(500));
        assert!(!is_transient_status(429));
    }

    #[test]
    fn test_calculate_backoff_grows_exponentially() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(60);
        assert_eq!(calculate_backoff(0, base, max), Duration::from_millis(1500));
        assert_eq!(calculate_backoff(1, base, max), Duration::from_millis(2500));
        assert_eq!(calculate_backoff(2, base, max), Duration::from_millis(4500));
    }

    #[test]
    fn test_calculate_backoff_respects_max() {
        let delay = calculate_backoff(10, Duration::from_secs(1), Duration::from_secs(60));
        assert_eq!(delay, Duration::from_secs(60));
    }

    #[test]
    fn test_calculate_backoff_with_small_base() {
        let delay = calculate_backoff(0, Duration::from_millis(100), Duration::from_secs(10));
        assert_eq!(delay, Duration::from_millis(150));
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.network_retries, 3);
        assert_eq!(policy.rate_limit_retries, 5);
        assert_eq!(policy.backoff_base, Duration::from_secs(1));
        assert_eq!(policy.backoff_max, Duration::from_secs(60));
    }

    #[test]
    fn test_none_policy_disables_retries() {
        let policy = RetryPolicy::none();
        assert_eq!(policy.network_retries, 0);
        assert_eq!(policy.rate_limit_retries, 0);
    }

    #[test]
    fn test_rate_limit_delay_prefers_retry_after() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.rate_limit_delay(0, Some(7)), Duration::from_secs(7));
        assert_eq!(policy.rate_limit_delay(0, Some(600)), Duration::from_secs(60));
        assert_eq!(policy.rate_limit_delay(1, None), policy.backoff(1));
    }
}
