//! Exponential backoff, shared by the scheduler's host gates and the
//! index job queue's retry arithmetic (§4.2, §4.5).

use std::time::Duration;

/// `base · 2^attempt`, capped at `max`. `attempt` is zero-based: the first
/// failure is `attempt = 0`.
pub fn exponential_backoff(base: Duration, attempt: u32, max: Duration) -> Duration {
    let base_ms = base.as_millis() as f64;
    let scaled = base_ms * 2f64.powi(attempt as i32);
    let capped_ms = scaled.min(max.as_millis() as f64);
    Duration::from_millis(capped_ms as u64)
}

/// Same as [`exponential_backoff`] but expressed directly in seconds,
/// for callers whose retry/backoff formulas (`min(base · 2^(retry_count-1),
/// max_backoff)`, `min_interval · 2^fail_streak`) already work in whole
/// seconds.
pub fn exponential_backoff_secs(base_secs: f64, exponent: u32, max_secs: f64) -> f64 {
    (base_secs * 2f64.powi(exponent as i32)).min(max_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_each_attempt() {
        let max = Duration::from_secs(3600);
        assert_eq!(
            exponential_backoff(Duration::from_secs(1), 0, max),
            Duration::from_secs(1)
        );
        assert_eq!(
            exponential_backoff(Duration::from_secs(1), 1, max),
            Duration::from_secs(2)
        );
        assert_eq!(
            exponential_backoff(Duration::from_secs(1), 2, max),
            Duration::from_secs(4)
        );
    }

    #[test]
    fn caps_at_max() {
        let got = exponential_backoff(Duration::from_secs(60), 10, Duration::from_secs(3600));
        assert_eq!(got, Duration::from_secs(3600));
    }

    #[test]
    fn secs_variant_matches_duration_variant() {
        assert_eq!(exponential_backoff_secs(5.0, 3, 3600.0), 40.0);
        assert_eq!(exponential_backoff_secs(5.0, 20, 3600.0), 3600.0);
    }
}
