//! Per-host rate-limit state ("Host gate"). In-memory only; lost freely
//! on process restart and reconstructible from recent URL-Store
//! activity, so it never needs to be durable.

use chrono::{DateTime, Duration, Utc};

/// Upper bound for exponential backoff after repeated failures.
pub const MAX_BACKOFF_SECS: i64 = 3600;

#[derive(Debug, Clone)]
pub struct HostGate {
    pub next_fetch_at: DateTime<Utc>,
    pub in_flight: u32,
    pub min_interval: Duration,
    pub concurrency_limit: u32,
    pub fail_streak: u32,
}

impl HostGate {
    pub fn new(min_interval: Duration, concurrency_limit: u32) -> Self {
        Self {
            next_fetch_at: Utc::now(),
            in_flight: 0,
            min_interval,
            concurrency_limit,
            fail_streak: 0,
        }
    }

    /// `now ≥ next_fetch_at` AND `in_flight < concurrency_limit`.
    pub fn allowed(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_fetch_at && self.in_flight < self.concurrency_limit
    }

    pub fn record_start(&mut self) {
        self.in_flight += 1;
    }

    pub fn record_complete(&mut self, success: bool, now: DateTime<Utc>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if success {
            self.fail_streak = 0;
            self.next_fetch_at = now + self.min_interval;
        } else {
            self.fail_streak += 1;
            let backoff_secs = scour_utils::exponential_backoff_secs(
                self.min_interval.num_seconds().max(1) as f64,
                self.fail_streak,
                MAX_BACKOFF_SECS as f64,
            );
            self.next_fetch_at = now + Duration::milliseconds((backoff_secs * 1000.0) as i64);
        }
    }

    /// Raises `min_interval` to honor a robots `Crawl-delay`; never lowers
    /// it (monotone upward, §4.2).
    pub fn set_crawl_delay(&mut self, seconds: i64) {
        if seconds > self.min_interval.num_seconds() {
            self.min_interval = Duration::seconds(seconds);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_when_interval_elapsed_and_under_limit() {
        let now = Utc::now();
        let mut gate = HostGate::new(Duration::seconds(10), 2);
        gate.next_fetch_at = now - Duration::seconds(1);
        assert!(gate.allowed(now));
        gate.record_start();
        gate.record_start();
        assert!(!gate.allowed(now), "at concurrency limit");
    }

    #[test]
    fn success_resets_fail_streak_and_sets_interval() {
        let now = Utc::now();
        let mut gate = HostGate::new(Duration::seconds(5), 2);
        gate.fail_streak = 3;
        gate.record_complete(true, now);
        assert_eq!(gate.fail_streak, 0);
        assert_eq!(gate.next_fetch_at, now + Duration::seconds(5));
    }

    #[test]
    fn failures_back_off_exponentially_and_cap() {
        let now = Utc::now();
        let mut gate = HostGate::new(Duration::seconds(1), 2);
        for _ in 0..20 {
            gate.record_complete(false, now);
        }
        let wait = (gate.next_fetch_at - now).num_seconds();
        assert_eq!(wait, MAX_BACKOFF_SECS);
    }

    #[test]
    fn crawl_delay_only_ever_increases() {
        let mut gate = HostGate::new(Duration::seconds(2), 2);
        gate.set_crawl_delay(10);
        assert_eq!(gate.min_interval, Duration::seconds(10));
        gate.set_crawl_delay(1);
        assert_eq!(gate.min_interval, Duration::seconds(10));
    }
}
