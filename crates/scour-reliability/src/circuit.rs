//! A small circuit breaker guarding calls to out-of-scope collaborators:
//! the injected `RobotsFetcher`/`Fetcher` in the crawl worker, and the
//! indexer's job-submission path when it is called from another service.
//!
//! Three states: `Closed` counts consecutive failures, `Open` rejects
//! every call until the cooldown elapses, `HalfOpen` admits a bounded
//! number of probe calls and closes again on the first success or
//! reopens on the first failure.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::warn;

/// Clock seam so breaker transitions are testable without real sleeps.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default)]
pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Circuit breaker tuning. Constructed directly or via [`presets`].
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Consecutive failures in `Closed` before the circuit opens.
    pub failure_threshold: u32,
    /// How long the circuit stays `Open` before admitting a probe call.
    pub open_cooldown_ms: u64,
    /// Maximum concurrent probe calls while `HalfOpen`.
    pub half_open_max_in_flight: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
enum Inner {
    Closed { consecutive_failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { in_flight: u32 },
}

impl Inner {
    fn kind(&self) -> State {
        match self {
            Inner::Closed { .. } => State::Closed,
            Inner::Open { .. } => State::Open,
            Inner::HalfOpen { .. } => State::HalfOpen,
        }
    }
}

/// Error returned by [`CircuitBreaker::guarded_call`]: either the circuit
/// rejected the call outright, or the call ran and failed with `E`.
#[derive(Debug)]
pub enum CallError<E> {
    CircuitOpen,
    Inner(E),
}

impl<E: std::fmt::Display> std::fmt::Display for CallError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallError::CircuitOpen => write!(f, "circuit breaker open"),
            CallError::Inner(e) => write!(f, "{e}"),
        }
    }
}

pub struct CircuitBreaker {
    config: Config,
    clock: Arc<dyn Clock>,
    state: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(Inner::Closed {
                consecutive_failures: 0,
            }),
        }
    }

    pub fn with_real_clock(config: Config) -> Self {
        Self::new(config, Arc::new(RealClock))
    }

    pub fn state(&self) -> State {
        self.state.lock().unwrap().kind()
    }

    /// Runs `f` if the circuit admits a call, recording the outcome.
    /// Returns [`CallError::CircuitOpen`] without invoking `f` when the
    /// circuit is open (or half-open and already at its probe cap).
    pub async fn guarded_call<F, Fut, T, E>(&self, f: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.admit() {
            return Err(CallError::CircuitOpen);
        }

        let result = f().await;
        self.record(result.is_ok());
        result.map_err(CallError::Inner)
    }

    /// Decides whether a call may proceed, transitioning `Open` into
    /// `HalfOpen` once the cooldown has elapsed and bumping the
    /// `HalfOpen` in-flight counter when a probe is admitted.
    fn admit(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        match &*state {
            Inner::Closed { .. } => true,
            Inner::Open { opened_at } => {
                let cooldown = Duration::from_millis(self.config.open_cooldown_ms);
                if self.clock.now().duration_since(*opened_at) >= cooldown {
                    *state = Inner::HalfOpen { in_flight: 1 };
                    true
                } else {
                    false
                }
            }
            Inner::HalfOpen { in_flight } => {
                if *in_flight < self.config.half_open_max_in_flight {
                    *state = Inner::HalfOpen {
                        in_flight: in_flight + 1,
                    };
                    true
                } else {
                    false
                }
            }
        }
    }

    fn record(&self, success: bool) {
        let mut state = self.state.lock().unwrap();
        *state = match (&*state, success) {
            (Inner::Closed { .. }, true) => Inner::Closed {
                consecutive_failures: 0,
            },
            (Inner::Closed { consecutive_failures }, false) => {
                let failures = consecutive_failures + 1;
                if failures >= self.config.failure_threshold {
                    warn!(failures, "circuit breaker opening after consecutive failures");
                    Inner::Open {
                        opened_at: self.clock.now(),
                    }
                } else {
                    Inner::Closed {
                        consecutive_failures: failures,
                    }
                }
            }
            (Inner::HalfOpen { .. }, true) => {
                tracing::info!("circuit breaker closing after successful probe");
                Inner::Closed {
                    consecutive_failures: 0,
                }
            }
            (Inner::HalfOpen { .. }, false) => {
                warn!("circuit breaker reopening after failed probe");
                Inner::Open {
                    opened_at: self.clock.now(),
                }
            }
            (Inner::Open { opened_at }, _) => Inner::Open {
                opened_at: *opened_at,
            },
        };
    }
}

/// Presets tuned for the two collaborators this crate actually guards.
pub mod presets {
    use super::Config;

    /// For the injected `RobotsFetcher`/`Fetcher` HTTP calls.
    pub fn http_external() -> Config {
        Config {
            failure_threshold: 5,
            open_cooldown_ms: 30_000,
            half_open_max_in_flight: 3,
        }
    }

    /// For calls into the indexer's job submission endpoint.
    pub fn internal_service() -> Config {
        Config {
            failure_threshold: 5,
            open_cooldown_ms: 15_000,
            half_open_max_in_flight: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    struct FakeClock {
        base: Instant,
        offset_ms: AtomicI64,
    }

    impl FakeClock {
        fn new() -> Self {
            Self {
                base: Instant::now(),
                offset_ms: AtomicI64::new(0),
            }
        }

        fn advance(&self, ms: i64) {
            self.offset_ms.fetch_add(ms, Ordering::SeqCst);
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            self.base + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst) as u64)
        }
    }

    fn test_config() -> Config {
        Config {
            failure_threshold: 2,
            open_cooldown_ms: 1000,
            half_open_max_in_flight: 1,
        }
    }

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let clock = Arc::new(FakeClock::new());
        let cb = CircuitBreaker::new(test_config(), clock);

        let _ = cb.guarded_call(|| async { Err::<(), _>("boom") }).await;
        assert_eq!(cb.state(), State::Closed);
        let _ = cb.guarded_call(|| async { Err::<(), _>("boom") }).await;
        assert_eq!(cb.state(), State::Open);
    }

    #[tokio::test]
    async fn rejects_calls_while_open() {
        let clock = Arc::new(FakeClock::new());
        let cb = CircuitBreaker::new(test_config(), clock);
        let _ = cb.guarded_call(|| async { Err::<(), _>("boom") }).await;
        let _ = cb.guarded_call(|| async { Err::<(), _>("boom") }).await;

        let mut called = false;
        let result = cb
            .guarded_call(|| async {
                called = true;
                Ok::<(), &str>(())
            })
            .await;
        assert!(matches!(result, Err(CallError::CircuitOpen)));
        assert!(!called);
    }

    #[tokio::test]
    async fn half_opens_after_cooldown_and_closes_on_success() {
        let clock = Arc::new(FakeClock::new());
        let cb = CircuitBreaker::new(test_config(), clock.clone());
        let _ = cb.guarded_call(|| async { Err::<(), _>("boom") }).await;
        let _ = cb.guarded_call(|| async { Err::<(), _>("boom") }).await;
        assert_eq!(cb.state(), State::Open);

        clock.advance(1000);
        let result = cb.guarded_call(|| async { Ok::<_, &str>(42) }).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(cb.state(), State::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens_circuit() {
        let clock = Arc::new(FakeClock::new());
        let cb = CircuitBreaker::new(test_config(), clock.clone());
        let _ = cb.guarded_call(|| async { Err::<(), _>("boom") }).await;
        let _ = cb.guarded_call(|| async { Err::<(), _>("boom") }).await;

        clock.advance(1000);
        let _ = cb.guarded_call(|| async { Err::<(), _>("still broken") }).await;
        assert_eq!(cb.state(), State::Open);
    }
}
