//! Circuit breaker primitive wrapping out-of-scope external collaborators.

pub mod circuit;

pub use circuit::{CallError, CircuitBreaker, Clock, Config, RealClock, State};
