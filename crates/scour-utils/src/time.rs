//! Thin timestamp helpers, re-exported so callers don't reach for `chrono`
//! directly in every crate.

use chrono::{DateTime, Utc};

/// Current UTC instant. Centralized so tests can see where "now" is read
/// from when reasoning about determinism.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}
