//! `X-API-Key` guard for `POST /indexer/page` (§6). Comparison runs in
//! time proportional to the configured key's length only, not to where
//! the two strings first differ.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

use crate::errors::Unauthorized;
use crate::state::AppState;

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let mut diff = (a.len() ^ b.len()) as u8;
    for i in 0..a.len().max(b.len()) {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= x ^ y;
    }
    diff == 0
}

pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, Unauthorized> {
    if !state.config.auth.require_auth {
        return Ok(next.run(req).await);
    }

    let Some(expected) = state.config.auth.api_key.as_deref() else {
        return Err(Unauthorized);
    };
    let provided = req
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if constant_time_eq(expected.as_bytes(), provided.as_bytes()) {
        Ok(next.run(req).await)
    } else {
        Err(Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_strings_match() {
        assert!(constant_time_eq(b"secret-key", b"secret-key"));
    }

    #[test]
    fn different_strings_do_not_match() {
        assert!(!constant_time_eq(b"secret-key", b"wrong-key!"));
    }

    #[test]
    fn different_lengths_do_not_match() {
        assert!(!constant_time_eq(b"short", b"much-longer-key"));
    }
}
