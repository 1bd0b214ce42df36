//! Request guard: bearer-token auth and a global rate limit.

use super::types::ErrorResponse;
use axum::Json;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::warn;

/// Shared guard settings.
pub struct Guard {
    api_key: Option<String>,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl Guard {
    /// `api_key: None` disables auth; `per_second: None` (or 0) disables rate limiting.
    pub fn new(api_key: Option<String>, per_second: Option<u32>) -> Self {
        let limiter = per_second
            .and_then(NonZeroU32::new)
            .map(|n| RateLimiter::direct(Quota::per_second(n)));
        Self {
            api_key: api_key.filter(|k| !k.is_empty()),
            limiter,
        }
    }

    fn authorized(&self, header_value: Option<&str>) -> bool {
        let Some(expected) = &self.api_key else {
            return true;
        };
        let Some(token) = header_value.and_then(|v| v.strip_prefix("Bearer ")) else {
            return false;
        };
        token.as_bytes().ct_eq(expected.as_bytes()).into()
    }

    fn admit(&self) -> bool {
        self.limiter.as_ref().is_none_or(|l| l.check().is_ok())
    }
}

fn reject(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Middleware applied to every route except `/health`.
pub async fn guard_requests(State(guard): State<Arc<Guard>>, req: Request, next: Next) -> Response {
    if !guard.admit() {
        return reject(StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded");
    }

    let auth = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if !guard.authorized(auth) {
        warn!(path = %req.uri().path(), "rejected unauthenticated request");
        return reject(StatusCode::UNAUTHORIZED, "missing or invalid API key");
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_key_allows_everything() {
        let guard = Guard::new(None, None);
        assert!(guard.authorized(None));
        assert!(guard.admit());
    }

    #[test]
    fn bearer_token_checked() {
        let guard = Guard::new(Some("secret".into()), None);
        assert!(guard.authorized(Some("Bearer secret")));
        assert!(!guard.authorized(Some("Bearer secre")));
        assert!(!guard.authorized(Some("secret")));
        assert!(!guard.authorized(None));
    }

    #[test]
    fn limiter_exhausts() {
        let guard = Guard::new(None, Some(1));
        assert!(guard.admit());
        assert!(!guard.admit());
    }
}
