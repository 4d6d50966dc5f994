//! Request middleware for the job-management API: request ids, bearer-token
//! auth, and per-caller rate limiting.
//!
//! Rejections use the same [`ApiError`] envelope as the route handlers, so a
//! client sees one error shape whether a request dies here or in a handler.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::ApiError;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Bearer tokens allowed to manage scheduled jobs.
///
/// An empty key set means auth is off; [`AuthState::from_env`] only permits
/// that in development, so production always runs closed.
#[derive(Debug, Clone)]
pub struct AuthState {
    keys: Arc<HashSet<String>>,
}

impl AuthState {
    /// Builds auth config from `COPYCHEF_API_KEYS` (comma-separated tokens).
    ///
    /// # Errors
    ///
    /// Fails when no keys are configured outside development.
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        let raw = std::env::var("COPYCHEF_API_KEYS").unwrap_or_default();
        let keys: HashSet<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect();

        if keys.is_empty() && !is_development {
            anyhow::bail!(
                "COPYCHEF_API_KEYS is required outside development; provide comma-separated bearer tokens"
            );
        }
        if keys.is_empty() {
            tracing::warn!(
                "COPYCHEF_API_KEYS not set; bearer auth disabled in development environment"
            );
        }

        Ok(Self {
            keys: Arc::new(keys),
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: Instant,
    count: usize,
}

/// Fixed-window request limiter tracked per caller.
///
/// The caller identity is the bearer token when one is presented, so one
/// client hammering the trigger route cannot starve the others. Requests
/// without a token (development with auth off) share a single bucket.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    buckets: Arc<Mutex<HashMap<String, Window>>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Count one request for `caller`; `false` means over the limit.
    async fn admit(&self, caller: &str) -> bool {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;
        // Expired windows are dead weight; dropping them here bounds the map
        // to callers seen within the current window.
        buckets.retain(|_, w| now.duration_since(w.started_at) < self.window);

        let window = buckets.entry(caller.to_string()).or_insert(Window {
            started_at: now,
            count: 0,
        });
        if window.count >= self.max_requests {
            return false;
        }
        window.count += 1;
        true
    }
}

/// Axum middleware that extracts or generates a request ID.
///
/// An incoming `x-request-id` header is reused, otherwise a fresh `UUIDv4` is
/// generated. The ID rides along as a [`RequestId`] extension and is echoed
/// back on the response header.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Middleware enforcing bearer-token auth when keys are configured.
pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Response {
    if auth.keys.is_empty() {
        return next.run(req).await;
    }

    match bearer_token(req.headers().get(AUTHORIZATION)) {
        Some(token) if auth.keys.contains(token) => next.run(req).await,
        _ => reject(&req, "unauthorized", "missing or invalid bearer token"),
    }
}

/// Middleware enforcing the per-caller request budget.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let caller = bearer_token(req.headers().get(AUTHORIZATION))
        .unwrap_or("anonymous")
        .to_string();

    if rate_limit.admit(&caller).await {
        next.run(req).await
    } else {
        reject(&req, "rate_limited", "rate limit exceeded")
    }
}

/// Build an envelope rejection carrying the request's id.
fn reject(req: &Request, code: &str, message: &str) -> Response {
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map_or_else(|| "unknown".to_string(), |id| id.0.clone());
    ApiError::new(request_id, code, message).into_response()
}

fn bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_accepts_valid_header() {
        let header = HeaderValue::from_static("Bearer test-token");
        assert_eq!(bearer_token(Some(&header)), Some("test-token"));
    }

    #[test]
    fn bearer_token_rejects_non_bearer_header() {
        let header = HeaderValue::from_static("Basic abc123");
        assert_eq!(bearer_token(Some(&header)), None);
    }

    #[test]
    fn bearer_token_rejects_blank_token() {
        let header = HeaderValue::from_static("Bearer   ");
        assert_eq!(bearer_token(Some(&header)), None);
    }

    #[test]
    fn auth_state_runs_open_without_keys_in_dev() {
        std::env::remove_var("COPYCHEF_API_KEYS");
        let state = AuthState::from_env(true).expect("dev should allow missing keys");
        assert!(state.keys.is_empty());
    }

    #[tokio::test]
    async fn rate_limit_buckets_are_per_caller() {
        let limit = RateLimitState::new(2, Duration::from_secs(60));

        assert!(limit.admit("token-a").await);
        assert!(limit.admit("token-a").await);
        assert!(!limit.admit("token-a").await, "third request over budget");
        assert!(
            limit.admit("token-b").await,
            "a different caller has its own budget"
        );
    }

    #[tokio::test]
    async fn rate_limit_window_resets_after_expiry() {
        let limit = RateLimitState::new(1, Duration::from_millis(20));

        assert!(limit.admit("token-a").await);
        assert!(!limit.admit("token-a").await);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(limit.admit("token-a").await, "expired window starts fresh");
    }
}
