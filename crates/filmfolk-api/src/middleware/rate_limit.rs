//! Fixed-window rate limiting per client IP
//!
//! Two budgets run side by side:
//! - General: every API route, `RATE_LIMIT_PER_MINUTE` per IP
//! - Auth: register, login and refresh, `AUTH_RATE_LIMIT_PER_MINUTE` per IP
//!
//! The limiter never blocks a request because of its own failure. A
//! poisoned lock lets the request through unthrottled.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::warn;

use super::client_ip;
use crate::audit::{audit_log, AuditEvent};
use crate::state::AppState;

/// Entries beyond this count trigger a sweep of expired windows
const SWEEP_THRESHOLD: usize = 10_000;

/// Counter for one key inside the current window
#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Outcome of a rate-limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// When the current window ends, as Unix seconds
    pub reset_at: i64,
    /// Seconds until the current window ends
    pub retry_after: u64,
}

/// In-memory fixed-window limiter keyed by client IP
pub struct FixedWindowLimiter {
    windows: Mutex<HashMap<String, Window>>,
    limit: u32,
    period: Duration,
}

impl FixedWindowLimiter {
    pub fn new(limit: u32, period: Duration) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            limit,
            period,
        }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Count one request for `key`
    ///
    /// Returns `None` when the limiter state is unavailable; callers let
    /// the request through in that case.
    pub fn check(&self, key: &str) -> Option<RateLimitDecision> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Option<RateLimitDecision> {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!(key, "rate limiter lock poisoned, allowing request");
                return None;
            }
        };

        if windows.len() > SWEEP_THRESHOLD {
            let period = self.period;
            windows.retain(|_, w| now.duration_since(w.started) < period);
        }

        let window = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(window.started) >= self.period {
            *window = Window {
                started: now,
                count: 0,
            };
        }

        let allowed = window.count < self.limit;
        if allowed {
            window.count += 1;
        }

        let left = self.period.saturating_sub(now.duration_since(window.started));
        let retry_after = left.as_secs() + u64::from(left.subsec_nanos() > 0);
        Some(RateLimitDecision {
            allowed,
            limit: self.limit,
            remaining: self.limit.saturating_sub(window.count),
            reset_at: Utc::now().timestamp() + retry_after as i64,
            retry_after,
        })
    }

    /// Forget every window (tests only)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn reset(&self) {
        if let Ok(mut windows) = self.windows.lock() {
            windows.clear();
        }
    }
}

/// Which budget a middleware enforces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitScope {
    General,
    Auth,
}

impl RateLimitScope {
    fn as_str(&self) -> &'static str {
        match self {
            RateLimitScope::General => "general",
            RateLimitScope::Auth => "auth",
        }
    }
}

#[derive(Debug, Serialize)]
struct RateLimitBody {
    error: &'static str,
    message: &'static str,
    retry_after: u64,
}

/// General budget, applied to every API route
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    enforce(&state.rate_limiter, RateLimitScope::General, request, next).await
}

/// Auth budget, applied on top of the general one for credential routes
pub async fn auth_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    enforce(&state.auth_rate_limiter, RateLimitScope::Auth, request, next).await
}

async fn enforce(
    limiter: &FixedWindowLimiter,
    scope: RateLimitScope,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(request.headers(), request.extensions());
    let Some(decision) = limiter.check(&ip) else {
        return next.run(request).await;
    };

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        let path = request.uri().path().to_string();
        warn!(ip = %ip, path = %path, scope = scope.as_str(), "rate limit exceeded");
        audit_log(&AuditEvent::RateLimitExceeded {
            ip_address: ip,
            scope: scope.as_str().to_string(),
            resource: path,
        });
        rejection(scope, decision.retry_after)
    };

    apply_headers(&mut response, &decision);
    response
}

fn rejection(scope: RateLimitScope, retry_after: u64) -> Response {
    let (error, message) = match scope {
        RateLimitScope::General => (
            "Rate limit exceeded",
            "Too many requests. Please try again later.",
        ),
        RateLimitScope::Auth => (
            "Too many authentication attempts",
            "Please wait before trying again.",
        ),
    };

    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(RateLimitBody {
            error,
            message,
            retry_after,
        }),
    )
        .into_response()
}

fn apply_headers(response: &mut Response, decision: &RateLimitDecision) {
    let headers = response.headers_mut();
    for (name, value) in [
        ("x-ratelimit-limit", decision.limit.to_string()),
        ("x-ratelimit-remaining", decision.remaining.to_string()),
        ("x-ratelimit-reset", decision.reset_at.to_string()),
    ] {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(HeaderName::from_static(name), value);
        }
    }
}
