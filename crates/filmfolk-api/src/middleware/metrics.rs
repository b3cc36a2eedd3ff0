//! Metrics tracking middleware
//!
//! Tracks request latency, counts, and status codes for the Prometheus
//! endpoint.

use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;

/// Metrics tracking middleware
///
/// Records:
/// - Request count per endpoint
/// - Request latency distribution
/// - Response status codes
pub async fn metrics_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let endpoint = normalize_endpoint(request.uri().path());

    let response = next.run(request).await;

    let latency_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
    let status = response.status().as_u16();

    // Record off the response path
    tokio::spawn(async move {
        state.record_request(endpoint, status, latency_us).await;
    });

    response
}

/// Normalize endpoint paths for consistent metrics
///
/// Replaces UUID and numeric segments with `:id` so that
/// `/api/v1/movies/<uuid>/reviews` is one series.
pub fn normalize_endpoint(path: &str) -> String {
    path.split('/')
        .map(|seg| if is_uuid(seg) || is_numeric(seg) { ":id" } else { seg })
        .collect::<Vec<_>>()
        .join("/")
}

/// Check if a string looks like a UUID
fn is_uuid(s: &str) -> bool {
    s.len() == 36
        && s.chars().enumerate().all(|(i, c)| match i {
            8 | 13 | 18 | 23 => c == '-',
            _ => c.is_ascii_hexdigit(),
        })
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(
            normalize_endpoint("/api/v1/movies/550e8400-e29b-41d4-a716-446655440000/reviews"),
            "/api/v1/movies/:id/reviews"
        );
        assert_eq!(
            normalize_endpoint("/api/v1/users/550e8400-e29b-41d4-a716-446655440000/follow"),
            "/api/v1/users/:id/follow"
        );
        assert_eq!(normalize_endpoint("/api/v1/movies"), "/api/v1/movies");
        assert_eq!(normalize_endpoint("/health"), "/health");
        assert_eq!(normalize_endpoint("/api/v1/legacy/42"), "/api/v1/legacy/:id");
    }

    #[test]
    fn test_is_uuid() {
        assert!(is_uuid("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!is_uuid("not-a-uuid"));
        assert!(!is_uuid("123"));
    }

    #[test]
    fn test_is_numeric() {
        assert!(is_numeric("123"));
        assert!(!is_numeric("12a"));
        assert!(!is_numeric(""));
    }
}
