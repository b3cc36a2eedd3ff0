//! Health check and metrics handlers

use crate::state::{AppState, EndpointMetrics};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;
use utoipa::ToSchema;

const SERVICE_NAME: &str = "filmfolk-api";

/// Basic health response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

/// Health of one dependency
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Detailed health response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DetailedHealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub database: ComponentHealth,
}

/// Readiness response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub database: bool,
}

/// Basic health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
    })
}

async fn database_health(state: &AppState) -> ComponentHealth {
    let start = Instant::now();
    match state.repos.health.ping().await {
        Ok(()) => ComponentHealth {
            status: "healthy".to_string(),
            latency_ms: Some(start.elapsed().as_secs_f64() * 1000.0),
            error: None,
        },
        Err(e) => ComponentHealth {
            status: "unhealthy".to_string(),
            latency_ms: None,
            error: Some(e.to_string()),
        },
    }
}

/// Health with dependency checks
#[utoipa::path(
    get,
    path = "/health/detailed",
    tag = "health",
    responses(
        (status = 200, description = "All dependencies healthy", body = DetailedHealthResponse),
        (status = 503, description = "A dependency is down", body = DetailedHealthResponse)
    )
)]
pub async fn detailed_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = database_health(&state).await;
    let healthy = database.error.is_none();

    let response = DetailedHealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_secs(),
        database,
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// Readiness probe - checks the database
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Service is ready", body = ReadinessResponse),
        (status = 503, description = "Service not ready", body = ReadinessResponse)
    )
)]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = state.repos.health.ping().await.is_ok();
    let ready = state.is_ready() && database;

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(ReadinessResponse { ready, database }))
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses(
        (status = 200, description = "Process is alive")
    )
)]
pub async fn liveness_check() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "alive" })))
}

/// Prometheus-compatible metrics endpoint
pub async fn prometheus_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let metrics = state.metrics.read().await;
    let output = render_prometheus(
        state.uptime_secs(),
        state.get_request_count(),
        state.is_ready(),
        &metrics,
    );

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        output,
    )
}

fn render_prometheus(
    uptime: u64,
    total_requests: u64,
    ready: bool,
    metrics: &std::collections::HashMap<String, EndpointMetrics>,
) -> String {
    let mut output = String::new();

    // Sorted so scrapes diff cleanly
    let mut endpoints: Vec<(&String, &EndpointMetrics)> = metrics.iter().collect();
    endpoints.sort_by(|a, b| a.0.cmp(b.0));

    // writeln! into a String cannot fail
    let _ = writeln!(output, "# HELP filmfolk_uptime_seconds Time since server start");
    let _ = writeln!(output, "# TYPE filmfolk_uptime_seconds gauge");
    let _ = writeln!(output, "filmfolk_uptime_seconds {uptime}\n");

    let _ = writeln!(output, "# HELP filmfolk_requests_total Total number of HTTP requests");
    let _ = writeln!(output, "# TYPE filmfolk_requests_total counter");
    let _ = writeln!(output, "filmfolk_requests_total {total_requests}\n");

    let _ = writeln!(output, "# HELP filmfolk_ready Whether the service accepts traffic");
    let _ = writeln!(output, "# TYPE filmfolk_ready gauge");
    let _ = writeln!(output, "filmfolk_ready {}\n", u8::from(ready));

    let _ = writeln!(output, "# HELP filmfolk_build_info Build information");
    let _ = writeln!(output, "# TYPE filmfolk_build_info gauge");
    let _ = writeln!(
        output,
        "filmfolk_build_info{{version=\"{}\"}} 1\n",
        env!("CARGO_PKG_VERSION")
    );

    let _ = writeln!(output, "# HELP filmfolk_http_requests_total HTTP requests by endpoint and status");
    let _ = writeln!(output, "# TYPE filmfolk_http_requests_total counter");
    for (endpoint, m) in &endpoints {
        let mut statuses: Vec<_> = m.status_counts.iter().collect();
        statuses.sort();
        for (status, count) in statuses {
            let _ = writeln!(
                output,
                "filmfolk_http_requests_total{{endpoint=\"{endpoint}\",status=\"{status}\"}} {count}"
            );
        }
    }
    output.push('\n');

    let _ = writeln!(output, "# HELP filmfolk_http_request_duration_seconds HTTP request latency");
    let _ = writeln!(output, "# TYPE filmfolk_http_request_duration_seconds histogram");
    for (endpoint, m) in &endpoints {
        if m.latency_count == 0 {
            continue;
        }
        let buckets = &m.latency_buckets;
        let mut cumulative = 0u64;
        for (le, count) in [
            ("0.01", buckets.under_10ms),
            ("0.05", buckets.ms_10_50),
            ("0.1", buckets.ms_50_100),
            ("0.5", buckets.ms_100_500),
            ("1.0", buckets.ms_500_1000),
            ("+Inf", buckets.over_1s),
        ] {
            cumulative += count;
            let _ = writeln!(
                output,
                "filmfolk_http_request_duration_seconds_bucket{{endpoint=\"{endpoint}\",le=\"{le}\"}} {cumulative}"
            );
        }
        let _ = writeln!(
            output,
            "filmfolk_http_request_duration_seconds_sum{{endpoint=\"{endpoint}\"}} {:.6}",
            m.total_latency_us as f64 / 1_000_000.0
        );
        let _ = writeln!(
            output,
            "filmfolk_http_request_duration_seconds_count{{endpoint=\"{endpoint}\"}} {}",
            m.latency_count
        );
    }
    output.push('\n');

    let _ = writeln!(output, "# HELP filmfolk_http_request_duration_extremes_seconds Fastest and slowest request");
    let _ = writeln!(output, "# TYPE filmfolk_http_request_duration_extremes_seconds gauge");
    for (endpoint, m) in &endpoints {
        if m.latency_count == 0 {
            continue;
        }
        let _ = writeln!(
            output,
            "filmfolk_http_request_duration_extremes_seconds{{endpoint=\"{endpoint}\",kind=\"min\"}} {:.6}",
            m.min_latency_us as f64 / 1_000_000.0
        );
        let _ = writeln!(
            output,
            "filmfolk_http_request_duration_extremes_seconds{{endpoint=\"{endpoint}\",kind=\"max\"}} {:.6}",
            m.max_latency_us as f64 / 1_000_000.0
        );
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_health_body() {
        let Json(body) = health_check().await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.service, "filmfolk-api");
    }

    #[test]
    fn test_render_prometheus() {
        let mut metrics = HashMap::new();
        let mut movies = EndpointMetrics::default();
        movies.record(200, 5_000);
        movies.record(200, 60_000);
        movies.record(404, 2_000_000);
        metrics.insert("/api/v1/movies".to_string(), movies);

        let text = render_prometheus(42, 3, true, &metrics);
        assert!(text.contains("filmfolk_uptime_seconds 42"));
        assert!(text.contains("filmfolk_requests_total 3"));
        assert!(text.contains(
            "filmfolk_http_requests_total{endpoint=\"/api/v1/movies\",status=\"200\"} 2"
        ));
        assert!(text.contains(
            "filmfolk_http_request_duration_seconds_bucket{endpoint=\"/api/v1/movies\",le=\"0.01\"} 1"
        ));
        assert!(text.contains(
            "filmfolk_http_request_duration_seconds_bucket{endpoint=\"/api/v1/movies\",le=\"0.1\"} 2"
        ));
        assert!(text.contains(
            "filmfolk_http_request_duration_seconds_bucket{endpoint=\"/api/v1/movies\",le=\"+Inf\"} 3"
        ));
        assert!(text.contains(
            "filmfolk_http_request_duration_seconds_count{endpoint=\"/api/v1/movies\"} 3"
        ));
    }
}
