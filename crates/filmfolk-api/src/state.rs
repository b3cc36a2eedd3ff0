//! Application state management

use crate::auth::oauth::{GoogleOAuthClient, OAuthProvider};
use crate::auth::service::AuthService;
use crate::catalog::{FollowerService, MovieService, ProfileService, ReviewService};
use crate::middleware::rate_limit::FixedWindowLimiter;
use crate::store::Repositories;
use filmfolk_core::config::AppConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Latency histogram buckets for one endpoint
#[derive(Debug, Clone, Default)]
pub struct LatencyBuckets {
    pub under_10ms: u64,
    pub ms_10_50: u64,
    pub ms_50_100: u64,
    pub ms_100_500: u64,
    pub ms_500_1000: u64,
    pub over_1s: u64,
}

impl LatencyBuckets {
    fn observe(&mut self, latency_us: u64) {
        let bucket = match latency_us {
            0..=9_999 => &mut self.under_10ms,
            10_000..=49_999 => &mut self.ms_10_50,
            50_000..=99_999 => &mut self.ms_50_100,
            100_000..=499_999 => &mut self.ms_100_500,
            500_000..=999_999 => &mut self.ms_500_1000,
            _ => &mut self.over_1s,
        };
        *bucket += 1;
    }
}

/// Request counters for one normalized endpoint
#[derive(Debug, Clone, Default)]
pub struct EndpointMetrics {
    pub status_counts: HashMap<u16, u64>,
    pub latency_buckets: LatencyBuckets,
    pub total_latency_us: u64,
    pub latency_count: u64,
    pub min_latency_us: u64,
    pub max_latency_us: u64,
}

impl EndpointMetrics {
    pub fn record(&mut self, status: u16, latency_us: u64) {
        *self.status_counts.entry(status).or_insert(0) += 1;
        self.latency_buckets.observe(latency_us);
        self.total_latency_us = self.total_latency_us.saturating_add(latency_us);
        self.min_latency_us = if self.latency_count == 0 {
            latency_us
        } else {
            self.min_latency_us.min(latency_us)
        };
        self.max_latency_us = self.max_latency_us.max(latency_us);
        self.latency_count += 1;
    }
}

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Storage backends
    pub repos: Repositories,
    pub auth: AuthService,
    pub movies: MovieService,
    pub reviews: ReviewService,
    pub followers: FollowerService,
    pub profiles: ProfileService,
    /// Google login; `None` when credentials are not configured
    pub oauth: Option<Arc<dyn OAuthProvider>>,
    /// Per-IP budget for every API route
    pub rate_limiter: FixedWindowLimiter,
    /// Stricter per-IP budget for credential endpoints
    pub auth_rate_limiter: FixedWindowLimiter,
    /// Per-endpoint request metrics
    pub metrics: RwLock<HashMap<String, EndpointMetrics>>,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Ready status
    pub is_ready: AtomicBool,
}

impl AppState {
    /// Create application state from validated config and storage
    pub fn new(config: AppConfig, repos: Repositories) -> Self {
        let oauth = GoogleOAuthClient::from_config(&config.oauth)
            .map(|client| Arc::new(client) as Arc<dyn OAuthProvider>);

        Self {
            auth: AuthService::new(&repos, &config.jwt),
            movies: MovieService::new(&repos),
            reviews: ReviewService::new(&repos),
            followers: FollowerService::new(&repos),
            profiles: ProfileService::new(&repos),
            oauth,
            rate_limiter: FixedWindowLimiter::per_minute(config.rate_limit.requests_per_minute),
            auth_rate_limiter: FixedWindowLimiter::per_minute(
                config.rate_limit.auth_requests_per_minute,
            ),
            metrics: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            is_ready: AtomicBool::new(true),
            repos,
            config,
        }
    }

    /// Replace the OAuth provider
    pub fn with_oauth_provider(mut self, provider: Option<Arc<dyn OAuthProvider>>) -> Self {
        self.oauth = provider;
        self
    }

    /// Replace the auth service (tests lower the bcrypt cost)
    pub fn with_auth_service(mut self, auth: AuthService) -> Self {
        self.auth = auth;
        self
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Set ready status; cleared when shutdown begins
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }

    /// Record one finished request
    pub async fn record_request(&self, endpoint: String, status: u16, latency_us: u64) {
        self.increment_requests();
        self.metrics
            .write()
            .await
            .entry(endpoint)
            .or_default()
            .record(status, latency_us);
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl AppState {
    /// Development config for tests
    pub fn test_config() -> AppConfig {
        let values: HashMap<String, String> = [
            ("APP_NAME", "filmfolk"),
            ("APP_PORT", "8080"),
            ("APP_ENV", "development"),
            ("ALLOWED_ORIGINS", "http://localhost:3000"),
            ("DB_HOST", "localhost"),
            ("DB_PORT", "5432"),
            ("DB_USER", "filmfolk"),
            ("DB_PASSWORD", "filmfolk"),
            ("DB_NAME", "filmfolk_test"),
            ("DB_SSLMODE", "disable"),
            ("JWT_SECRET_KEY", "test-signing-secret-0123456789"),
            ("JWT_ACCESS_TOKEN_TTL", "15"),
            ("JWT_REFRESH_TOKEN_TTL", "7"),
            ("FRONTEND_URL", "http://localhost:3000"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        match AppConfig::from_map(&values) {
            Ok(config) => config,
            Err(e) => panic!("test config must be valid: {e}"),
        }
    }

    /// In-memory state with a fast password hasher and no OAuth provider
    pub fn for_testing() -> Self {
        Self::for_testing_with_config(Self::test_config())
    }

    pub fn for_testing_with_config(config: AppConfig) -> Self {
        use crate::auth::password::PasswordConfig;

        let repos = Repositories::in_memory();
        let auth = AuthService::new(&repos, &config.jwt)
            .with_password_config(PasswordConfig::fast_for_tests());
        Self::new(config, repos).with_auth_service(auth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        let mut metrics = EndpointMetrics::default();
        for latency in [500, 20_000, 70_000, 300_000, 700_000, 2_000_000] {
            metrics.record(200, latency);
        }
        metrics.record(404, 100);

        let buckets = &metrics.latency_buckets;
        assert_eq!(buckets.under_10ms, 2);
        assert_eq!(buckets.ms_10_50, 1);
        assert_eq!(buckets.ms_50_100, 1);
        assert_eq!(buckets.ms_100_500, 1);
        assert_eq!(buckets.ms_500_1000, 1);
        assert_eq!(buckets.over_1s, 1);
        assert_eq!(metrics.status_counts[&200], 6);
        assert_eq!(metrics.status_counts[&404], 1);
        assert_eq!(metrics.min_latency_us, 100);
        assert_eq!(metrics.max_latency_us, 2_000_000);
        assert_eq!(metrics.latency_count, 7);
    }

    #[tokio::test]
    async fn test_record_request() {
        let state = AppState::for_testing();
        state
            .record_request("/api/v1/movies".to_string(), 200, 1_000)
            .await;
        state
            .record_request("/api/v1/movies".to_string(), 500, 3_000)
            .await;

        assert_eq!(state.get_request_count(), 2);
        let metrics = state.metrics.read().await;
        assert_eq!(metrics["/api/v1/movies"].total_latency_us, 4_000);
    }

    #[test]
    fn test_oauth_disabled_without_credentials() {
        let state = AppState::for_testing();
        assert!(state.oauth.is_none());
        assert!(state.is_ready());
        state.set_ready(false);
        assert!(!state.is_ready());
    }
}
