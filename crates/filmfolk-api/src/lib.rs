//! filmfolk API - REST server
//!
//! HTTP endpoints for the social movie-review backend: accounts and
//! sessions, the movie catalog, reviews with comment threads, and the
//! follow graph.

pub mod audit;
pub mod auth;
pub mod catalog;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod store;

use crate::handlers::health;
use crate::state::AppState;
use axum::{middleware as axum_middleware, routing::get, Router};
use std::sync::Arc;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI document
#[derive(OpenApi)]
#[openapi(
    info(title = "filmfolk API", description = "Social movie-review backend"),
    paths(
        handlers::auth::register_handler,
        handlers::auth::login_handler,
        handlers::auth::refresh_handler,
        handlers::auth::logout_handler,
        handlers::auth::me_handler,
        handlers::oauth::google_login_handler,
        handlers::oauth::google_callback_handler,
        handlers::movies::list_movies,
        handlers::movies::get_movie,
        handlers::movies::create_movie,
        handlers::movies::update_movie,
        handlers::movies::list_pending_movies,
        handlers::movies::approve_movie,
        handlers::movies::reject_movie,
        handlers::movies::delete_movie,
        handlers::reviews::list_movie_reviews,
        handlers::reviews::get_review,
        handlers::reviews::create_review,
        handlers::reviews::update_review,
        handlers::reviews::delete_review,
        handlers::reviews::lock_review,
        handlers::reviews::unlock_review,
        handlers::reviews::create_comment,
        handlers::reviews::delete_comment,
        handlers::users::get_profile,
        handlers::users::update_me,
        handlers::users::list_followers,
        handlers::users::list_following,
        handlers::users::follow_user,
        handlers::users::unfollow_user,
        handlers::users::follow_status,
        handlers::users::set_user_status,
        handlers::users::set_user_role,
        health::health_check,
        health::detailed_health,
        health::readiness_check,
        health::liveness_check,
    ),
    components(schemas(
        error::ApiError,
        auth::RegisterRequest,
        auth::LoginRequest,
        auth::RefreshRequest,
        auth::LogoutRequest,
        auth::AuthResponse,
        auth::UserInfo,
        auth::AccountPublic,
        handlers::auth::MessageResponse,
        catalog::models::Movie,
        catalog::models::MovieList,
        catalog::models::Review,
        catalog::models::ReviewComment,
        catalog::models::CommentNode,
        catalog::models::ReviewDetail,
        catalog::models::ReviewList,
        catalog::models::AccountList,
        catalog::movies::CreateMovieRequest,
        catalog::movies::UpdateMovieRequest,
        catalog::reviews::CreateReviewRequest,
        catalog::reviews::UpdateReviewRequest,
        catalog::reviews::CreateCommentRequest,
        catalog::profiles::UserProfile,
        catalog::profiles::UpdateProfileRequest,
        catalog::profiles::UpdateStatusRequest,
        catalog::profiles::UpdateRoleRequest,
        handlers::users::FollowStatusResponse,
        health::HealthResponse,
        health::ComponentHealth,
        health::DetailedHealthResponse,
        health::ReadinessResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, login and sessions"),
        (name = "movies", description = "Movie catalog"),
        (name = "reviews", description = "Reviews and comment threads"),
        (name = "users", description = "Profiles and follows"),
        (name = "moderation", description = "Moderator queue"),
        (name = "admin", description = "Administration"),
        (name = "health", description = "Health probes"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Build the application router
///
/// Transport layers (CORS, tracing, timeout) are added by the binary so
/// tests can drive this router directly.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health::health_check))
        .route("/health/detailed", get(health::detailed_health))
        .route("/health/ready", get(health::readiness_check))
        .route("/health/live", get(health::liveness_check))
        .route("/metrics", get(health::prometheus_metrics))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::metrics_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::security_headers_middleware,
        ))
        .with_state(state)
}
