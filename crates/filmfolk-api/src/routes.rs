//! API route definitions
//!
//! Route groups differ only in the middleware wrapped around them. Layers
//! added later run first, so the auth layer always sits below the role gate.

use crate::auth::middleware::{auth_middleware, optional_auth_middleware, require_role};
use crate::handlers::{auth, movies, oauth, reviews, users};
use crate::middleware::rate_limit::{auth_rate_limit_middleware, rate_limit_middleware};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use filmfolk_core::UserRole;
use std::sync::Arc;

/// Create API v1 routes
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Credential endpoints carry the stricter auth budget
    let credential_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/refresh", post(auth::refresh_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_rate_limit_middleware,
        ));

    let public_routes = Router::new()
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/google", get(oauth::google_login_handler))
        .route("/auth/google/callback", get(oauth::google_callback_handler));

    // Readable by anyone; identity attached when a valid token is sent
    let browse_routes = Router::new()
        .route("/movies", get(movies::list_movies))
        .route("/movies/:id", get(movies::get_movie))
        .route("/movies/:id/reviews", get(reviews::list_movie_reviews))
        .route("/reviews/:id", get(reviews::get_review))
        .route("/users/:id", get(users::get_profile))
        .route("/users/:id/followers", get(users::list_followers))
        .route("/users/:id/following", get(users::list_following))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            optional_auth_middleware,
        ));

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route("/users/me", put(users::update_me))
        .route("/movies", post(movies::create_movie))
        .route("/reviews", post(reviews::create_review))
        .route(
            "/reviews/:id",
            put(reviews::update_review).delete(reviews::delete_review),
        )
        .route("/reviews/:id/lock", post(reviews::lock_review))
        .route("/reviews/:id/unlock", post(reviews::unlock_review))
        .route("/reviews/comments", post(reviews::create_comment))
        .route("/reviews/comments/:id", delete(reviews::delete_comment))
        .route(
            "/users/:id/follow",
            post(users::follow_user).delete(users::unfollow_user),
        )
        .route("/users/:id/follow/status", get(users::follow_status))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let moderator_routes = Router::new()
        .route("/movies/:id", put(movies::update_movie))
        .route("/moderator/movies/pending", get(movies::list_pending_movies))
        .route("/moderator/movies/:id/approve", post(movies::approve_movie))
        .route("/moderator/movies/:id/reject", post(movies::reject_movie))
        .route_layer(middleware::from_fn(require_role(UserRole::Moderator)))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let admin_routes = Router::new()
        .route("/admin/movies/:id", delete(movies::delete_movie))
        .route("/admin/users/:id/status", put(users::set_user_status))
        .route("/admin/users/:id/role", put(users::set_user_role))
        .route_layer(middleware::from_fn(require_role(UserRole::Admin)))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(credential_routes)
        .merge(public_routes)
        .merge(browse_routes)
        .merge(protected_routes)
        .merge(moderator_routes)
        .merge(admin_routes)
        .layer(middleware::from_fn_with_state(state, rate_limit_middleware))
}
