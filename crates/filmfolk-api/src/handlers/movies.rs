//! Movie catalog handlers

use crate::audit::{audit_log, AuditEvent};
use crate::auth::AuthenticatedUser;
use crate::catalog::models::{Movie, MovieList};
use crate::catalog::movies::{CreateMovieRequest, MovieQuery, UpdateMovieRequest};
use crate::error::{ApiJson, AppError};
use crate::handlers::auth::MessageResponse;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// List approved movies
#[utoipa::path(
    get,
    path = "/api/v1/movies",
    tag = "movies",
    params(MovieQuery),
    responses(
        (status = 200, description = "Page of approved movies", body = MovieList),
    )
)]
pub async fn list_movies(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MovieQuery>,
) -> Result<Json<MovieList>, AppError> {
    Ok(Json(state.movies.list_public(query).await?))
}

/// Get a movie
///
/// Pending and rejected movies are visible to their submitter and to
/// moderators only.
#[utoipa::path(
    get,
    path = "/api/v1/movies/{id}",
    tag = "movies",
    params(("id" = Uuid, Path, description = "Movie id")),
    responses(
        (status = 200, description = "Movie", body = Movie),
        (status = 404, description = "Movie not found", body = crate::error::ApiError),
    )
)]
pub async fn get_movie(
    State(state): State<Arc<AppState>>,
    user: Option<Extension<AuthenticatedUser>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Movie>, AppError> {
    let viewer = user.as_ref().map(|Extension(u)| u);
    Ok(Json(state.movies.get(id, viewer).await?))
}

/// Submit a movie for approval
#[utoipa::path(
    post,
    path = "/api/v1/movies",
    tag = "movies",
    request_body = CreateMovieRequest,
    responses(
        (status = 201, description = "Movie submitted, pending approval", body = Movie),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 409, description = "Duplicate TMDB id", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_movie(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(request): ApiJson<CreateMovieRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    let movie = state.movies.create(request.into(), user.user_id).await?;
    Ok((StatusCode::CREATED, Json(movie)))
}

/// Edit a movie (moderator)
#[utoipa::path(
    put,
    path = "/api/v1/movies/{id}",
    tag = "movies",
    params(("id" = Uuid, Path, description = "Movie id")),
    request_body = UpdateMovieRequest,
    responses(
        (status = 200, description = "Updated movie", body = Movie),
        (status = 403, description = "Moderator role required", body = crate::error::ApiError),
        (status = 404, description = "Movie not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_movie(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<UpdateMovieRequest>,
) -> Result<Json<Movie>, AppError> {
    request.validate()?;
    let movie = state.movies.update(id, request.into()).await?;
    audit_log(&AuditEvent::ModerationAction {
        actor_id: user.user_id,
        action: "update_movie".to_string(),
        target_type: "movie".to_string(),
        target_id: id,
        detail: None,
    });
    Ok(Json(movie))
}

/// Movies awaiting approval (moderator)
#[utoipa::path(
    get,
    path = "/api/v1/moderator/movies/pending",
    tag = "moderation",
    params(MovieQuery),
    responses(
        (status = 200, description = "Pending submissions", body = MovieList),
        (status = 403, description = "Moderator role required", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_pending_movies(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MovieQuery>,
) -> Result<Json<MovieList>, AppError> {
    Ok(Json(state.movies.list_pending(query).await?))
}

/// Approve a submission (moderator)
#[utoipa::path(
    post,
    path = "/api/v1/moderator/movies/{id}/approve",
    tag = "moderation",
    params(("id" = Uuid, Path, description = "Movie id")),
    responses(
        (status = 200, description = "Approved movie", body = Movie),
        (status = 400, description = "Already approved", body = crate::error::ApiError),
        (status = 404, description = "Movie not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn approve_movie(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Movie>, AppError> {
    let movie = state.movies.approve(id, user.user_id).await?;
    audit_log(&AuditEvent::ModerationAction {
        actor_id: user.user_id,
        action: "approve_movie".to_string(),
        target_type: "movie".to_string(),
        target_id: id,
        detail: Some(movie.title.clone()),
    });
    Ok(Json(movie))
}

/// Reject a submission (moderator)
#[utoipa::path(
    post,
    path = "/api/v1/moderator/movies/{id}/reject",
    tag = "moderation",
    params(("id" = Uuid, Path, description = "Movie id")),
    responses(
        (status = 200, description = "Rejected movie", body = Movie),
        (status = 400, description = "Already rejected", body = crate::error::ApiError),
        (status = 404, description = "Movie not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn reject_movie(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Movie>, AppError> {
    let movie = state.movies.reject(id).await?;
    audit_log(&AuditEvent::ModerationAction {
        actor_id: user.user_id,
        action: "reject_movie".to_string(),
        target_type: "movie".to_string(),
        target_id: id,
        detail: Some(movie.title.clone()),
    });
    Ok(Json(movie))
}

/// Delete a movie with its reviews (admin)
#[utoipa::path(
    delete,
    path = "/api/v1/admin/movies/{id}",
    tag = "admin",
    params(("id" = Uuid, Path, description = "Movie id")),
    responses(
        (status = 200, description = "Movie deleted", body = MessageResponse),
        (status = 403, description = "Admin role required", body = crate::error::ApiError),
        (status = 404, description = "Movie not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_movie(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state.movies.delete(id).await?;
    audit_log(&AuditEvent::ModerationAction {
        actor_id: user.user_id,
        action: "delete_movie".to_string(),
        target_type: "movie".to_string(),
        target_id: id,
        detail: None,
    });
    Ok(Json(MessageResponse::new("movie deleted successfully")))
}
