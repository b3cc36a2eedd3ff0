//! Review and comment handlers

use crate::audit::{audit_log, AuditEvent};
use crate::auth::AuthenticatedUser;
use crate::catalog::models::{Review, ReviewComment, ReviewDetail, ReviewList};
use crate::catalog::reviews::{
    CreateCommentRequest, CreateReviewRequest, PageQuery, UpdateReviewRequest,
};
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

/// Published reviews of a movie
#[utoipa::path(
    get,
    path = "/api/v1/movies/{id}/reviews",
    tag = "reviews",
    params(("id" = Uuid, Path, description = "Movie id"), PageQuery),
    responses(
        (status = 200, description = "Page of reviews, newest first", body = ReviewList),
        (status = 404, description = "Movie not found", body = crate::error::ApiError),
    )
)]
pub async fn list_movie_reviews(
    State(state): State<Arc<AppState>>,
    Path(movie_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ReviewList>, AppError> {
    Ok(Json(state.reviews.list_for_movie(movie_id, query).await?))
}

/// Review with its comment tree
#[utoipa::path(
    get,
    path = "/api/v1/reviews/{id}",
    tag = "reviews",
    params(("id" = Uuid, Path, description = "Review id")),
    responses(
        (status = 200, description = "Review with comments", body = ReviewDetail),
        (status = 404, description = "Review not found", body = crate::error::ApiError),
    )
)]
pub async fn get_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReviewDetail>, AppError> {
    Ok(Json(state.reviews.detail(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/reviews",
    tag = "reviews",
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created", body = Review),
        (status = 404, description = "Movie not found", body = crate::error::ApiError),
        (status = 409, description = "Movie already reviewed", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(request): ApiJson<CreateReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    let review = state.reviews.create(user.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

#[utoipa::path(
    put,
    path = "/api/v1/reviews/{id}",
    tag = "reviews",
    params(("id" = Uuid, Path, description = "Review id")),
    request_body = UpdateReviewRequest,
    responses(
        (status = 200, description = "Updated review", body = Review),
        (status = 403, description = "Not the author", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_review(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<UpdateReviewRequest>,
) -> Result<Json<Review>, AppError> {
    request.validate()?;
    Ok(Json(state.reviews.update(id, user.user_id, request).await?))
}

/// Delete a review (author or moderator)
#[utoipa::path(
    delete,
    path = "/api/v1/reviews/{id}",
    tag = "reviews",
    params(("id" = Uuid, Path, description = "Review id")),
    responses(
        (status = 200, description = "Review deleted", body = MessageResponse),
        (status = 403, description = "Not allowed", body = crate::error::ApiError),
        (status = 404, description = "Review not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_review(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    let review = state.reviews.delete(id, &user).await?;
    if review.user_id != user.user_id {
        audit_log(&AuditEvent::ModerationAction {
            actor_id: user.user_id,
            action: "delete_review".to_string(),
            target_type: "review".to_string(),
            target_id: id,
            detail: None,
        });
    }
    Ok(Json(MessageResponse::new("review deleted successfully")))
}

#[utoipa::path(
    post,
    path = "/api/v1/reviews/{id}/lock",
    tag = "reviews",
    params(("id" = Uuid, Path, description = "Review id")),
    responses(
        (status = 200, description = "Thread locked", body = Review),
        (status = 400, description = "Already locked", body = crate::error::ApiError),
        (status = 403, description = "Not the author", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn lock_review(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Review>, AppError> {
    Ok(Json(state.reviews.lock_thread(id, user.user_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/reviews/{id}/unlock",
    tag = "reviews",
    params(("id" = Uuid, Path, description = "Review id")),
    responses(
        (status = 200, description = "Thread unlocked", body = Review),
        (status = 400, description = "Not locked", body = crate::error::ApiError),
        (status = 403, description = "Not the author", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn unlock_review(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Review>, AppError> {
    Ok(Json(state.reviews.unlock_thread(id, user.user_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/reviews/comments",
    tag = "reviews",
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created", body = ReviewComment),
        (status = 403, description = "Thread locked", body = crate::error::ApiError),
        (status = 404, description = "Review or parent not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(request): ApiJson<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    let comment = state.reviews.add_comment(user.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// Remove a comment (author or moderator); replies stay in place
#[utoipa::path(
    delete,
    path = "/api/v1/reviews/comments/{id}",
    tag = "reviews",
    params(("id" = Uuid, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Comment removed", body = MessageResponse),
        (status = 403, description = "Not allowed", body = crate::error::ApiError),
        (status = 404, description = "Comment not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    let comment = state.reviews.remove_comment(id, &user).await?;
    if comment.user_id != user.user_id {
        audit_log(&AuditEvent::ModerationAction {
            actor_id: user.user_id,
            action: "remove_comment".to_string(),
            target_type: "comment".to_string(),
            target_id: id,
            detail: None,
        });
    }
    Ok(Json(MessageResponse::new("comment deleted successfully")))
}
