//! User profile, follow and account administration handlers

use crate::audit::{audit_log, AuditEvent};
use crate::auth::{AuthenticatedUser, UserInfo};
use crate::catalog::models::AccountList;
use crate::catalog::profiles::{
    UpdateProfileRequest, UpdateRoleRequest, UpdateStatusRequest, UserProfile,
};
use crate::catalog::reviews::PageQuery;
use crate::error::{ApiJson, AppError};
use crate::handlers::auth::MessageResponse;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FollowStatusResponse {
    pub is_following: bool,
}

/// Public profile
///
/// Authenticated callers also get `is_following`.
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    )
)]
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    user: Option<Extension<AuthenticatedUser>>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserProfile>, AppError> {
    let viewer = user.map(|Extension(u)| u.user_id);
    Ok(Json(state.profiles.profile(id, viewer).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/me",
    tag = "users",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated account", body = UserInfo),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(request): ApiJson<UpdateProfileRequest>,
) -> Result<Json<UserInfo>, AppError> {
    request.validate()?;
    let account = state.profiles.update_profile(user.user_id, request).await?;
    Ok(Json(UserInfo::from(&account)))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/followers",
    tag = "users",
    params(("id" = Uuid, Path, description = "User id"), PageQuery),
    responses(
        (status = 200, description = "Followers", body = AccountList),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    )
)]
pub async fn list_followers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<Json<AccountList>, AppError> {
    Ok(Json(state.followers.followers(id, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/following",
    tag = "users",
    params(("id" = Uuid, Path, description = "User id"), PageQuery),
    responses(
        (status = 200, description = "Followed users", body = AccountList),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    )
)]
pub async fn list_following(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<Json<AccountList>, AppError> {
    Ok(Json(state.followers.following(id, query).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/follow",
    tag = "users",
    params(("id" = Uuid, Path, description = "User to follow")),
    responses(
        (status = 200, description = "Now following", body = MessageResponse),
        (status = 400, description = "Self-follow", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
        (status = 409, description = "Already following", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn follow_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state.followers.follow(user.user_id, id).await?;
    Ok(Json(MessageResponse::new("successfully followed user")))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}/follow",
    tag = "users",
    params(("id" = Uuid, Path, description = "User to unfollow")),
    responses(
        (status = 200, description = "Unfollowed", body = MessageResponse),
        (status = 400, description = "Not following", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn unfollow_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state.followers.unfollow(user.user_id, id).await?;
    Ok(Json(MessageResponse::new("successfully unfollowed user")))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/follow/status",
    tag = "users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Follow status", body = FollowStatusResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn follow_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<FollowStatusResponse>, AppError> {
    let is_following = state.followers.is_following(user.user_id, id).await?;
    Ok(Json(FollowStatusResponse { is_following }))
}

/// Suspend, ban or reactivate an account (admin)
///
/// Leaving `active` revokes every refresh token of the account.
#[utoipa::path(
    put,
    path = "/api/v1/admin/users/{id}/status",
    tag = "admin",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Updated account", body = UserInfo),
        (status = 400, description = "Own account", body = crate::error::ApiError),
        (status = 403, description = "Admin role required", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn set_user_status(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<UpdateStatusRequest>,
) -> Result<Json<UserInfo>, AppError> {
    let account = state
        .profiles
        .set_status(admin.user_id, id, request.status)
        .await?;
    audit_log(&AuditEvent::ModerationAction {
        actor_id: admin.user_id,
        action: "set_status".to_string(),
        target_type: "user".to_string(),
        target_id: id,
        detail: Some(request.status.to_string()),
    });
    Ok(Json(UserInfo::from(&account)))
}

/// Change an account's role (admin)
#[utoipa::path(
    put,
    path = "/api/v1/admin/users/{id}/role",
    tag = "admin",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Updated account", body = UserInfo),
        (status = 400, description = "Own account", body = crate::error::ApiError),
        (status = 403, description = "Admin role required", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn set_user_role(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<UpdateRoleRequest>,
) -> Result<Json<UserInfo>, AppError> {
    let account = state.profiles.set_role(admin.user_id, id, request.role).await?;
    audit_log(&AuditEvent::ModerationAction {
        actor_id: admin.user_id,
        action: "set_role".to_string(),
        target_type: "user".to_string(),
        target_id: id,
        detail: Some(request.role.to_string()),
    });
    Ok(Json(UserInfo::from(&account)))
}
