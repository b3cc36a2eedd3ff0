//! Authentication API handlers
//!
//! Registration, login, token refresh, logout and the current-user
//! endpoint. Every outcome is written to the audit log.

use crate::audit::{audit_log, extract_user_agent, AuditEvent};
use crate::auth::{
    AuthResponse, AuthServiceError, AuthenticatedUser, LoginRequest, LogoutRequest,
    RefreshRequest, RegisterRequest, UserInfo,
};
use crate::error::{ApiJson, AppError};
use crate::middleware::ClientIp;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

/// Plain acknowledgement body
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Register a new user account
///
/// Creates an email/password account with the `user` role and returns a
/// token pair, so the client is logged in right away.
///
/// # Responses
///
/// * `201 Created` - Account created, tokens issued
/// * `400 Bad Request` - Invalid input
/// * `409 Conflict` - Email or username already taken
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = AuthResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 409, description = "Email or username taken", body = crate::error::ApiError),
        (status = 429, description = "Too many attempts"),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    let email = request.email.clone();

    match state.auth.register(request).await {
        Ok(response) => {
            audit_log(&AuditEvent::RegistrationSuccess {
                user_id: response.user.id,
                username: response.user.username.clone(),
                email: response.user.email.clone(),
                ip_address: Some(ip),
            });
            Ok((StatusCode::CREATED, Json(response)))
        }
        Err(e) => {
            audit_log(&AuditEvent::RegistrationFailure {
                email,
                reason: e.to_string(),
                ip_address: Some(ip),
            });
            Err(e.into())
        }
    }
}

/// Login with email and password
///
/// Unknown emails and wrong passwords fail with the same message.
/// Suspended and banned accounts are refused.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials or inactive account", body = crate::error::ApiError),
        (status = 429, description = "Too many attempts"),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    request.validate()?;
    let email = request.email.clone();
    let user_agent = extract_user_agent(&headers);

    match state.auth.login(request).await {
        Ok(response) => {
            audit_log(&AuditEvent::LoginSuccess {
                user_id: response.user.id,
                email,
                ip_address: Some(ip),
                user_agent,
            });
            Ok(Json(response))
        }
        Err(e) => {
            audit_log(&AuditEvent::LoginFailure {
                email,
                reason: e.to_string(),
                ip_address: Some(ip),
                user_agent,
            });
            Err(e.into())
        }
    }
}

/// Refresh access token
///
/// Exchanges a valid refresh token for a new access token. The refresh
/// token itself is returned unchanged.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token refreshed successfully", body = AuthResponse),
        (status = 401, description = "Invalid, expired or revoked refresh token", body = crate::error::ApiError),
        (status = 429, description = "Too many attempts"),
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    ApiJson(request): ApiJson<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    request.validate()?;

    let result = state.auth.refresh(request).await;
    audit_log(&AuditEvent::TokenRefresh {
        user_id: result.as_ref().ok().map(|r| r.user.id),
        success: result.is_ok(),
        reason: result.as_ref().err().map(AuthServiceError::to_string),
        ip_address: Some(ip),
    });

    Ok(Json(result?))
}

/// Logout
///
/// Revokes the given refresh token. Unknown or already revoked tokens are
/// accepted, so repeating a logout is harmless.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Logout successful", body = MessageResponse),
        (status = 400, description = "Missing refresh token", body = crate::error::ApiError),
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    ApiJson(request): ApiJson<LogoutRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    request.validate()?;
    state.auth.logout(request).await?;

    audit_log(&AuditEvent::Logout {
        ip_address: Some(ip),
    });

    Ok(Json(MessageResponse::new("logged out successfully")))
}

/// Get current user
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = UserInfo),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 404, description = "Account no longer exists", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<UserInfo>, AppError> {
    let account = state
        .auth
        .current_account(user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

    Ok(Json(UserInfo::from(&account)))
}
