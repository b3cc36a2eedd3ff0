//! Authentication middleware for protecting routes
//!
//! Extracts and validates bearer tokens from the Authorization header.
//! On success the typed identity is added to the request extensions and
//! handlers read it with `Extension<AuthenticatedUser>`.

use super::jwt::{validate_access_token, Claims, JwtError};
use crate::audit::{audit_log, AuditEvent};
use crate::error::ApiError;
use crate::middleware::client_ip;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use filmfolk_core::UserRole;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Identity attached to an authenticated request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub role: UserRole,
}

impl AuthenticatedUser {
    pub fn has_role(&self, required: UserRole) -> bool {
        self.role.satisfies(required)
    }

    pub fn is_moderator(&self) -> bool {
        self.has_role(UserRole::Moderator)
    }
}

impl From<Claims> for AuthenticatedUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// Authentication middleware errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authorization header required")]
    MissingAuthHeader,

    #[error("Invalid authorization format. Use: Bearer <token>")]
    InvalidAuthHeader,

    #[error("Invalid or expired token")]
    InvalidToken(#[from] JwtError),

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Insufficient permissions")]
    InsufficientPermissions,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match self {
            AuthError::InsufficientPermissions => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            _ => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        };

        (status, Json(ApiError::new(code, self.to_string()))).into_response()
    }
}

/// Pull the token out of `Authorization: Bearer <token>`
///
/// The header must be exactly two space-separated parts with the `Bearer`
/// scheme.
fn bearer_token(request: &Request<Body>) -> Result<&str, AuthError> {
    let value = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::InvalidAuthHeader),
    }
}

/// Authentication middleware that requires a valid access token
///
/// # Usage
///
/// ```ignore
/// let app = Router::new()
///     .route("/auth/me", get(me))
///     .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(&request)?;

    let claims = match validate_access_token(state.auth.jwt_config(), token) {
        Ok(claims) => claims,
        Err(e) => {
            let reason = match &e {
                JwtError::InvalidToken(rejection) => format!("{rejection:?}"),
                other => other.to_string(),
            };
            audit_log(&AuditEvent::InvalidToken {
                reason,
                resource: request.uri().path().to_string(),
                ip_address: Some(client_ip(request.headers(), request.extensions())),
            });
            return Err(AuthError::InvalidToken(e));
        }
    };

    request
        .extensions_mut()
        .insert(AuthenticatedUser::from(claims));

    Ok(next.run(request).await)
}

/// Optional authentication middleware
///
/// Attaches the identity when a valid token is present and otherwise
/// continues anonymously.
pub async fn optional_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let user = bearer_token(&request)
        .ok()
        .and_then(|token| validate_access_token(state.auth.jwt_config(), token).ok())
        .map(AuthenticatedUser::from);

    match user {
        Some(user) => {
            request.extensions_mut().insert(user);
        }
        None => debug!("continuing anonymously"),
    }

    next.run(request).await
}

/// Type alias for role middleware future
type RoleMiddlewareFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AuthError>> + Send>>;

/// Middleware factory for role-based access control
///
/// Must run after [`auth_middleware`]. Admin passes every gate.
///
/// ```ignore
/// let app = Router::new()
///     .route("/moderator/movies/pending", get(pending))
///     .route_layer(middleware::from_fn(require_role(UserRole::Moderator)))
///     .route_layer(middleware::from_fn_with_state(state, auth_middleware));
/// ```
pub fn require_role(
    required: UserRole,
) -> impl Fn(Request<Body>, Next) -> RoleMiddlewareFuture + Clone {
    move |request: Request<Body>, next: Next| {
        Box::pin(async move {
            let user = request
                .extensions()
                .get::<AuthenticatedUser>()
                .ok_or(AuthError::AuthenticationRequired)?;

            if !user.has_role(required) {
                audit_log(&AuditEvent::AccessDenied {
                    user_id: Some(user.user_id),
                    resource: request.uri().path().to_string(),
                    required_role: Some(required.to_string()),
                    ip_address: Some(client_ip(request.headers(), request.extensions())),
                });
                return Err(AuthError::InsufficientPermissions);
            }

            Ok(next.run(request).await)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::issue_access_token;
    use crate::auth::models::Account;
    use axum::{middleware, routing::get, Extension, Router};
    use tower::ServiceExt;

    fn state() -> Arc<AppState> {
        Arc::new(AppState::for_testing())
    }

    fn token_for(state: &AppState, role: UserRole) -> String {
        let mut account = Account::new_email(
            "alice".to_string(),
            "alice@x.com".to_string(),
            "$2b$04$hash".to_string(),
        );
        account.role = role;
        issue_access_token(state.auth.jwt_config(), &account, 15).unwrap()
    }

    async fn whoami(Extension(user): Extension<AuthenticatedUser>) -> String {
        format!("{}:{}", user.username, user.role)
    }

    async fn maybe_whoami(user: Option<Extension<AuthenticatedUser>>) -> String {
        user.map(|Extension(u)| u.username)
            .unwrap_or_else(|| "anonymous".to_string())
    }

    fn protected(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/me", get(whoami))
            .route_layer(middleware::from_fn_with_state(state, auth_middleware))
    }

    fn moderated(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/mod", get(whoami))
            .route_layer(middleware::from_fn(require_role(UserRole::Moderator)))
            .route_layer(middleware::from_fn_with_state(state, auth_middleware))
    }

    async fn send(app: Router, uri: &str, auth: Option<&str>) -> (StatusCode, String) {
        let mut builder = axum::http::Request::builder().uri(uri);
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let response = app
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_missing_header() {
        let (status, body) = send(protected(state()), "/me", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Authorization header required"));
    }

    #[tokio::test]
    async fn test_malformed_header() {
        let state = state();
        let token = token_for(&state, UserRole::User);

        for value in [
            token.clone(),
            format!("Basic {token}"),
            format!("Bearer {token} extra"),
            "Bearer".to_string(),
        ] {
            let (status, body) = send(protected(state.clone()), "/me", Some(&value)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert!(body.contains("Invalid authorization format. Use: Bearer <token>"));
        }
    }

    #[tokio::test]
    async fn test_invalid_token() {
        let (status, body) = send(protected(state()), "/me", Some("Bearer garbage")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Invalid or expired token"));
    }

    #[tokio::test]
    async fn test_valid_token_attaches_identity() {
        let state = state();
        let token = token_for(&state, UserRole::User);
        let (status, body) =
            send(protected(state), "/me", Some(&format!("Bearer {token}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "alice:user");
    }

    #[tokio::test]
    async fn test_role_gate_order() {
        let state = state();
        for (role, expected) in [
            (UserRole::User, StatusCode::FORBIDDEN),
            (UserRole::Moderator, StatusCode::OK),
            (UserRole::Admin, StatusCode::OK),
        ] {
            let token = token_for(&state, role);
            let (status, _) =
                send(moderated(state.clone()), "/mod", Some(&format!("Bearer {token}"))).await;
            assert_eq!(status, expected, "role {role}");
        }
    }

    #[tokio::test]
    async fn test_role_gate_without_identity() {
        let app = Router::new()
            .route("/mod", get(whoami))
            .route_layer(middleware::from_fn(require_role(UserRole::Moderator)));
        let (status, body) = send(app, "/mod", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Authentication required"));
    }

    #[tokio::test]
    async fn test_optional_auth_never_aborts() {
        let state = state();
        let app = Router::new()
            .route("/maybe", get(maybe_whoami))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                optional_auth_middleware,
            ));

        let (status, body) = send(app.clone(), "/maybe", Some("Bearer garbage")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");

        let token = token_for(&state, UserRole::User);
        let (_, body) = send(app, "/maybe", Some(&format!("Bearer {token}"))).await;
        assert_eq!(body, "alice");
    }
}
