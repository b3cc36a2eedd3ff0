//! Google OAuth handlers
//!
//! `GET /auth/google` starts the flow; Google sends the browser back to
//! `GET /auth/google/callback`, which always ends in a redirect to the
//! frontend carrying either tokens or an error code.

use crate::audit::{audit_log, AuditEvent};
use crate::auth::oauth::{
    clear_state_cookie, generate_state, state_cookie, OAuthError, STATE_COOKIE,
};
use crate::auth::service::AuthServiceError;
use crate::error::AppError;
use crate::middleware::ClientIp;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use reqwest::Url;
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;
use utoipa::IntoParams;

const DEFAULT_OAUTH_ERROR: &str = "OAuth authentication failed";

/// Query string Google appends to the callback
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Start Google login
///
/// Stores a random state in a short-lived cookie and redirects to the
/// consent page.
#[utoipa::path(
    get,
    path = "/api/v1/auth/google",
    tag = "auth",
    responses(
        (status = 307, description = "Redirect to Google consent"),
        (status = 500, description = "Google login not configured", body = crate::error::ApiError),
    )
)]
pub async fn google_login_handler(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let provider = state.oauth.as_ref().ok_or(OAuthError::NotConfigured)?;

    let csrf_state = generate_state();
    let url = provider.authorization_url(&csrf_state)?;
    let cookie = state_cookie(&csrf_state, state.config.is_production());

    Ok(([(header::SET_COOKIE, cookie)], Redirect::temporary(&url)).into_response())
}

/// Google login callback
#[utoipa::path(
    get,
    path = "/api/v1/auth/google/callback",
    tag = "auth",
    params(CallbackQuery),
    responses(
        (status = 307, description = "Redirect to the frontend with tokens or an error code"),
    )
)]
pub async fn google_callback_handler(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let secure = state.config.is_production();
    let frontend = state.config.frontend_url();
    let stored_state = jar.get(STATE_COOKIE).map(|c| c.value().to_string());

    let target = match complete_callback(&state, stored_state, query).await {
        Ok((access_token, refresh_token, user_id, email)) => {
            audit_log(&AuditEvent::SocialLogin {
                provider: "google".to_string(),
                user_id: Some(user_id),
                email: Some(email),
                success: true,
                reason: None,
                ip_address: Some(ip),
            });
            frontend_url(
                &frontend,
                "/auth/callback",
                &[
                    ("access_token", access_token.as_str()),
                    ("refresh_token", refresh_token.as_str()),
                ],
            )
        }
        Err(failure) => {
            audit_log(&AuditEvent::SocialLogin {
                provider: "google".to_string(),
                user_id: None,
                email: None,
                success: false,
                reason: Some(format!("{}: {}", failure.code, failure.detail)),
                ip_address: Some(ip),
            });
            frontend_url(
                &frontend,
                "/auth/error",
                &[
                    ("code", failure.code.as_str()),
                    ("message", failure.message.as_str()),
                ],
            )
        }
    };

    (
        [(header::SET_COOKIE, clear_state_cookie(secure))],
        Redirect::temporary(&target),
    )
        .into_response()
}

struct CallbackFailure {
    code: String,
    message: String,
    detail: String,
}

impl CallbackFailure {
    fn new(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            code: code.to_string(),
            detail: message.clone(),
            message,
        }
    }

    /// Generic message for the browser, full cause for the audit log
    fn auth_failed(detail: impl ToString) -> Self {
        Self {
            code: "auth_failed".to_string(),
            message: DEFAULT_OAUTH_ERROR.to_string(),
            detail: detail.to_string(),
        }
    }

    /// Conflicts and blocked accounts are shown as is; anything else stays generic
    fn from_login(err: AuthServiceError) -> Self {
        match err {
            AuthServiceError::ProviderConflict | AuthServiceError::AccountStatus(_) => {
                Self::new("auth_failed", err.to_string())
            }
            other => Self::auth_failed(other),
        }
    }
}

async fn complete_callback(
    state: &AppState,
    stored_state: Option<String>,
    query: CallbackQuery,
) -> Result<(String, String, uuid::Uuid, String), CallbackFailure> {
    match (&stored_state, &query.state) {
        (Some(stored), Some(received)) if stored == received => {}
        _ => {
            return Err(CallbackFailure::new(
                "invalid_state",
                "Invalid OAuth state",
            ))
        }
    }

    if let Some(error) = query.error {
        let message = query
            .error_description
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| DEFAULT_OAUTH_ERROR.to_string());
        return Err(CallbackFailure::new(&error, message));
    }

    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| CallbackFailure::new("no_code", "No authorization code received"))?;

    let provider = state
        .oauth
        .as_ref()
        .ok_or_else(|| CallbackFailure::auth_failed(OAuthError::NotConfigured))?;

    let profile = provider.exchange_code(&code).await.map_err(|e| {
        warn!(error = %e, "OAuth code exchange failed");
        CallbackFailure::auth_failed(e)
    })?;

    let response = state
        .auth
        .social_login(profile)
        .await
        .map_err(CallbackFailure::from_login)?;

    Ok((
        response.access_token,
        response.refresh_token,
        response.user.id,
        response.user.email,
    ))
}

fn frontend_url(base: &str, path: &str, params: &[(&str, &str)]) -> String {
    let raw = format!("{}{path}", base.trim_end_matches('/'));
    match Url::parse_with_params(&raw, params) {
        Ok(url) => url.into(),
        Err(e) => {
            warn!(error = %e, base, "frontend URL is not a valid URL");
            raw
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frontend_url_encodes_params() {
        let url = frontend_url(
            "http://localhost:3000/",
            "/auth/error",
            &[("code", "access_denied"), ("message", "user said no & left")],
        );
        assert!(url.starts_with("http://localhost:3000/auth/error?"));
        assert!(url.contains("code=access_denied"));
        assert!(!url.contains(' '));
        assert!(url.contains("%26"));
    }

    #[tokio::test]
    async fn test_state_mismatch_rejected_first() {
        let state = AppState::for_testing();
        let failure = complete_callback(
            &state,
            Some("abc".to_string()),
            CallbackQuery {
                state: Some("xyz".to_string()),
                code: Some("code".to_string()),
                ..Default::default()
            },
        )
        .await
        .err()
        .unwrap();
        assert_eq!(failure.code, "invalid_state");
    }

    #[tokio::test]
    async fn test_provider_error_and_missing_code() {
        let state = AppState::for_testing();
        let failure = complete_callback(
            &state,
            Some("abc".to_string()),
            CallbackQuery {
                state: Some("abc".to_string()),
                error: Some("access_denied".to_string()),
                ..Default::default()
            },
        )
        .await
        .err()
        .unwrap();
        assert_eq!(failure.code, "access_denied");
        assert_eq!(failure.message, DEFAULT_OAUTH_ERROR);

        let failure = complete_callback(
            &state,
            Some("abc".to_string()),
            CallbackQuery {
                state: Some("abc".to_string()),
                ..Default::default()
            },
        )
        .await
        .err()
        .unwrap();
        assert_eq!(failure.code, "no_code");
    }

    #[test]
    fn test_login_failures_shown_to_user() {
        let failure = CallbackFailure::from_login(AuthServiceError::ProviderConflict);
        assert_eq!(failure.code, "auth_failed");
        assert_eq!(
            failure.message,
            "email already registered with different login method"
        );

        let failure = CallbackFailure::from_login(AuthServiceError::AccountStatus(
            filmfolk_core::AccountStatus::Banned,
        ));
        assert_eq!(failure.message, "account is banned");

        let failure =
            CallbackFailure::from_login(AuthServiceError::Config("bad key".to_string()));
        assert_eq!(failure.message, DEFAULT_OAUTH_ERROR);
        assert_eq!(failure.detail, "token configuration error: bad key");
    }
}
