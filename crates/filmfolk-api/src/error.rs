//! API error handling
//!
//! Every failure leaving a handler is an [`AppError`] and renders as the
//! `{error, code}` envelope.

use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::auth::oauth::OAuthError;
use crate::auth::repository::RepositoryError;
use crate::auth::service::AuthServiceError;
use crate::catalog::CatalogError;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Human-readable message
    pub error: String,
    /// Machine-readable error code
    pub code: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Database(String),
    BadGateway(String),
    Config(String),
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::BadGateway(_) => "BAD_GATEWAY",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn into_message(self) -> String {
        match self {
            AppError::Validation(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Database(msg)
            | AppError::BadGateway(msg)
            | AppError::Config(msg)
            | AppError::Internal(msg) => msg,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        if status.is_server_error() || status == StatusCode::BAD_GATEWAY {
            error!(code, error = ?self, "request failed");
        }

        (status, Json(ApiError::new(code, self.into_message()))).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(_) => AppError::Conflict(err.to_string()),
            other => AppError::Database(other.to_string()),
        }
    }
}

impl From<AuthServiceError> for AppError {
    fn from(err: AuthServiceError) -> Self {
        match err {
            AuthServiceError::DuplicateEmail
            | AuthServiceError::DuplicateUsername
            | AuthServiceError::ProviderConflict => AppError::Conflict(err.to_string()),
            AuthServiceError::InvalidCredentials
            | AuthServiceError::AccountStatus(_)
            | AuthServiceError::TokenNotFound
            | AuthServiceError::TokenInvalid
            | AuthServiceError::InvalidToken => AppError::Unauthorized(err.to_string()),
            AuthServiceError::Config(msg) => AppError::Config(msg),
            AuthServiceError::Repository(err) => AppError::from(err),
            AuthServiceError::Password(err) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Validation(msg) => AppError::Validation(msg),
            CatalogError::NotFound(msg) => AppError::NotFound(msg),
            CatalogError::Forbidden(msg) => AppError::Forbidden(msg),
            CatalogError::Conflict(msg) => AppError::Conflict(msg),
            CatalogError::Repository(err) => AppError::from(err),
        }
    }
}

impl From<OAuthError> for AppError {
    fn from(err: OAuthError) -> Self {
        match err {
            OAuthError::NotConfigured => AppError::Config(err.to_string()),
            OAuthError::UnverifiedEmail => AppError::Unauthorized(err.to_string()),
            other => AppError::BadGateway(other.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("{field} is invalid"),
                })
            })
            .collect();
        messages.sort();
        AppError::Validation(messages.join("; "))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// JSON body extractor whose rejection uses the error envelope
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;
    use filmfolk_core::AccountStatus;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 3, message = "name too short"))]
        name: String,
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::Validation(String::new()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Conflict(String::new()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::BadGateway(String::new()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::Config(String::new()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_auth_service_errors() {
        let err = AppError::from(AuthServiceError::DuplicateEmail);
        assert!(matches!(err, AppError::Conflict(ref m) if m == "email already registered"));

        let err = AppError::from(AuthServiceError::AccountStatus(AccountStatus::Banned));
        assert!(matches!(err, AppError::Unauthorized(ref m) if m == "account is banned"));

        let err = AppError::from(AuthServiceError::InvalidCredentials);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_repository_conflict() {
        let err = AppError::from(RepositoryError::Conflict("accounts_email_key".to_string()));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        let err = AppError::from(RepositoryError::DatabaseError("down".to_string()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_validation_errors_use_field_messages() {
        let sample = Sample {
            name: "ab".to_string(),
        };
        let err = AppError::from(sample.validate().unwrap_err());
        assert!(matches!(err, AppError::Validation(ref m) if m == "name too short"));
    }

    #[tokio::test]
    async fn test_envelope_shape() {
        let response = AppError::NotFound("movie not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "movie not found");
        assert_eq!(json["code"], "NOT_FOUND");
    }
}
