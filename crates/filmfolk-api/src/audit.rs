//! Audit logging for security-relevant events
//!
//! Events are emitted as structured `tracing` records on the `audit`
//! target so operators can route them separately from application logs:
//!
//! ```text
//! RUST_LOG=audit=info,filmfolk_api=warn
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// Security-relevant events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    RegistrationSuccess {
        user_id: Uuid,
        username: String,
        email: String,
        ip_address: Option<String>,
    },

    RegistrationFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
    },

    LoginSuccess {
        user_id: Uuid,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    LoginFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    SocialLogin {
        provider: String,
        user_id: Option<Uuid>,
        email: Option<String>,
        success: bool,
        reason: Option<String>,
        ip_address: Option<String>,
    },

    TokenRefresh {
        user_id: Option<Uuid>,
        success: bool,
        reason: Option<String>,
        ip_address: Option<String>,
    },

    Logout {
        ip_address: Option<String>,
    },

    AccessDenied {
        user_id: Option<Uuid>,
        resource: String,
        required_role: Option<String>,
        ip_address: Option<String>,
    },

    InvalidToken {
        reason: String,
        resource: String,
        ip_address: Option<String>,
    },

    RateLimitExceeded {
        ip_address: String,
        scope: String,
        resource: String,
    },

    /// Moderator or admin action on content or accounts
    ModerationAction {
        actor_id: Uuid,
        action: String,
        target_type: String,
        target_id: Uuid,
        detail: Option<String>,
    },
}

impl AuditEvent {
    fn summary(&self) -> &'static str {
        match self {
            AuditEvent::RegistrationSuccess { .. } => "Registration successful",
            AuditEvent::RegistrationFailure { .. } => "Registration failed",
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::SocialLogin { success: true, .. } => "Social login successful",
            AuditEvent::SocialLogin { .. } => "Social login failed",
            AuditEvent::TokenRefresh { success: true, .. } => "Token refresh",
            AuditEvent::TokenRefresh { .. } => "Token refresh rejected",
            AuditEvent::Logout { .. } => "User logout",
            AuditEvent::AccessDenied { .. } => "Access denied",
            AuditEvent::InvalidToken { .. } => "Invalid token",
            AuditEvent::RateLimitExceeded { .. } => "Rate limit exceeded",
            AuditEvent::ModerationAction { .. } => "Moderation action",
        }
    }

    /// Failures are logged at warn so they survive a quiet log level
    fn is_failure(&self) -> bool {
        matches!(
            self,
            AuditEvent::RegistrationFailure { .. }
                | AuditEvent::LoginFailure { .. }
                | AuditEvent::SocialLogin { success: false, .. }
                | AuditEvent::TokenRefresh { success: false, .. }
                | AuditEvent::AccessDenied { .. }
                | AuditEvent::InvalidToken { .. }
                | AuditEvent::RateLimitExceeded { .. }
        )
    }
}

/// Emit an audit event
///
/// The event is serialized to JSON so log aggregators receive one
/// self-describing record:
///
/// ```json
/// {"event_type":"login_failure","email":"alice@x.com","reason":"invalid email or password","ip_address":"203.0.113.1","user_agent":null}
/// ```
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    if event.is_failure() {
        warn!(
            target: "audit",
            timestamp = %timestamp,
            event = %event_json,
            "{}",
            event.summary()
        );
    } else {
        info!(
            target: "audit",
            timestamp = %timestamp,
            event = %event_json,
            "{}",
            event.summary()
        );
    }
}

/// Extract user agent from request headers
pub fn extract_user_agent(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_serialization() {
        let event = AuditEvent::LoginSuccess {
            user_id: Uuid::new_v4(),
            email: "alice@x.com".to_string(),
            ip_address: Some("192.168.1.1".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"login_success\""));
        assert!(json.contains("alice@x.com"));
    }

    #[test]
    fn test_failure_classification() {
        assert!(AuditEvent::RateLimitExceeded {
            ip_address: "10.0.0.1".to_string(),
            scope: "auth".to_string(),
            resource: "/api/v1/auth/login".to_string(),
        }
        .is_failure());
        assert!(!AuditEvent::Logout { ip_address: None }.is_failure());
        assert!(AuditEvent::TokenRefresh {
            user_id: None,
            success: false,
            reason: Some("refresh token not found".to_string()),
            ip_address: None,
        }
        .is_failure());
    }

    #[test]
    fn test_audit_log_does_not_panic() {
        audit_log(&AuditEvent::ModerationAction {
            actor_id: Uuid::new_v4(),
            action: "approve".to_string(),
            target_type: "movie".to_string(),
            target_id: Uuid::new_v4(),
            detail: None,
        });
        audit_log(&AuditEvent::RegistrationFailure {
            email: "bob@x.com".to_string(),
            reason: "email already registered".to_string(),
            ip_address: None,
        });
    }

    #[test]
    fn test_extract_user_agent() {
        let mut headers = axum::http::HeaderMap::new();
        assert_eq!(extract_user_agent(&headers), None);

        headers.insert(
            axum::http::header::USER_AGENT,
            "Mozilla/5.0 (Test)".parse().unwrap(),
        );
        assert_eq!(
            extract_user_agent(&headers),
            Some("Mozilla/5.0 (Test)".to_string())
        );
    }
}
