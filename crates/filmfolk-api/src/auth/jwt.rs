//! JWT token generation and validation
//!
//! Implements HMAC-SHA256 signed tokens from one shared secret:
//! - Access tokens carry the account identity and role and live for minutes.
//! - Refresh tokens carry only registered claims and live for days. They are
//!   also recorded in the refresh-token ledger, which this module never reads.

use chrono::{DateTime, Duration, TimeZone, Utc};
use filmfolk_core::UserRole;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::models::Account;

/// Issuer tag embedded in every token
pub const TOKEN_ISSUER: &str = "filmfolk";

/// Access token claims
///
/// Reconstructed on every authenticated request; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Token issuer (always "filmfolk")
    pub iss: String,
    /// Subject - account ID
    pub sub: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Not before (Unix seconds)
    pub nbf: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    /// Typed role; unknown role strings fail decoding
    pub role: UserRole,
}

/// Refresh token claims (registered claims only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub iss: String,
    pub sub: String,
    /// Random token ID, keeps tokens minted in the same second distinct
    pub jti: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

/// Why a token was rejected (logged, never shown to clients)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    Malformed,
    Expired,
    NotYetValid,
    BadSignature,
    WrongAlgorithm,
    WrongIssuer,
}

/// JWT token generation and validation errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT secret not initialized")]
    SecretNotInitialized,

    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("invalid or expired token")]
    InvalidToken(TokenRejection),

    #[error("token lifetime out of range")]
    LifetimeOutOfRange,
}

/// JWT Configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for HMAC signing
    secret: String,
    /// Token issuer identifier
    pub issuer: String,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: TOKEN_ISSUER.to_string(),
        }
    }

    fn encoding_key(&self) -> Result<EncodingKey, JwtError> {
        if self.secret.is_empty() {
            return Err(JwtError::SecretNotInitialized);
        }
        Ok(EncodingKey::from_secret(self.secret.as_bytes()))
    }

    fn decoding_key(&self) -> Result<DecodingKey, JwtError> {
        if self.secret.is_empty() {
            return Err(JwtError::SecretNotInitialized);
        }
        Ok(DecodingKey::from_secret(self.secret.as_bytes()))
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);
        validation.validate_nbf = true;
        validation.leeway = 0;
        validation
    }
}

/// Generate an access token for an account
///
/// # Arguments
///
/// * `config` - JWT configuration holding the signing secret
/// * `account` - The authenticated account
/// * `ttl_minutes` - Token lifetime in minutes
///
/// # Returns
///
/// * `Ok(String)` - Encoded JWT token
/// * `Err(JwtError::SecretNotInitialized)` - If the secret is empty
pub fn issue_access_token(
    config: &JwtConfig,
    account: &Account,
    ttl_minutes: i64,
) -> Result<String, JwtError> {
    let key = config.encoding_key()?;
    let now = Utc::now();
    let expires_at = expiry(now, Duration::try_minutes(ttl_minutes))?;

    let claims = Claims {
        iss: config.issuer.clone(),
        sub: account.id.to_string(),
        iat: now.timestamp(),
        nbf: now.timestamp(),
        exp: expires_at.timestamp(),
        user_id: account.id,
        username: account.username.clone(),
        email: account.email.clone(),
        role: account.role,
    };

    Ok(encode(&Header::new(Algorithm::HS256), &claims, &key)?)
}

fn expiry(now: DateTime<Utc>, ttl: Option<Duration>) -> Result<DateTime<Utc>, JwtError> {
    ttl.and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or(JwtError::LifetimeOutOfRange)
}

/// Generate a refresh token for an account
///
/// Returns the token and its expiry instant.
pub fn issue_refresh_token(
    config: &JwtConfig,
    account_id: Uuid,
    ttl_days: i64,
) -> Result<(String, DateTime<Utc>), JwtError> {
    let key = config.encoding_key()?;
    let now = Utc::now();
    let expires_at = expiry(now, Duration::try_days(ttl_days))?;

    let claims = RefreshClaims {
        iss: config.issuer.clone(),
        sub: account_id.to_string(),
        jti: Uuid::new_v4().to_string(),
        iat: now.timestamp(),
        nbf: now.timestamp(),
        exp: expires_at.timestamp(),
    };

    let token = encode(&Header::new(Algorithm::HS256), &claims, &key)?;
    // The ledger stores whole-second precision, same as the token.
    let expires_at = Utc
        .timestamp_opt(claims.exp, 0)
        .single()
        .unwrap_or(expires_at);

    Ok((token, expires_at))
}

/// Validate an access token and extract its claims
///
/// Malformed tokens, foreign algorithms, bad signatures and expired tokens
/// all surface as [`JwtError::InvalidToken`].
pub fn validate_access_token(config: &JwtConfig, token: &str) -> Result<Claims, JwtError> {
    let key = config.decoding_key()?;
    let data = decode::<Claims>(token, &key, &config.validation()).map_err(reject)?;
    Ok(data.claims)
}

/// Validate a refresh token's signature and structure
///
/// Returns the subject account ID. This does not consult the ledger.
pub fn validate_refresh_token_format(config: &JwtConfig, token: &str) -> Result<Uuid, JwtError> {
    let key = config.decoding_key()?;
    let data = decode::<RefreshClaims>(token, &key, &config.validation()).map_err(reject)?;
    Uuid::parse_str(&data.claims.sub).map_err(|_| JwtError::InvalidToken(TokenRejection::Malformed))
}

fn reject(err: jsonwebtoken::errors::Error) -> JwtError {
    let reason = match err.kind() {
        ErrorKind::ExpiredSignature => TokenRejection::Expired,
        ErrorKind::ImmatureSignature => TokenRejection::NotYetValid,
        ErrorKind::InvalidSignature => TokenRejection::BadSignature,
        ErrorKind::InvalidAlgorithm => TokenRejection::WrongAlgorithm,
        ErrorKind::InvalidIssuer => TokenRejection::WrongIssuer,
        _ => TokenRejection::Malformed,
    };
    JwtError::InvalidToken(reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-for-unit-tests";

    fn test_account() -> Account {
        Account::new_email(
            "alice".to_string(),
            "alice@x.com".to_string(),
            "$2b$12$hash".to_string(),
        )
    }

    fn sign<T: Serialize>(claims: &T, algorithm: Algorithm, secret: &str) -> String {
        encode(
            &Header::new(algorithm),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims_expiring_at(account: &Account, exp: i64) -> Claims {
        Claims {
            iss: TOKEN_ISSUER.to_string(),
            sub: account.id.to_string(),
            iat: exp - 900,
            nbf: exp - 900,
            exp,
            user_id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            role: account.role,
        }
    }

    #[test]
    fn test_issue_and_validate_access_token() {
        let config = JwtConfig::new(SECRET);
        let account = test_account();

        let token = issue_access_token(&config, &account, 15).unwrap();
        let claims = validate_access_token(&config, &token).unwrap();

        assert_eq!(claims.iss, "filmfolk");
        assert_eq!(claims.sub, account.id.to_string());
        assert_eq!(claims.user_id, account.id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.email, "alice@x.com");
        assert_eq!(claims.role, UserRole::User);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_empty_secret_is_config_error() {
        let config = JwtConfig::new("");
        let result = issue_access_token(&config, &test_account(), 15);
        assert!(matches!(result, Err(JwtError::SecretNotInitialized)));

        let result = issue_refresh_token(&config, Uuid::new_v4(), 7);
        assert!(matches!(result, Err(JwtError::SecretNotInitialized)));
    }

    #[test]
    fn test_huge_lifetime_is_an_error() {
        let config = JwtConfig::new(SECRET);
        let result = issue_refresh_token(&config, Uuid::new_v4(), 100_000_000);
        assert!(matches!(result, Err(JwtError::LifetimeOutOfRange)));

        let result = issue_access_token(&config, &test_account(), i64::MAX);
        assert!(matches!(result, Err(JwtError::LifetimeOutOfRange)));
    }

    #[test]
    fn test_malformed_token() {
        let config = JwtConfig::new(SECRET);
        let result = validate_access_token(&config, "not.a.token");
        assert!(matches!(
            result,
            Err(JwtError::InvalidToken(TokenRejection::Malformed))
        ));
    }

    #[test]
    fn test_wrong_secret() {
        let token = issue_access_token(&JwtConfig::new(SECRET), &test_account(), 15).unwrap();
        let result = validate_access_token(&JwtConfig::new("another-secret-entirely"), &token);
        assert!(matches!(
            result,
            Err(JwtError::InvalidToken(TokenRejection::BadSignature))
        ));
    }

    #[test]
    fn test_wrong_algorithm() {
        let account = test_account();
        let claims = claims_expiring_at(&account, Utc::now().timestamp() + 600);
        let token = sign(&claims, Algorithm::HS384, SECRET);

        let result = validate_access_token(&JwtConfig::new(SECRET), &token);
        assert!(matches!(result, Err(JwtError::InvalidToken(_))));
    }

    #[test]
    fn test_expired_token_rejected_valid_token_accepted() {
        let config = JwtConfig::new(SECRET);
        let account = test_account();
        let now = Utc::now().timestamp();

        let expired = sign(&claims_expiring_at(&account, now - 5), Algorithm::HS256, SECRET);
        assert!(matches!(
            validate_access_token(&config, &expired),
            Err(JwtError::InvalidToken(TokenRejection::Expired))
        ));

        let fresh = sign(&claims_expiring_at(&account, now + 60), Algorithm::HS256, SECRET);
        assert!(validate_access_token(&config, &fresh).is_ok());
    }

    #[test]
    fn test_unknown_role_rejected() {
        let account = test_account();
        let mut claims = serde_json::to_value(claims_expiring_at(
            &account,
            Utc::now().timestamp() + 600,
        ))
        .unwrap();
        claims["role"] = serde_json::json!("superuser");
        let token = sign(&claims, Algorithm::HS256, SECRET);

        assert!(validate_access_token(&JwtConfig::new(SECRET), &token).is_err());
    }

    #[test]
    fn test_refresh_token_format() {
        let config = JwtConfig::new(SECRET);
        let account_id = Uuid::new_v4();

        let (token, expires_at) = issue_refresh_token(&config, account_id, 7).unwrap();
        assert!(expires_at > Utc::now() + Duration::days(6));
        assert_eq!(validate_refresh_token_format(&config, &token).unwrap(), account_id);
    }

    #[test]
    fn test_refresh_tokens_are_distinct() {
        let config = JwtConfig::new(SECRET);
        let account_id = Uuid::new_v4();
        let (first, _) = issue_refresh_token(&config, account_id, 7).unwrap();
        let (second, _) = issue_refresh_token(&config, account_id, 7).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_token_kinds_do_not_cross() {
        let config = JwtConfig::new(SECRET);
        let account = test_account();

        let access = issue_access_token(&config, &account, 15).unwrap();
        let (refresh, _) = issue_refresh_token(&config, account.id, 7).unwrap();

        assert!(validate_access_token(&config, &refresh).is_err());
        assert!(validate_refresh_token_format(&config, &access).is_err());
    }
}
