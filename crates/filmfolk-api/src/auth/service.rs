//! Authentication service layer
//!
//! Business logic for registration, login, token refresh, logout and
//! social login. Storage goes through the repository traits, so the same
//! service runs against PostgreSQL in production and memory in tests.

use super::jwt::{
    issue_access_token, issue_refresh_token, validate_refresh_token_format, JwtConfig, JwtError,
};
use super::models::{Account, RefreshToken};
use super::password::{hash_password_with_config, verify_password, PasswordConfig, PasswordError};
use super::repository::{AccountRepository, RefreshTokenRepository, RepositoryError};
use crate::store::Repositories;
use chrono::{DateTime, Utc};
use filmfolk_core::config::JwtSettings;
use filmfolk_core::{AccountStatus, AuthProvider, UserRole};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Maximum username length
pub const USERNAME_MAX_LEN: usize = 50;

/// Minimum username length
pub const USERNAME_MIN_LEN: usize = 3;

/// Numeric suffixes tried before falling back to a time-derived one
const USERNAME_SUFFIX_ATTEMPTS: u32 = 1000;

/// User registration request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50, message = "username must be 3-50 characters"))]
    pub username: String,
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 100, message = "password must be 8-100 characters"))]
    pub password: String,
}

/// User login request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Token refresh request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "refresh_token is required"))]
    pub refresh_token: String,
}

/// Logout request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct LogoutRequest {
    #[validate(length(min = 1, message = "refresh_token is required"))]
    pub refresh_token: String,
}

/// Authentication response with tokens
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub user: UserInfo,
}

/// The account owner's view of their account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct UserInfo {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[schema(value_type = String)]
    pub role: UserRole,
    #[schema(value_type = String)]
    pub auth_provider: AuthProvider,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<&Account> for UserInfo {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            email: account.email.clone(),
            role: account.role,
            auth_provider: account.auth_provider,
            avatar_url: account.avatar_url.clone(),
            bio: account.bio.clone(),
            created_at: account.created_at,
            last_login_at: account.last_login_at,
        }
    }
}

/// Identity asserted by a social provider after a successful exchange
#[derive(Debug, Clone)]
pub struct SocialProfile {
    pub provider: AuthProvider,
    pub provider_id: String,
    pub email: String,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Authentication service errors
#[derive(Debug, Error)]
pub enum AuthServiceError {
    #[error("email already registered")]
    DuplicateEmail,

    #[error("username already taken")]
    DuplicateUsername,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("account is {0}")]
    AccountStatus(AccountStatus),

    #[error("refresh token not found")]
    TokenNotFound,

    #[error("refresh token expired or revoked")]
    TokenInvalid,

    #[error("invalid refresh token")]
    InvalidToken,

    #[error("email already registered with different login method")]
    ProviderConflict,

    #[error("token configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

impl From<JwtError> for AuthServiceError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::InvalidToken(_) => AuthServiceError::InvalidToken,
            other => AuthServiceError::Config(other.to_string()),
        }
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountRepository>,
    refresh_tokens: Arc<dyn RefreshTokenRepository>,
    jwt: JwtConfig,
    access_ttl_minutes: i64,
    refresh_ttl_days: i64,
    password: PasswordConfig,
}

impl AuthService {
    pub fn new(repos: &Repositories, settings: &JwtSettings) -> Self {
        Self {
            accounts: repos.accounts.clone(),
            refresh_tokens: repos.refresh_tokens.clone(),
            jwt: JwtConfig::new(settings.secret.clone()),
            access_ttl_minutes: settings.access_token_ttl_minutes,
            refresh_ttl_days: settings.refresh_token_ttl_days,
            password: PasswordConfig::default(),
        }
    }

    /// Override the bcrypt cost (tests use the minimum)
    pub fn with_password_config(mut self, password: PasswordConfig) -> Self {
        self.password = password;
        self
    }

    pub fn jwt_config(&self) -> &JwtConfig {
        &self.jwt
    }

    /// Access token lifetime in seconds
    pub fn expires_in(&self) -> i64 {
        self.access_ttl_minutes * 60
    }

    /// Register a new email/password account
    ///
    /// # Returns
    ///
    /// * `Ok(AuthResponse)` - Token pair and the new account
    /// * `Err(AuthServiceError::DuplicateEmail | DuplicateUsername)` - Identity taken
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AuthServiceError> {
        if self.accounts.find_by_email(&request.email).await?.is_some() {
            return Err(AuthServiceError::DuplicateEmail);
        }
        if self
            .accounts
            .find_by_username(&request.username)
            .await?
            .is_some()
        {
            return Err(AuthServiceError::DuplicateUsername);
        }

        let password_hash = self.hash(request.password).await?;
        let account = Account::new_email(request.username, request.email, password_hash);

        // A concurrent registration can still win the race; the unique
        // constraints decide.
        let account = self
            .accounts
            .create(account)
            .await
            .map_err(map_identity_conflict)?;

        debug!(account_id = %account.id, "account registered");
        self.issue_pair(&account).await
    }

    /// Login with email and password
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthServiceError> {
        let account = self
            .accounts
            .find_by_email(&request.email)
            .await?
            .ok_or(AuthServiceError::InvalidCredentials)?;

        if !account.is_active() {
            return Err(AuthServiceError::AccountStatus(account.status));
        }

        let hash = account
            .password_hash
            .clone()
            .ok_or(AuthServiceError::InvalidCredentials)?;
        if !self.verify(request.password, hash).await? {
            return Err(AuthServiceError::InvalidCredentials);
        }

        self.complete_login(account).await
    }

    /// Mint a new access token from a refresh token
    ///
    /// The refresh token is returned unchanged; it stays valid until its
    /// own expiry or until it is revoked.
    pub async fn refresh(&self, request: RefreshRequest) -> Result<AuthResponse, AuthServiceError> {
        let token = request.refresh_token;
        let account_id = validate_refresh_token_format(&self.jwt, &token)?;

        let record = self
            .refresh_tokens
            .find(&token, account_id)
            .await?
            .ok_or(AuthServiceError::TokenNotFound)?;
        if !record.is_valid() {
            return Err(AuthServiceError::TokenInvalid);
        }

        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AuthServiceError::TokenNotFound)?;
        if !account.is_active() {
            return Err(AuthServiceError::AccountStatus(account.status));
        }

        let access_token = issue_access_token(&self.jwt, &account, self.access_ttl_minutes)?;
        Ok(AuthResponse {
            access_token,
            refresh_token: token,
            token_type: "Bearer".to_string(),
            expires_in: self.expires_in(),
            user: UserInfo::from(&account),
        })
    }

    /// Revoke a refresh token
    ///
    /// Unknown and already revoked tokens are accepted; the ledger is left
    /// unchanged for them.
    pub async fn logout(&self, request: LogoutRequest) -> Result<(), AuthServiceError> {
        let revoked = self
            .refresh_tokens
            .revoke(&request.refresh_token, Utc::now())
            .await?;
        debug!(revoked, "logout processed");
        Ok(())
    }

    /// Log in (or sign up) through a social provider
    pub async fn social_login(
        &self,
        profile: SocialProfile,
    ) -> Result<AuthResponse, AuthServiceError> {
        let existing = self
            .accounts
            .find_by_provider(profile.provider, &profile.provider_id)
            .await?;

        let account = match existing {
            Some(account) => {
                if !account.is_active() {
                    return Err(AuthServiceError::AccountStatus(account.status));
                }
                account
            }
            None => self.create_social_account(profile).await?,
        };

        self.complete_login(account).await
    }

    /// Look up the account behind an authenticated request
    pub async fn current_account(&self, account_id: Uuid) -> Result<Option<Account>, AuthServiceError> {
        Ok(self.accounts.find_by_id(account_id).await?)
    }

    async fn create_social_account(
        &self,
        profile: SocialProfile,
    ) -> Result<Account, AuthServiceError> {
        if self.accounts.find_by_email(&profile.email).await?.is_some() {
            return Err(AuthServiceError::ProviderConflict);
        }

        let base = profile
            .given_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(profile.name.as_deref().filter(|n| !n.trim().is_empty()))
            .unwrap_or("user");
        let username = self.generate_username(base).await?;

        let account = Account::new_social(
            username,
            profile.email,
            profile.provider,
            profile.provider_id,
            profile.avatar_url.filter(|url| !url.is_empty()),
        );

        self.accounts.create(account).await.map_err(|err| {
            if err.is_conflict_on("email") || err.is_conflict_on("provider") {
                AuthServiceError::ProviderConflict
            } else if err.is_conflict_on("username") {
                AuthServiceError::DuplicateUsername
            } else {
                AuthServiceError::Repository(err)
            }
        })
    }

    /// Find a free username derived from `base`
    async fn generate_username(&self, base: &str) -> Result<String, AuthServiceError> {
        let base = sanitize_username(base);
        if self.accounts.find_by_username(&base).await?.is_none() {
            return Ok(base);
        }

        for suffix in 1..=USERNAME_SUFFIX_ATTEMPTS {
            let candidate = with_suffix(&base, &suffix.to_string());
            if self.accounts.find_by_username(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }

        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        warn!(base = %base, "username suffixes exhausted, using time-derived suffix");
        Ok(with_suffix(&base, &nanos.rem_euclid(10_000).to_string()))
    }

    async fn complete_login(&self, account: Account) -> Result<AuthResponse, AuthServiceError> {
        let now = Utc::now();
        self.accounts.update_last_login(account.id, now).await?;
        let account = Account {
            last_login_at: Some(now),
            ..account
        };
        self.issue_pair(&account).await
    }

    /// Issue an access token and a persisted refresh token
    async fn issue_pair(&self, account: &Account) -> Result<AuthResponse, AuthServiceError> {
        let access_token = issue_access_token(&self.jwt, account, self.access_ttl_minutes)?;
        let (refresh_token, expires_at) =
            issue_refresh_token(&self.jwt, account.id, self.refresh_ttl_days)?;

        self.refresh_tokens
            .insert(RefreshToken::new(
                account.id,
                refresh_token.clone(),
                expires_at,
            ))
            .await?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.expires_in(),
            user: UserInfo::from(account),
        })
    }

    async fn hash(&self, password: String) -> Result<String, AuthServiceError> {
        let config = self.password;
        tokio::task::spawn_blocking(move || hash_password_with_config(&password, &config))
            .await
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?
            .map_err(AuthServiceError::from)
    }

    async fn verify(&self, password: String, hash: String) -> Result<bool, AuthServiceError> {
        tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?
            .map_err(AuthServiceError::from)
    }
}

fn map_identity_conflict(err: RepositoryError) -> AuthServiceError {
    if err.is_conflict_on("email") {
        AuthServiceError::DuplicateEmail
    } else if err.is_conflict_on("username") {
        AuthServiceError::DuplicateUsername
    } else {
        AuthServiceError::Repository(err)
    }
}

/// Reduce a display name to a valid username
///
/// Keeps `[A-Za-z0-9_]`, pads short results with underscores and truncates
/// to the maximum length.
pub fn sanitize_username(raw: &str) -> String {
    let mut username: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .take(USERNAME_MAX_LEN)
        .collect();

    if username.is_empty() {
        username.push_str("user");
    }
    while username.len() < USERNAME_MIN_LEN {
        username.push('_');
    }
    username
}

fn with_suffix(base: &str, suffix: &str) -> String {
    let keep = USERNAME_MAX_LEN.saturating_sub(suffix.len()).min(base.len());
    format!("{}{}", &base[..keep], suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn settings() -> JwtSettings {
        JwtSettings {
            secret: "unit-test-secret-0123456789".to_string(),
            access_token_ttl_minutes: 15,
            refresh_token_ttl_days: 7,
        }
    }

    fn service() -> (AuthService, Repositories) {
        let repos = Repositories::in_memory();
        let service = AuthService::new(&repos, &settings())
            .with_password_config(PasswordConfig::fast_for_tests());
        (service, repos)
    }

    fn register_request(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: "password123".to_string(),
        }
    }

    fn google_profile(id: &str, email: &str, given_name: Option<&str>) -> SocialProfile {
        SocialProfile {
            provider: AuthProvider::Google,
            provider_id: id.to_string(),
            email: email.to_string(),
            name: Some("Full Name".to_string()),
            given_name: given_name.map(str::to_string),
            avatar_url: Some("https://example.com/a.png".to_string()),
        }
    }

    #[tokio::test]
    async fn test_register_issues_tokens() {
        let (service, repos) = service();
        let response = service
            .register(register_request("alice", "alice@x.com"))
            .await
            .unwrap();

        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 900);
        assert_eq!(response.user.username, "alice");
        assert_eq!(response.user.role, UserRole::User);

        let account = repos
            .accounts
            .find_by_email("alice@x.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.auth_provider, AuthProvider::Email);
        assert!(account.password_hash.is_some());

        let stored = repos
            .refresh_tokens
            .find(&response.refresh_token, account.id)
            .await
            .unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn test_register_duplicates_rejected() {
        let (service, repos) = service();
        service
            .register(register_request("alice", "alice@x.com"))
            .await
            .unwrap();

        let err = service
            .register(register_request("alice2", "alice@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthServiceError::DuplicateEmail));
        assert_eq!(err.to_string(), "email already registered");

        let err = service
            .register(register_request("alice", "other@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthServiceError::DuplicateUsername));

        assert!(repos
            .accounts
            .find_by_username("alice2")
            .await
            .unwrap()
            .is_none());
        assert!(repos
            .accounts
            .find_by_email("other@x.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_login_failures_share_message() {
        let (service, _) = service();
        service
            .register(register_request("alice", "alice@x.com"))
            .await
            .unwrap();

        let wrong_password = service
            .login(LoginRequest {
                email: "alice@x.com".to_string(),
                password: "wrong-password".to_string(),
            })
            .await
            .unwrap_err();
        let unknown_email = service
            .login(LoginRequest {
                email: "nobody@x.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap_err();

        assert_eq!(wrong_password.to_string(), "invalid email or password");
        assert_eq!(unknown_email.to_string(), wrong_password.to_string());
    }

    #[tokio::test]
    async fn test_login_updates_last_login() {
        let (service, repos) = service();
        service
            .register(register_request("alice", "alice@x.com"))
            .await
            .unwrap();

        let response = service
            .login(LoginRequest {
                email: "alice@x.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();
        assert!(response.user.last_login_at.is_some());

        let account = repos
            .accounts
            .find_by_id(response.user.id)
            .await
            .unwrap()
            .unwrap();
        assert!(account.last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_login_rejects_inactive_account() {
        let (service, repos) = service();
        let registered = service
            .register(register_request("alice", "alice@x.com"))
            .await
            .unwrap();
        repos
            .accounts
            .update_status(registered.user.id, AccountStatus::Banned)
            .await
            .unwrap();

        let err = service
            .login(LoginRequest {
                email: "alice@x.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "account is banned");
    }

    #[tokio::test]
    async fn test_refresh_keeps_refresh_token() {
        let (service, _) = service();
        let registered = service
            .register(register_request("alice", "alice@x.com"))
            .await
            .unwrap();

        let refreshed = service
            .refresh(RefreshRequest {
                refresh_token: registered.refresh_token.clone(),
            })
            .await
            .unwrap();
        assert_eq!(refreshed.refresh_token, registered.refresh_token);
        assert_eq!(refreshed.expires_in, 900);
    }

    #[tokio::test]
    async fn test_refresh_after_logout_fails() {
        let (service, _) = service();
        let registered = service
            .register(register_request("alice", "alice@x.com"))
            .await
            .unwrap();

        service
            .logout(LogoutRequest {
                refresh_token: registered.refresh_token.clone(),
            })
            .await
            .unwrap();

        let err = service
            .refresh(RefreshRequest {
                refresh_token: registered.refresh_token,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthServiceError::TokenInvalid));
    }

    #[tokio::test]
    async fn test_refresh_unknown_and_garbage_tokens() {
        let (service, _) = service();

        let err = service
            .refresh(RefreshRequest {
                refresh_token: "not-a-jwt".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthServiceError::InvalidToken));

        // Well-formed and signed, but never recorded in the ledger
        let (unrecorded, _) =
            issue_refresh_token(service.jwt_config(), Uuid::new_v4(), 7).unwrap();
        let err = service
            .refresh(RefreshRequest {
                refresh_token: unrecorded,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthServiceError::TokenNotFound));
    }

    #[tokio::test]
    async fn test_refresh_expired_ledger_row() {
        let (service, repos) = service();
        let registered = service
            .register(register_request("alice", "alice@x.com"))
            .await
            .unwrap();

        // Signed token still valid, ledger row already past expiry
        let (token, _) = issue_refresh_token(service.jwt_config(), registered.user.id, 7).unwrap();
        repos
            .refresh_tokens
            .insert(RefreshToken::new(
                registered.user.id,
                token.clone(),
                Utc::now() - Duration::minutes(1),
            ))
            .await
            .unwrap();

        let err = service
            .refresh(RefreshRequest {
                refresh_token: token,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthServiceError::TokenInvalid));
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let (service, _) = service();
        let registered = service
            .register(register_request("alice", "alice@x.com"))
            .await
            .unwrap();

        let request = LogoutRequest {
            refresh_token: registered.refresh_token,
        };
        service.logout(request.clone()).await.unwrap();
        service.logout(request).await.unwrap();
        service
            .logout(LogoutRequest {
                refresh_token: "never-issued".to_string(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_social_login_creates_then_reuses_account() {
        let (service, repos) = service();

        let first = service
            .social_login(google_profile("g-1", "bob@gmail.com", Some("Bob")))
            .await
            .unwrap();
        assert_eq!(first.user.username, "Bob");
        assert_eq!(first.user.auth_provider, AuthProvider::Google);

        let account = repos
            .accounts
            .find_by_id(first.user.id)
            .await
            .unwrap()
            .unwrap();
        assert!(account.password_hash.is_none());
        assert_eq!(account.provider_id.as_deref(), Some("g-1"));

        let second = service
            .social_login(google_profile("g-1", "bob@gmail.com", Some("Bob")))
            .await
            .unwrap();
        assert_eq!(second.user.id, first.user.id);
        assert_ne!(second.refresh_token, first.refresh_token);
    }

    #[tokio::test]
    async fn test_social_login_email_conflict() {
        let (service, _) = service();
        service
            .register(register_request("alice", "alice@x.com"))
            .await
            .unwrap();

        let err = service
            .social_login(google_profile("g-2", "alice@x.com", Some("Alice")))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthServiceError::ProviderConflict));
        assert_eq!(
            err.to_string(),
            "email already registered with different login method"
        );
    }

    #[tokio::test]
    async fn test_social_login_username_collision() {
        let (service, _) = service();
        service
            .register(register_request("Bob", "bob@x.com"))
            .await
            .unwrap();

        let response = service
            .social_login(google_profile("g-3", "bob@gmail.com", Some("Bob")))
            .await
            .unwrap();
        assert_eq!(response.user.username, "Bob1");
    }

    #[tokio::test]
    async fn test_social_login_name_fallbacks() {
        let (service, _) = service();
        let mut profile = google_profile("g-4", "x@gmail.com", None);
        profile.name = Some("Jo Ann!".to_string());
        let response = service.social_login(profile).await.unwrap();
        assert_eq!(response.user.username, "JoAnn");

        let mut profile = google_profile("g-5", "y@gmail.com", None);
        profile.name = None;
        let response = service.social_login(profile).await.unwrap();
        assert_eq!(response.user.username, "user");
    }

    #[tokio::test]
    async fn test_social_login_inactive_account() {
        let (service, repos) = service();
        let first = service
            .social_login(google_profile("g-6", "c@gmail.com", Some("Cara")))
            .await
            .unwrap();
        repos
            .accounts
            .update_status(first.user.id, AccountStatus::Suspended)
            .await
            .unwrap();

        let err = service
            .social_login(google_profile("g-6", "c@gmail.com", Some("Cara")))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "account is suspended");
    }

    #[test]
    fn test_sanitize_username_examples() {
        assert_eq!(sanitize_username("Jane Doe"), "JaneDoe");
        assert_eq!(sanitize_username("日本"), "user");
        assert_eq!(sanitize_username("x"), "x__");
        assert_eq!(sanitize_username(&"a".repeat(80)).len(), USERNAME_MAX_LEN);
    }

    #[test]
    fn test_with_suffix_respects_max_len() {
        let base = "b".repeat(USERNAME_MAX_LEN);
        let name = with_suffix(&base, "1000");
        assert_eq!(name.len(), USERNAME_MAX_LEN);
        assert!(name.ends_with("1000"));
    }

    proptest! {
        #[test]
        fn prop_sanitized_username_is_valid(raw in ".{0,120}") {
            let name = sanitize_username(&raw);
            prop_assert!(name.len() >= USERNAME_MIN_LEN);
            prop_assert!(name.len() <= USERNAME_MAX_LEN);
            prop_assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        }

        #[test]
        fn prop_suffixed_username_is_valid(raw in ".{0,120}", suffix in 1u32..=10_000) {
            let name = with_suffix(&sanitize_username(&raw), &suffix.to_string());
            prop_assert!(name.len() <= USERNAME_MAX_LEN);
            prop_assert!(name.ends_with(&suffix.to_string()));
        }
    }
}
