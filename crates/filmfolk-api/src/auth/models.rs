//! Data models for authentication and accounts
//!
//! This module defines the core data structures for the auth system:
//! - Account: identity, credentials and lifecycle state
//! - AccountPublic: the profile view other users may see
//! - RefreshToken: ledger row for an issued refresh token

use chrono::{DateTime, Utc};
use filmfolk_core::{AccountStatus, AuthProvider, UserRole};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Account model
///
/// Maps to the `accounts` table. Email accounts always carry a bcrypt hash;
/// accounts created through a social provider never do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,

    /// Unique handle, 3-50 characters
    pub username: String,

    /// Unique email address
    pub email: String,

    /// bcrypt hash, never serialized
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,

    pub auth_provider: AuthProvider,

    /// Subject identifier at the social provider
    pub provider_id: Option<String>,

    pub status: AccountStatus,

    pub role: UserRole,

    pub avatar_url: Option<String>,

    pub bio: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub last_login_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Create an active email/password account with the default role
    pub fn new_email(username: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash: Some(password_hash),
            auth_provider: AuthProvider::Email,
            provider_id: None,
            status: AccountStatus::Active,
            role: UserRole::User,
            avatar_url: None,
            bio: None,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    /// Create an active account linked to a social provider
    pub fn new_social(
        username: String,
        email: String,
        provider: AuthProvider,
        provider_id: String,
        avatar_url: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash: None,
            auth_provider: provider,
            provider_id: Some(provider_id),
            status: AccountStatus::Active,
            role: UserRole::User,
            avatar_url,
            bio: None,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    /// Check the credential invariant before the account is persisted
    pub fn check_credentials(&self) -> Result<(), String> {
        match (self.auth_provider.requires_password(), &self.password_hash) {
            (true, None) => Err("email accounts require a password hash".to_string()),
            (false, Some(_)) => Err(format!(
                "{} accounts must not carry a password hash",
                self.auth_provider
            )),
            _ => Ok(()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn to_public(&self) -> AccountPublic {
        AccountPublic {
            id: self.id,
            username: self.username.clone(),
            avatar_url: self.avatar_url.clone(),
            bio: self.bio.clone(),
            created_at: self.created_at,
        }
    }
}

/// Public account profile (safe to show to other users)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct AccountPublic {
    pub id: Uuid,
    pub username: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Refresh token ledger row
///
/// The token string is the signed refresh token itself. A row is valid
/// while it is unrevoked and unexpired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: Uuid,
    pub account_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl RefreshToken {
    pub fn new(account_id: Uuid, token: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            token,
            expires_at,
            created_at: Utc::now(),
            revoked_at: None,
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Validity at a given instant
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && now < self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}
