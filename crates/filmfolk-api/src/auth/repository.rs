//! Repository interfaces for accounts and the refresh-token ledger
//!
//! Services depend on these traits only. The PostgreSQL implementation
//! lives in [`crate::store::postgres`]; an in-memory one backs the tests.

use super::models::{Account, RefreshToken};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use filmfolk_core::{AccountStatus, AuthProvider, UserRole};
use thiserror::Error;
use uuid::Uuid;

/// Repository errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A unique constraint rejected the write; carries the constraint name
    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("Invalid record: {0}")]
    InvalidData(String),
}

impl RepositoryError {
    /// Whether a conflict was raised by a constraint mentioning `field`
    pub fn is_conflict_on(&self, field: &str) -> bool {
        matches!(self, RepositoryError::Conflict(constraint) if constraint.contains(field))
    }
}

/// Profile fields an account owner may edit
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

/// Account persistence
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert a new account; unique violations surface as `Conflict`
    async fn create(&self, account: Account) -> Result<Account, RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, RepositoryError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, RepositoryError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, RepositoryError>;

    async fn find_by_provider(
        &self,
        provider: AuthProvider,
        provider_id: &str,
    ) -> Result<Option<Account>, RepositoryError>;

    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError>;

    /// Returns the updated account, or `None` if it does not exist
    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<Account>, RepositoryError>;

    async fn update_status(
        &self,
        id: Uuid,
        status: AccountStatus,
    ) -> Result<Option<Account>, RepositoryError>;

    async fn update_role(&self, id: Uuid, role: UserRole)
        -> Result<Option<Account>, RepositoryError>;
}

/// Refresh-token ledger
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn insert(&self, token: RefreshToken) -> Result<RefreshToken, RepositoryError>;

    /// Look up the exact token string issued to `account_id`
    async fn find(
        &self,
        token: &str,
        account_id: Uuid,
    ) -> Result<Option<RefreshToken>, RepositoryError>;

    /// Mark every unrevoked row carrying `token` as revoked
    ///
    /// Returns the number of rows changed; zero is not an error.
    async fn revoke(&self, token: &str, at: DateTime<Utc>) -> Result<u64, RepositoryError>;

    /// Revoke every unrevoked token of an account
    async fn revoke_all_for_account(
        &self,
        account_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;
}
