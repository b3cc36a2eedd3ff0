//! User profiles and account administration

use std::sync::Arc;

use chrono::Utc;
use filmfolk_core::{AccountStatus, UserRole};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::repository::FollowRepository;
use super::{CatalogError, CatalogResult};
use crate::auth::models::{Account, AccountPublic};
use crate::auth::repository::{AccountRepository, ProfileUpdate, RefreshTokenRepository};
use crate::store::Repositories;

/// Public profile with follow counts
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: AccountPublic,
    pub followers_count: u64,
    pub following_count: u64,
    /// Whether the viewer follows this user; absent for anonymous viewers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_following: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 500, message = "bio must be at most 500 characters"))]
    pub bio: Option<String>,
    #[validate(url(message = "avatar_url must be a valid URL"))]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    #[schema(value_type = String, example = "suspended")]
    pub status: AccountStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    #[schema(value_type = String, example = "moderator")]
    pub role: UserRole,
}

#[derive(Clone)]
pub struct ProfileService {
    accounts: Arc<dyn AccountRepository>,
    follows: Arc<dyn FollowRepository>,
    refresh_tokens: Arc<dyn RefreshTokenRepository>,
}

impl ProfileService {
    pub fn new(repos: &Repositories) -> Self {
        Self {
            accounts: repos.accounts.clone(),
            follows: repos.follows.clone(),
            refresh_tokens: repos.refresh_tokens.clone(),
        }
    }

    /// Profile of `user_id` as seen by `viewer`
    pub async fn profile(&self, user_id: Uuid, viewer: Option<Uuid>) -> CatalogResult<UserProfile> {
        let account = self.find(user_id).await?;
        let stats = self.follows.stats(user_id).await?;
        let is_following = match viewer {
            Some(viewer) if viewer != user_id => Some(self.follows.exists(viewer, user_id).await?),
            Some(_) => Some(false),
            None => None,
        };

        Ok(UserProfile {
            user: account.to_public(),
            followers_count: stats.followers_count,
            following_count: stats.following_count,
            is_following,
        })
    }

    pub async fn update_profile(&self, user_id: Uuid, req: UpdateProfileRequest) -> CatalogResult<Account> {
        let update = ProfileUpdate {
            bio: req.bio.map(|b| b.trim().to_string()),
            avatar_url: req.avatar_url,
        };
        self.accounts
            .update_profile(user_id, update)
            .await?
            .ok_or_else(|| CatalogError::not_found("user"))
    }

    /// Change an account's status; leaving `active` revokes every session
    pub async fn set_status(
        &self,
        actor: Uuid,
        user_id: Uuid,
        status: AccountStatus,
    ) -> CatalogResult<Account> {
        if actor == user_id {
            return Err(CatalogError::Validation(
                "cannot change your own status".to_string(),
            ));
        }

        let account = self
            .accounts
            .update_status(user_id, status)
            .await?
            .ok_or_else(|| CatalogError::not_found("user"))?;

        if !status.is_active() {
            let revoked = self
                .refresh_tokens
                .revoke_all_for_account(user_id, Utc::now())
                .await?;
            info!(%user_id, %status, revoked, "revoked sessions of deactivated account");
        }
        Ok(account)
    }

    pub async fn set_role(&self, actor: Uuid, user_id: Uuid, role: UserRole) -> CatalogResult<Account> {
        if actor == user_id {
            return Err(CatalogError::Validation(
                "cannot change your own role".to_string(),
            ));
        }
        self.accounts
            .update_role(user_id, role)
            .await?
            .ok_or_else(|| CatalogError::not_found("user"))
    }

    async fn find(&self, id: Uuid) -> CatalogResult<Account> {
        self.accounts
            .find_by_id(id)
            .await?
            .ok_or_else(|| CatalogError::not_found("user"))
    }
}
