//! Follow graph service

use std::sync::Arc;

use filmfolk_core::Page;
use uuid::Uuid;

use super::models::{AccountList, Follow, FollowStats};
use super::repository::FollowRepository;
use super::reviews::PageQuery;
use super::{CatalogError, CatalogResult, DEFAULT_PAGE_SIZE, MAX_USER_PAGE_SIZE};
use crate::auth::models::Account;
use crate::auth::repository::{AccountRepository, RepositoryError};
use crate::store::Repositories;

#[derive(Clone)]
pub struct FollowerService {
    follows: Arc<dyn FollowRepository>,
    accounts: Arc<dyn AccountRepository>,
}

impl FollowerService {
    pub fn new(repos: &Repositories) -> Self {
        Self {
            follows: repos.follows.clone(),
            accounts: repos.accounts.clone(),
        }
    }

    pub async fn follow(&self, follower: Uuid, target: Uuid) -> CatalogResult<Follow> {
        if follower == target {
            return Err(CatalogError::Validation(
                "cannot follow yourself".to_string(),
            ));
        }
        if self.accounts.find_by_id(target).await?.is_none() {
            return Err(CatalogError::not_found("user to follow"));
        }
        if self.follows.exists(follower, target).await? {
            return Err(already_following());
        }

        self.follows
            .create(Follow::new(follower, target))
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict(_) => already_following(),
                other => CatalogError::Repository(other),
            })
    }

    pub async fn unfollow(&self, follower: Uuid, target: Uuid) -> CatalogResult<()> {
        if follower == target {
            return Err(CatalogError::Validation("invalid operation".to_string()));
        }
        if self.follows.delete(follower, target).await? {
            Ok(())
        } else {
            Err(CatalogError::Validation(
                "not following this user".to_string(),
            ))
        }
    }

    pub async fn is_following(&self, follower: Uuid, target: Uuid) -> CatalogResult<bool> {
        Ok(self.follows.exists(follower, target).await?)
    }

    pub async fn followers(&self, user_id: Uuid, query: PageQuery) -> CatalogResult<AccountList> {
        self.ensure_user(user_id).await?;
        let page = user_page(query);
        let (accounts, total) = self.follows.followers(user_id, page).await?;
        Ok(account_list(accounts, total, page))
    }

    pub async fn following(&self, user_id: Uuid, query: PageQuery) -> CatalogResult<AccountList> {
        self.ensure_user(user_id).await?;
        let page = user_page(query);
        let (accounts, total) = self.follows.following(user_id, page).await?;
        Ok(account_list(accounts, total, page))
    }

    pub async fn stats(&self, user_id: Uuid) -> CatalogResult<FollowStats> {
        Ok(self.follows.stats(user_id).await?)
    }

    async fn ensure_user(&self, user_id: Uuid) -> CatalogResult<()> {
        match self.accounts.find_by_id(user_id).await? {
            Some(_) => Ok(()),
            None => Err(CatalogError::not_found("user")),
        }
    }
}

fn already_following() -> CatalogError {
    CatalogError::Conflict("already following this user".to_string())
}

fn user_page(query: PageQuery) -> Page {
    Page::new(query.page, query.page_size, DEFAULT_PAGE_SIZE, MAX_USER_PAGE_SIZE)
}

fn account_list(accounts: Vec<Account>, total: u64, page: Page) -> AccountList {
    AccountList {
        users: accounts.iter().map(Account::to_public).collect(),
        total,
        page: page.page,
        page_size: page.page_size,
    }
}
