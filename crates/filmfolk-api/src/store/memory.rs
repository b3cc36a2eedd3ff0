//! In-memory store for tests
//!
//! Mirrors the unique constraints of the PostgreSQL schema so conflict
//! handling can be exercised without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use filmfolk_core::{AccountStatus, AuthProvider, Page, ReviewStatus, UserRole};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use super::StoreHealth;
use crate::auth::models::{Account, RefreshToken};
use crate::auth::repository::{
    AccountRepository, ProfileUpdate, RefreshTokenRepository, RepositoryError,
};
use crate::catalog::models::{
    Follow, FollowStats, Movie, MovieFilter, MovieSort, Review, ReviewComment,
};
use crate::catalog::repository::{FollowRepository, MovieRepository, ReviewRepository};

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, Account>,
    refresh_tokens: Vec<RefreshToken>,
    movies: HashMap<Uuid, Movie>,
    reviews: HashMap<Uuid, Review>,
    comments: Vec<ReviewComment>,
    follows: Vec<Follow>,
}

/// Store backed by process memory
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, RepositoryError> {
        self.tables
            .read()
            .map_err(|_| RepositoryError::DatabaseError("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, RepositoryError> {
        self.tables
            .write()
            .map_err(|_| RepositoryError::DatabaseError("store lock poisoned".to_string()))
    }
}

fn paginate<T>(items: Vec<T>, page: Page) -> (Vec<T>, u64) {
    let total = items.len() as u64;
    let items = items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect();
    (items, total)
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        self.read().map(|_| ())
    }
}

// ============================================================================
// Accounts
// ============================================================================

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn create(&self, account: Account) -> Result<Account, RepositoryError> {
        account
            .check_credentials()
            .map_err(RepositoryError::InvalidData)?;

        let mut tables = self.write()?;
        for existing in tables.accounts.values() {
            if existing.email == account.email {
                return Err(RepositoryError::Conflict("accounts_email_key".to_string()));
            }
            if existing.username == account.username {
                return Err(RepositoryError::Conflict(
                    "accounts_username_key".to_string(),
                ));
            }
            if account.provider_id.is_some()
                && existing.auth_provider == account.auth_provider
                && existing.provider_id == account.provider_id
            {
                return Err(RepositoryError::Conflict(
                    "accounts_provider_key".to_string(),
                ));
            }
        }
        tables.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, RepositoryError> {
        Ok(self.read()?.accounts.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, RepositoryError> {
        Ok(self
            .read()?
            .accounts
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, RepositoryError> {
        Ok(self
            .read()?
            .accounts
            .values()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn find_by_provider(
        &self,
        provider: AuthProvider,
        provider_id: &str,
    ) -> Result<Option<Account>, RepositoryError> {
        Ok(self
            .read()?
            .accounts
            .values()
            .find(|a| a.auth_provider == provider && a.provider_id.as_deref() == Some(provider_id))
            .cloned())
    }

    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        if let Some(account) = self.write()?.accounts.get_mut(&id) {
            account.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<Account>, RepositoryError> {
        let mut tables = self.write()?;
        Ok(tables.accounts.get_mut(&id).map(|account| {
            if let Some(bio) = update.bio {
                account.bio = Some(bio);
            }
            if let Some(avatar_url) = update.avatar_url {
                account.avatar_url = Some(avatar_url);
            }
            account.updated_at = Utc::now();
            account.clone()
        }))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: AccountStatus,
    ) -> Result<Option<Account>, RepositoryError> {
        let mut tables = self.write()?;
        Ok(tables.accounts.get_mut(&id).map(|account| {
            account.status = status;
            account.updated_at = Utc::now();
            account.clone()
        }))
    }

    async fn update_role(
        &self,
        id: Uuid,
        role: UserRole,
    ) -> Result<Option<Account>, RepositoryError> {
        let mut tables = self.write()?;
        Ok(tables.accounts.get_mut(&id).map(|account| {
            account.role = role;
            account.updated_at = Utc::now();
            account.clone()
        }))
    }
}

// ============================================================================
// Refresh-token ledger
// ============================================================================

#[async_trait]
impl RefreshTokenRepository for MemoryStore {
    async fn insert(&self, token: RefreshToken) -> Result<RefreshToken, RepositoryError> {
        let mut tables = self.write()?;
        if tables.refresh_tokens.iter().any(|t| t.token == token.token) {
            return Err(RepositoryError::Conflict(
                "refresh_tokens_token_key".to_string(),
            ));
        }
        tables.refresh_tokens.push(token.clone());
        Ok(token)
    }

    async fn find(
        &self,
        token: &str,
        account_id: Uuid,
    ) -> Result<Option<RefreshToken>, RepositoryError> {
        Ok(self
            .read()?
            .refresh_tokens
            .iter()
            .find(|t| t.token == token && t.account_id == account_id)
            .cloned())
    }

    async fn revoke(&self, token: &str, at: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let mut tables = self.write()?;
        let mut changed = 0;
        for row in tables
            .refresh_tokens
            .iter_mut()
            .filter(|t| t.token == token && t.revoked_at.is_none())
        {
            row.revoked_at = Some(at);
            changed += 1;
        }
        Ok(changed)
    }

    async fn revoke_all_for_account(
        &self,
        account_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut tables = self.write()?;
        let mut changed = 0;
        for row in tables
            .refresh_tokens
            .iter_mut()
            .filter(|t| t.account_id == account_id && t.revoked_at.is_none())
        {
            row.revoked_at = Some(at);
            changed += 1;
        }
        Ok(changed)
    }
}

// ============================================================================
// Movies
// ============================================================================

#[async_trait]
impl MovieRepository for MemoryStore {
    async fn create(&self, movie: Movie) -> Result<Movie, RepositoryError> {
        let mut tables = self.write()?;
        if movie.tmdb_id.is_some()
            && tables.movies.values().any(|m| m.tmdb_id == movie.tmdb_id)
        {
            return Err(RepositoryError::Conflict("movies_tmdb_id_key".to_string()));
        }
        tables.movies.insert(movie.id, movie.clone());
        Ok(movie)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Movie>, RepositoryError> {
        Ok(self.read()?.movies.get(&id).cloned())
    }

    async fn list(&self, filter: &MovieFilter) -> Result<(Vec<Movie>, u64), RepositoryError> {
        let tables = self.read()?;
        let mut movies: Vec<Movie> = tables
            .movies
            .values()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();

        match filter.sort {
            MovieSort::Title => movies.sort_by(|a, b| a.title.cmp(&b.title)),
            MovieSort::Rating => movies.sort_by(|a, b| {
                b.average_rating
                    .unwrap_or(0.0)
                    .total_cmp(&a.average_rating.unwrap_or(0.0))
            }),
            MovieSort::Year => movies.sort_by(|a, b| b.release_year.cmp(&a.release_year)),
            MovieSort::Reviews => movies.sort_by(|a, b| b.total_reviews.cmp(&a.total_reviews)),
        }

        Ok(paginate(movies, filter.page))
    }

    async fn save(&self, movie: Movie) -> Result<Option<Movie>, RepositoryError> {
        let mut tables = self.write()?;
        Ok(tables.movies.get_mut(&movie.id).map(|stored| {
            *stored = movie;
            stored.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut tables = self.write()?;
        let removed = tables.movies.remove(&id).is_some();
        if removed {
            let review_ids: Vec<Uuid> = tables
                .reviews
                .values()
                .filter(|r| r.movie_id == id)
                .map(|r| r.id)
                .collect();
            tables.reviews.retain(|_, r| r.movie_id != id);
            tables.comments.retain(|c| !review_ids.contains(&c.review_id));
        }
        Ok(removed)
    }

    async fn update_stats(
        &self,
        id: Uuid,
        average_rating: Option<f64>,
        total_reviews: i64,
    ) -> Result<(), RepositoryError> {
        if let Some(movie) = self.write()?.movies.get_mut(&id) {
            movie.average_rating = average_rating;
            movie.total_reviews = i32::try_from(total_reviews).unwrap_or(i32::MAX);
        }
        Ok(())
    }
}

// ============================================================================
// Reviews
// ============================================================================

#[async_trait]
impl ReviewRepository for MemoryStore {
    async fn create(&self, review: Review) -> Result<Review, RepositoryError> {
        let mut tables = self.write()?;
        if tables
            .reviews
            .values()
            .any(|r| r.user_id == review.user_id && r.movie_id == review.movie_id)
        {
            return Err(RepositoryError::Conflict(
                "reviews_user_id_movie_id_key".to_string(),
            ));
        }
        tables.reviews.insert(review.id, review.clone());
        Ok(review)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Review>, RepositoryError> {
        Ok(self.read()?.reviews.get(&id).cloned())
    }

    async fn find_by_author_and_movie(
        &self,
        user_id: Uuid,
        movie_id: Uuid,
    ) -> Result<Option<Review>, RepositoryError> {
        Ok(self
            .read()?
            .reviews
            .values()
            .find(|r| r.user_id == user_id && r.movie_id == movie_id)
            .cloned())
    }

    async fn list_for_movie(
        &self,
        movie_id: Uuid,
        status: ReviewStatus,
        page: Page,
    ) -> Result<(Vec<Review>, u64), RepositoryError> {
        let tables = self.read()?;
        let mut reviews: Vec<Review> = tables
            .reviews
            .values()
            .filter(|r| r.movie_id == movie_id && r.status == status)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(reviews, page))
    }

    async fn save(&self, review: Review) -> Result<Option<Review>, RepositoryError> {
        let mut tables = self.write()?;
        Ok(tables.reviews.get_mut(&review.id).map(|stored| {
            *stored = review;
            stored.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut tables = self.write()?;
        let removed = tables.reviews.remove(&id).is_some();
        tables.comments.retain(|c| c.review_id != id);
        Ok(removed)
    }

    async fn rating_stats(&self, movie_id: Uuid) -> Result<(Option<f64>, i64), RepositoryError> {
        let tables = self.read()?;
        let ratings: Vec<i32> = tables
            .reviews
            .values()
            .filter(|r| r.movie_id == movie_id && r.status == ReviewStatus::Published)
            .map(|r| r.rating)
            .collect();
        if ratings.is_empty() {
            return Ok((None, 0));
        }
        let sum: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
        let count = ratings.len() as i64;
        Ok((Some(sum as f64 / count as f64), count))
    }

    async fn adjust_comment_count(
        &self,
        review_id: Uuid,
        delta: i32,
    ) -> Result<(), RepositoryError> {
        if let Some(review) = self.write()?.reviews.get_mut(&review_id) {
            review.comments_count = (review.comments_count + delta).max(0);
        }
        Ok(())
    }

    async fn create_comment(
        &self,
        comment: ReviewComment,
    ) -> Result<ReviewComment, RepositoryError> {
        self.write()?.comments.push(comment.clone());
        Ok(comment)
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<ReviewComment>, RepositoryError> {
        Ok(self.read()?.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn list_comments(&self, review_id: Uuid) -> Result<Vec<ReviewComment>, RepositoryError> {
        let tables = self.read()?;
        let mut comments: Vec<ReviewComment> = tables
            .comments
            .iter()
            .filter(|c| c.review_id == review_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(comments)
    }

    async fn remove_comment(&self, id: Uuid, removed_by: Uuid) -> Result<bool, RepositoryError> {
        let mut tables = self.write()?;
        match tables
            .comments
            .iter_mut()
            .find(|c| c.id == id && !c.is_removed)
        {
            Some(comment) => {
                comment.is_removed = true;
                comment.removed_by = Some(removed_by);
                comment.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ============================================================================
// Follows
// ============================================================================

impl MemoryStore {
    fn follow_page<F>(
        &self,
        page: Page,
        select: F,
    ) -> Result<(Vec<Account>, u64), RepositoryError>
    where
        F: Fn(&Follow) -> Option<Uuid>,
    {
        let tables = self.read()?;
        let mut edges: Vec<&Follow> = tables
            .follows
            .iter()
            .filter(|f| select(f).is_some())
            .collect();
        edges.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let accounts = edges
            .into_iter()
            .filter_map(|f| select(f))
            .filter_map(|id| tables.accounts.get(&id).cloned())
            .collect();
        Ok(paginate(accounts, page))
    }
}

#[async_trait]
impl FollowRepository for MemoryStore {
    async fn create(&self, follow: Follow) -> Result<Follow, RepositoryError> {
        let mut tables = self.write()?;
        if tables
            .follows
            .iter()
            .any(|f| f.follower_id == follow.follower_id && f.following_id == follow.following_id)
        {
            return Err(RepositoryError::Conflict(
                "follows_follower_id_following_id_key".to_string(),
            ));
        }
        tables.follows.push(follow.clone());
        Ok(follow)
    }

    async fn delete(&self, follower_id: Uuid, following_id: Uuid) -> Result<bool, RepositoryError> {
        let mut tables = self.write()?;
        let before = tables.follows.len();
        tables
            .follows
            .retain(|f| !(f.follower_id == follower_id && f.following_id == following_id));
        Ok(tables.follows.len() < before)
    }

    async fn exists(&self, follower_id: Uuid, following_id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self
            .read()?
            .follows
            .iter()
            .any(|f| f.follower_id == follower_id && f.following_id == following_id))
    }

    async fn followers(
        &self,
        account_id: Uuid,
        page: Page,
    ) -> Result<(Vec<Account>, u64), RepositoryError> {
        self.follow_page(page, |f| {
            (f.following_id == account_id).then_some(f.follower_id)
        })
    }

    async fn following(
        &self,
        account_id: Uuid,
        page: Page,
    ) -> Result<(Vec<Account>, u64), RepositoryError> {
        self.follow_page(page, |f| {
            (f.follower_id == account_id).then_some(f.following_id)
        })
    }

    async fn stats(&self, account_id: Uuid) -> Result<FollowStats, RepositoryError> {
        let tables = self.read()?;
        Ok(FollowStats {
            followers_count: tables
                .follows
                .iter()
                .filter(|f| f.following_id == account_id)
                .count() as u64,
            following_count: tables
                .follows
                .iter()
                .filter(|f| f.follower_id == account_id)
                .count() as u64,
        })
    }
}
