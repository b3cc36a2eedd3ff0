//! Repository interfaces for catalog data

use async_trait::async_trait;
use filmfolk_core::{Page, ReviewStatus};
use uuid::Uuid;

use super::models::{Follow, FollowStats, Movie, MovieFilter, Review, ReviewComment};
use crate::auth::models::Account;
use crate::auth::repository::RepositoryError;

/// Movie persistence
#[async_trait]
pub trait MovieRepository: Send + Sync {
    /// Insert a movie; a duplicate TMDB id surfaces as `Conflict`
    async fn create(&self, movie: Movie) -> Result<Movie, RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Movie>, RepositoryError>;

    /// Filtered, sorted page plus the total match count
    async fn list(&self, filter: &MovieFilter) -> Result<(Vec<Movie>, u64), RepositoryError>;

    /// Persist every mutable field; `None` if the movie is gone
    async fn save(&self, movie: Movie) -> Result<Option<Movie>, RepositoryError>;

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError>;

    async fn update_stats(
        &self,
        id: Uuid,
        average_rating: Option<f64>,
        total_reviews: i64,
    ) -> Result<(), RepositoryError>;
}

/// Review and comment persistence
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Insert a review; a second review of the same movie by the same
    /// author surfaces as `Conflict`
    async fn create(&self, review: Review) -> Result<Review, RepositoryError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Review>, RepositoryError>;

    async fn find_by_author_and_movie(
        &self,
        user_id: Uuid,
        movie_id: Uuid,
    ) -> Result<Option<Review>, RepositoryError>;

    /// Reviews of a movie in a given status, newest first
    async fn list_for_movie(
        &self,
        movie_id: Uuid,
        status: ReviewStatus,
        page: Page,
    ) -> Result<(Vec<Review>, u64), RepositoryError>;

    async fn save(&self, review: Review) -> Result<Option<Review>, RepositoryError>;

    /// Delete a review together with its comments
    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError>;

    /// Average rating and count of published reviews for a movie
    async fn rating_stats(&self, movie_id: Uuid) -> Result<(Option<f64>, i64), RepositoryError>;

    async fn adjust_comment_count(&self, review_id: Uuid, delta: i32)
        -> Result<(), RepositoryError>;

    async fn create_comment(
        &self,
        comment: ReviewComment,
    ) -> Result<ReviewComment, RepositoryError>;

    async fn find_comment(&self, id: Uuid) -> Result<Option<ReviewComment>, RepositoryError>;

    /// Comments of a review, oldest first
    async fn list_comments(&self, review_id: Uuid) -> Result<Vec<ReviewComment>, RepositoryError>;

    /// Soft-remove a comment; returns false if it was already removed or absent
    async fn remove_comment(&self, id: Uuid, removed_by: Uuid) -> Result<bool, RepositoryError>;
}

/// Follow-graph persistence
#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Insert an edge; a duplicate pair surfaces as `Conflict`
    async fn create(&self, follow: Follow) -> Result<Follow, RepositoryError>;

    async fn delete(&self, follower_id: Uuid, following_id: Uuid) -> Result<bool, RepositoryError>;

    async fn exists(&self, follower_id: Uuid, following_id: Uuid) -> Result<bool, RepositoryError>;

    /// Accounts following `account_id`, newest edge first
    async fn followers(
        &self,
        account_id: Uuid,
        page: Page,
    ) -> Result<(Vec<Account>, u64), RepositoryError>;

    /// Accounts `account_id` follows, newest edge first
    async fn following(
        &self,
        account_id: Uuid,
        page: Page,
    ) -> Result<(Vec<Account>, u64), RepositoryError>;

    async fn stats(&self, account_id: Uuid) -> Result<FollowStats, RepositoryError>;
}
