//! Review and comment service
//!
//! One review per author and movie. Every review change recomputes the
//! movie's rating stats. Comments nest by `parent_comment_id`; deleting a
//! comment only blanks it so replies keep their place in the thread.

use std::sync::Arc;

use chrono::Utc;
use filmfolk_core::{Page, ReviewStatus};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::models::{build_comment_tree, Review, ReviewComment, ReviewDetail, ReviewList};
use super::repository::{MovieRepository, ReviewRepository};
use super::{CatalogError, CatalogResult, DEFAULT_PAGE_SIZE, MAX_REVIEW_PAGE_SIZE};
use crate::auth::middleware::AuthenticatedUser;
use crate::store::Repositories;

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 10;
/// Top-level comments sit at depth 1
pub const MAX_COMMENT_DEPTH: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateReviewRequest {
    pub movie_id: Uuid,
    #[validate(range(min = 1, max = 10, message = "rating must be between 1 and 10"))]
    pub rating: i32,
    #[validate(length(min = 10, message = "review_text must be at least 10 characters"))]
    pub review_text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpdateReviewRequest {
    #[validate(range(min = 1, max = 10, message = "rating must be between 1 and 10"))]
    pub rating: Option<i32>,
    #[validate(length(min = 10, message = "review_text must be at least 10 characters"))]
    pub review_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateCommentRequest {
    pub review_id: Uuid,
    pub parent_comment_id: Option<Uuid>,
    #[validate(length(min = 1, max = 1000, message = "comment_text must be 1-1000 characters"))]
    pub comment_text: String,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Review service
#[derive(Clone)]
pub struct ReviewService {
    reviews: Arc<dyn ReviewRepository>,
    movies: Arc<dyn MovieRepository>,
}

impl ReviewService {
    pub fn new(repos: &Repositories) -> Self {
        Self {
            reviews: repos.reviews.clone(),
            movies: repos.movies.clone(),
        }
    }

    pub async fn create(&self, author: Uuid, req: CreateReviewRequest) -> CatalogResult<Review> {
        check_rating(req.rating)?;
        if self.movies.find_by_id(req.movie_id).await?.is_none() {
            return Err(CatalogError::not_found("movie"));
        }
        if self
            .reviews
            .find_by_author_and_movie(author, req.movie_id)
            .await?
            .is_some()
        {
            return Err(already_reviewed());
        }

        let review = Review::new(author, req.movie_id, req.rating, req.review_text);
        let review = self.reviews.create(review).await.map_err(|err| {
            if err.is_conflict_on("reviews") {
                already_reviewed()
            } else {
                CatalogError::Repository(err)
            }
        })?;

        self.refresh_movie_stats(review.movie_id).await?;
        debug!(review_id = %review.id, movie_id = %review.movie_id, "review created");
        Ok(review)
    }

    /// Review with its comment tree
    pub async fn detail(&self, id: Uuid) -> CatalogResult<ReviewDetail> {
        let review = self.find(id).await?;
        let comments = self.reviews.list_comments(id).await?;
        Ok(ReviewDetail {
            review,
            comments: build_comment_tree(comments),
        })
    }

    /// Published reviews of a movie, newest first
    pub async fn list_for_movie(&self, movie_id: Uuid, query: PageQuery) -> CatalogResult<ReviewList> {
        if self.movies.find_by_id(movie_id).await?.is_none() {
            return Err(CatalogError::not_found("movie"));
        }
        let page = Page::new(
            query.page,
            query.page_size,
            DEFAULT_PAGE_SIZE,
            MAX_REVIEW_PAGE_SIZE,
        );
        let (reviews, total) = self
            .reviews
            .list_for_movie(movie_id, ReviewStatus::Published, page)
            .await?;
        Ok(ReviewList {
            reviews,
            total,
            page: page.page,
            page_size: page.page_size,
        })
    }

    pub async fn update(
        &self,
        id: Uuid,
        author: Uuid,
        req: UpdateReviewRequest,
    ) -> CatalogResult<Review> {
        let mut review = self.find(id).await?;
        if review.user_id != author {
            return Err(CatalogError::Forbidden(
                "you can only edit your own reviews".to_string(),
            ));
        }

        if let Some(rating) = req.rating {
            check_rating(rating)?;
            review.rating = rating;
        }
        if let Some(text) = req.review_text {
            review.review_text = text;
        }
        review.updated_at = Utc::now();

        let review = self.save(review).await?;
        self.refresh_movie_stats(review.movie_id).await?;
        Ok(review)
    }

    /// Authors delete their own reviews; moderators delete any
    pub async fn delete(&self, id: Uuid, actor: &AuthenticatedUser) -> CatalogResult<Review> {
        let review = self.find(id).await?;
        if review.user_id != actor.user_id && !actor.is_moderator() {
            return Err(CatalogError::Forbidden(
                "you don't have permission to delete this review".to_string(),
            ));
        }

        if !self.reviews.delete(id).await? {
            return Err(CatalogError::not_found("review"));
        }
        self.refresh_movie_stats(review.movie_id).await?;
        Ok(review)
    }

    pub async fn lock_thread(&self, id: Uuid, author: Uuid) -> CatalogResult<Review> {
        self.set_thread_lock(id, author, true).await
    }

    pub async fn unlock_thread(&self, id: Uuid, author: Uuid) -> CatalogResult<Review> {
        self.set_thread_lock(id, author, false).await
    }

    async fn set_thread_lock(&self, id: Uuid, author: Uuid, locked: bool) -> CatalogResult<Review> {
        let mut review = self.find(id).await?;
        let verb = if locked { "lock" } else { "unlock" };
        if review.user_id != author {
            return Err(CatalogError::Forbidden(format!(
                "only review author can {verb} the thread"
            )));
        }
        if review.is_thread_locked == locked {
            return Err(CatalogError::Validation(if locked {
                "thread is already locked".to_string()
            } else {
                "thread is not locked".to_string()
            }));
        }

        review.is_thread_locked = locked;
        review.updated_at = Utc::now();
        self.save(review).await
    }

    pub async fn add_comment(
        &self,
        author: Uuid,
        req: CreateCommentRequest,
    ) -> CatalogResult<ReviewComment> {
        let review = self.find(req.review_id).await?;
        if review.is_thread_locked {
            return Err(CatalogError::Forbidden(
                "this review thread is locked".to_string(),
            ));
        }

        if let Some(parent_id) = req.parent_comment_id {
            let parent = self
                .reviews
                .find_comment(parent_id)
                .await?
                .ok_or_else(|| CatalogError::not_found("parent comment"))?;
            if parent.review_id != review.id {
                return Err(CatalogError::Validation(
                    "parent comment belongs to a different review".to_string(),
                ));
            }
            if self.comment_depth(&parent).await? >= MAX_COMMENT_DEPTH {
                return Err(CatalogError::Validation(format!(
                    "replies cannot nest deeper than {MAX_COMMENT_DEPTH} levels"
                )));
            }
        }

        let comment = ReviewComment::new(
            review.id,
            author,
            req.parent_comment_id,
            req.comment_text,
        );
        let comment = self.reviews.create_comment(comment).await?;
        self.reviews.adjust_comment_count(review.id, 1).await?;
        Ok(comment)
    }

    /// Depth of an existing comment, counted up to `MAX_COMMENT_DEPTH`
    async fn comment_depth(&self, comment: &ReviewComment) -> CatalogResult<usize> {
        let mut depth = 1;
        let mut cursor = comment.parent_comment_id;
        while let Some(id) = cursor {
            if depth >= MAX_COMMENT_DEPTH {
                break;
            }
            depth += 1;
            cursor = self
                .reviews
                .find_comment(id)
                .await?
                .and_then(|c| c.parent_comment_id);
        }
        Ok(depth)
    }

    /// Authors remove their own comments; moderators remove any
    pub async fn remove_comment(&self, id: Uuid, actor: &AuthenticatedUser) -> CatalogResult<ReviewComment> {
        let comment = self
            .reviews
            .find_comment(id)
            .await?
            .filter(|c| !c.is_removed)
            .ok_or_else(|| CatalogError::not_found("comment"))?;

        if comment.user_id != actor.user_id && !actor.is_moderator() {
            return Err(CatalogError::Forbidden(
                "you don't have permission to delete this comment".to_string(),
            ));
        }

        if !self.reviews.remove_comment(id, actor.user_id).await? {
            return Err(CatalogError::not_found("comment"));
        }
        self.reviews
            .adjust_comment_count(comment.review_id, -1)
            .await?;
        Ok(comment)
    }

    async fn refresh_movie_stats(&self, movie_id: Uuid) -> CatalogResult<()> {
        let (average, count) = self.reviews.rating_stats(movie_id).await?;
        if let Err(err) = self.movies.update_stats(movie_id, average, count).await {
            // the review itself is stored; stats catch up on the next change
            warn!(%movie_id, error = %err, "failed to update movie stats");
        }
        Ok(())
    }

    async fn find(&self, id: Uuid) -> CatalogResult<Review> {
        self.reviews
            .find_by_id(id)
            .await?
            .ok_or_else(|| CatalogError::not_found("review"))
    }

    async fn save(&self, review: Review) -> CatalogResult<Review> {
        self.reviews
            .save(review)
            .await?
            .ok_or_else(|| CatalogError::not_found("review"))
    }
}

fn check_rating(rating: i32) -> CatalogResult<()> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(())
    } else {
        Err(CatalogError::Validation(
            "rating must be between 1 and 10".to_string(),
        ))
    }
}

fn already_reviewed() -> CatalogError {
    CatalogError::Conflict("you have already reviewed this movie".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::models::{Movie, MovieDraft, REMOVED_COMMENT_TEXT};
    use filmfolk_core::UserRole;

    struct Fixture {
        service: ReviewService,
        repos: Repositories,
        movie: Movie,
    }

    async fn fixture() -> Fixture {
        let repos = Repositories::in_memory();
        let movie = repos
            .movies
            .create(Movie::submitted(
                MovieDraft {
                    title: "Alien".to_string(),
                    release_year: 1979,
                    ..Default::default()
                },
                Uuid::new_v4(),
            ))
            .await
            .unwrap();
        Fixture {
            service: ReviewService::new(&repos),
            repos,
            movie,
        }
    }

    fn user(role: UserRole) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: Uuid::new_v4(),
            username: "someone".to_string(),
            email: "someone@x.com".to_string(),
            role,
        }
    }

    fn review_req(movie_id: Uuid, rating: i32) -> CreateReviewRequest {
        CreateReviewRequest {
            movie_id,
            rating,
            review_text: "In space no one can hear you scream.".to_string(),
        }
    }

    fn comment_req(review_id: Uuid, parent: Option<Uuid>) -> CreateCommentRequest {
        CreateCommentRequest {
            review_id,
            parent_comment_id: parent,
            comment_text: "agreed".to_string(),
        }
    }

    async fn stored_movie(f: &Fixture) -> Movie {
        f.repos.movies.find_by_id(f.movie.id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_create_updates_movie_stats() {
        let f = fixture().await;
        f.service
            .create(Uuid::new_v4(), review_req(f.movie.id, 8))
            .await
            .unwrap();
        f.service
            .create(Uuid::new_v4(), review_req(f.movie.id, 5))
            .await
            .unwrap();

        let movie = stored_movie(&f).await;
        assert_eq!(movie.total_reviews, 2);
        assert_eq!(movie.average_rating, Some(6.5));
    }

    #[tokio::test]
    async fn test_one_review_per_movie() {
        let f = fixture().await;
        let author = Uuid::new_v4();
        f.service
            .create(author, review_req(f.movie.id, 8))
            .await
            .unwrap();
        let err = f
            .service
            .create(author, review_req(f.movie.id, 3))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)));
        assert_eq!(err.to_string(), "you have already reviewed this movie");
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_movie_and_bad_rating() {
        let f = fixture().await;
        let err = f
            .service
            .create(Uuid::new_v4(), review_req(Uuid::new_v4(), 8))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "movie not found");

        let err = f
            .service
            .create(Uuid::new_v4(), review_req(f.movie.id, 11))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_is_author_only() {
        let f = fixture().await;
        let author = Uuid::new_v4();
        let review = f
            .service
            .create(author, review_req(f.movie.id, 4))
            .await
            .unwrap();

        let err = f
            .service
            .update(review.id, Uuid::new_v4(), UpdateReviewRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "you can only edit your own reviews");

        let updated = f
            .service
            .update(
                review.id,
                author,
                UpdateReviewRequest {
                    rating: Some(9),
                    review_text: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.rating, 9);
        assert_eq!(updated.review_text, review.review_text);
        assert_eq!(stored_movie(&f).await.average_rating, Some(9.0));
    }

    #[tokio::test]
    async fn test_delete_by_author_or_moderator() {
        let f = fixture().await;
        let author = user(UserRole::User);
        let review = f
            .service
            .create(author.user_id, review_req(f.movie.id, 7))
            .await
            .unwrap();

        let err = f
            .service
            .delete(review.id, &user(UserRole::User))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Forbidden(_)));

        f.service
            .delete(review.id, &user(UserRole::Moderator))
            .await
            .unwrap();
        let movie = stored_movie(&f).await;
        assert_eq!(movie.total_reviews, 0);
        assert_eq!(movie.average_rating, None);

        let err = f.service.delete(review.id, &author).await.unwrap_err();
        assert_eq!(err.to_string(), "review not found");
    }

    #[tokio::test]
    async fn test_thread_lock_blocks_comments() {
        let f = fixture().await;
        let author = Uuid::new_v4();
        let review = f
            .service
            .create(author, review_req(f.movie.id, 7))
            .await
            .unwrap();

        let err = f
            .service
            .lock_thread(review.id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "only review author can lock the thread");

        f.service.lock_thread(review.id, author).await.unwrap();
        let err = f.service.lock_thread(review.id, author).await.unwrap_err();
        assert_eq!(err.to_string(), "thread is already locked");

        let err = f
            .service
            .add_comment(Uuid::new_v4(), comment_req(review.id, None))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "this review thread is locked");

        f.service.unlock_thread(review.id, author).await.unwrap();
        let err = f.service.unlock_thread(review.id, author).await.unwrap_err();
        assert_eq!(err.to_string(), "thread is not locked");
        f.service
            .add_comment(Uuid::new_v4(), comment_req(review.id, None))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_comment_threads_and_removal() {
        let f = fixture().await;
        let review = f
            .service
            .create(Uuid::new_v4(), review_req(f.movie.id, 7))
            .await
            .unwrap();
        let commenter = user(UserRole::User);

        let root = f
            .service
            .add_comment(commenter.user_id, comment_req(review.id, None))
            .await
            .unwrap();
        f.service
            .add_comment(Uuid::new_v4(), comment_req(review.id, Some(root.id)))
            .await
            .unwrap();

        let detail = f.service.detail(review.id).await.unwrap();
        assert_eq!(detail.review.comments_count, 2);
        assert_eq!(detail.comments.len(), 1);
        assert_eq!(detail.comments[0].replies.len(), 1);

        let err = f
            .service
            .remove_comment(root.id, &user(UserRole::User))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Forbidden(_)));

        f.service.remove_comment(root.id, &commenter).await.unwrap();
        let detail = f.service.detail(review.id).await.unwrap();
        assert_eq!(detail.review.comments_count, 1);
        assert_eq!(detail.comments[0].comment.comment_text, REMOVED_COMMENT_TEXT);
        assert_eq!(detail.comments[0].replies.len(), 1);

        let err = f
            .service
            .remove_comment(root.id, &commenter)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "comment not found");
    }

    #[tokio::test]
    async fn test_reply_parent_must_share_review() {
        let f = fixture().await;
        let first = f
            .service
            .create(Uuid::new_v4(), review_req(f.movie.id, 7))
            .await
            .unwrap();
        let second = f
            .service
            .create(Uuid::new_v4(), review_req(f.movie.id, 6))
            .await
            .unwrap();
        let comment = f
            .service
            .add_comment(Uuid::new_v4(), comment_req(first.id, None))
            .await
            .unwrap();

        let err = f
            .service
            .add_comment(Uuid::new_v4(), comment_req(second.id, Some(comment.id)))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "parent comment belongs to a different review"
        );

        let err = f
            .service
            .add_comment(Uuid::new_v4(), comment_req(second.id, Some(Uuid::new_v4())))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "parent comment not found");
    }

    #[tokio::test]
    async fn test_reply_depth_is_capped() {
        let f = fixture().await;
        let review = f
            .service
            .create(Uuid::new_v4(), review_req(f.movie.id, 7))
            .await
            .unwrap();

        let mut parent = None;
        for _ in 0..MAX_COMMENT_DEPTH {
            let comment = f
                .service
                .add_comment(Uuid::new_v4(), comment_req(review.id, parent))
                .await
                .unwrap();
            parent = Some(comment.id);
        }

        let err = f
            .service
            .add_comment(Uuid::new_v4(), comment_req(review.id, parent))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));

        let detail = f.service.detail(review.id).await.unwrap();
        assert_eq!(detail.review.comments_count, MAX_COMMENT_DEPTH as i32);
        assert_eq!(detail.comments.len(), 1);
    }

    #[test]
    fn test_comment_length_limits() {
        let mut req = comment_req(Uuid::new_v4(), None);
        req.comment_text = "x".repeat(1000);
        assert!(req.validate().is_ok());
        req.comment_text = "x".repeat(1001);
        assert!(req.validate().is_err());
        req.comment_text = String::new();
        assert!(req.validate().is_err());

        let mut review = review_req(Uuid::new_v4(), 7);
        review.review_text = "x".repeat(9);
        assert!(review.validate().is_err());
        review.review_text = "x".repeat(20_000);
        assert!(review.validate().is_ok());
    }

    #[tokio::test]
    async fn test_list_for_movie_pages_published_reviews() {
        let f = fixture().await;
        for rating in 1..=3 {
            f.service
                .create(Uuid::new_v4(), review_req(f.movie.id, rating))
                .await
                .unwrap();
        }

        let list = f
            .service
            .list_for_movie(
                f.movie.id,
                PageQuery {
                    page: Some(1),
                    page_size: Some(2),
                },
            )
            .await
            .unwrap();
        assert_eq!(list.total, 3);
        assert_eq!(list.reviews.len(), 2);

        let capped = f
            .service
            .list_for_movie(
                f.movie.id,
                PageQuery {
                    page: None,
                    page_size: Some(MAX_REVIEW_PAGE_SIZE + 1),
                },
            )
            .await
            .unwrap();
        assert_eq!(capped.page_size, DEFAULT_PAGE_SIZE);
    }
}
