//! Catalog data models: movies, reviews, comments and follow edges

use chrono::{DateTime, Utc};
use filmfolk_core::{MovieStatus, Page, ReviewStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::models::AccountPublic;

// ============================================================================
// Movies
// ============================================================================

/// Movie record
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Movie {
    pub id: Uuid,
    pub title: String,
    pub release_year: i32,
    pub genres: Vec<String>,
    pub summary: Option<String>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub runtime_minutes: Option<i32>,
    pub language: Option<String>,
    pub tmdb_id: Option<i32>,
    pub imdb_id: Option<String>,
    #[schema(value_type = String, example = "approved")]
    pub status: MovieStatus,
    pub submitted_by: Option<Uuid>,
    pub approved_by: Option<Uuid>,
    /// Mean rating over published reviews
    pub average_rating: Option<f64>,
    pub total_reviews: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields a user supplies when submitting a movie
#[derive(Debug, Clone, Default)]
pub struct MovieDraft {
    pub title: String,
    pub release_year: i32,
    pub genres: Vec<String>,
    pub summary: Option<String>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub runtime_minutes: Option<i32>,
    pub language: Option<String>,
    pub tmdb_id: Option<i32>,
    pub imdb_id: Option<String>,
}

impl Movie {
    /// A new submission awaiting moderator approval
    pub fn submitted(draft: MovieDraft, submitted_by: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: draft.title,
            release_year: draft.release_year,
            genres: draft.genres,
            summary: draft.summary,
            poster_url: draft.poster_url,
            backdrop_url: draft.backdrop_url,
            runtime_minutes: draft.runtime_minutes,
            language: draft.language,
            tmdb_id: draft.tmdb_id,
            imdb_id: draft.imdb_id,
            status: MovieStatus::PendingApproval,
            submitted_by: Some(submitted_by),
            approved_by: None,
            average_rating: None,
            total_reviews: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial movie update; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct MovieUpdate {
    pub title: Option<String>,
    pub release_year: Option<i32>,
    pub genres: Option<Vec<String>>,
    pub summary: Option<String>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub runtime_minutes: Option<i32>,
    pub language: Option<String>,
}

impl MovieUpdate {
    pub fn apply(self, movie: &mut Movie) {
        if let Some(title) = self.title {
            movie.title = title;
        }
        if let Some(year) = self.release_year {
            movie.release_year = year;
        }
        if let Some(genres) = self.genres {
            movie.genres = genres;
        }
        if let Some(summary) = self.summary {
            movie.summary = Some(summary);
        }
        if let Some(url) = self.poster_url {
            movie.poster_url = Some(url);
        }
        if let Some(url) = self.backdrop_url {
            movie.backdrop_url = Some(url);
        }
        if let Some(runtime) = self.runtime_minutes {
            movie.runtime_minutes = Some(runtime);
        }
        if let Some(language) = self.language {
            movie.language = Some(language);
        }
        movie.updated_at = Utc::now();
    }
}

/// Sort order for movie listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MovieSort {
    #[default]
    Title,
    Rating,
    Year,
    Reviews,
}

impl FromStr for MovieSort {
    type Err = std::convert::Infallible;

    /// Unknown values fall back to title order
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "rating" => MovieSort::Rating,
            "year" => MovieSort::Year,
            "reviews" => MovieSort::Reviews,
            _ => MovieSort::Title,
        })
    }
}

/// Listing filter
#[derive(Debug, Clone)]
pub struct MovieFilter {
    pub status: MovieStatus,
    pub genre: Option<String>,
    pub year: Option<i32>,
    /// Case-insensitive title substring
    pub search: Option<String>,
    pub sort: MovieSort,
    pub page: Page,
}

impl MovieFilter {
    /// Whether a movie passes every filter except paging
    pub fn matches(&self, movie: &Movie) -> bool {
        if movie.status != self.status {
            return false;
        }
        if let Some(genre) = &self.genre {
            if !movie.genres.iter().any(|g| g.eq_ignore_ascii_case(genre)) {
                return false;
            }
        }
        if let Some(year) = self.year {
            if movie.release_year != year {
                return false;
            }
        }
        if let Some(search) = &self.search {
            if !movie.title.to_lowercase().contains(&search.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

/// Page of movies
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MovieList {
    pub movies: Vec<Movie>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

// ============================================================================
// Reviews and comments
// ============================================================================

/// Review of a movie; one per author and movie
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub movie_id: Uuid,
    /// 1..=10
    pub rating: i32,
    pub review_text: String,
    pub sentiment: Option<String>,
    #[schema(value_type = String, example = "published")]
    pub status: ReviewStatus,
    pub is_thread_locked: bool,
    pub likes_count: i32,
    pub comments_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    pub fn new(user_id: Uuid, movie_id: Uuid, rating: i32, review_text: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            movie_id,
            rating,
            review_text,
            sentiment: None,
            status: ReviewStatus::Published,
            is_thread_locked: false,
            likes_count: 0,
            comments_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Comment in a review thread
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReviewComment {
    pub id: Uuid,
    pub review_id: Uuid,
    pub user_id: Uuid,
    pub parent_comment_id: Option<Uuid>,
    pub comment_text: String,
    pub is_removed: bool,
    pub removed_by: Option<Uuid>,
    pub likes_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Placeholder shown instead of the text of a removed comment
pub const REMOVED_COMMENT_TEXT: &str = "[removed]";

impl ReviewComment {
    pub fn new(
        review_id: Uuid,
        user_id: Uuid,
        parent_comment_id: Option<Uuid>,
        comment_text: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            review_id,
            user_id,
            parent_comment_id,
            comment_text,
            is_removed: false,
            removed_by: None,
            likes_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A comment with its replies
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: ReviewComment,
    pub replies: Vec<CommentNode>,
}

/// Review with its comment tree
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReviewDetail {
    #[serde(flatten)]
    pub review: Review,
    pub comments: Vec<CommentNode>,
}

/// Arrange a flat comment list into threads
///
/// Input order is preserved among siblings. Comments whose parent is not in
/// the list are treated as top-level. Removed comments keep their place in
/// the tree but lose their text.
pub fn build_comment_tree(comments: Vec<ReviewComment>) -> Vec<CommentNode> {
    let ids: std::collections::HashSet<Uuid> = comments.iter().map(|c| c.id).collect();
    let mut children: HashMap<Option<Uuid>, Vec<ReviewComment>> = HashMap::new();

    for mut comment in comments {
        if comment.is_removed {
            comment.comment_text = REMOVED_COMMENT_TEXT.to_string();
        }
        let parent = comment.parent_comment_id.filter(|p| ids.contains(p));
        children.entry(parent).or_default().push(comment);
    }

    fn attach(
        parent: Option<Uuid>,
        children: &mut HashMap<Option<Uuid>, Vec<ReviewComment>>,
    ) -> Vec<CommentNode> {
        children
            .remove(&parent)
            .unwrap_or_default()
            .into_iter()
            .map(|comment| {
                let replies = attach(Some(comment.id), children);
                CommentNode { comment, replies }
            })
            .collect()
    }

    attach(None, &mut children)
}

/// Page of reviews
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReviewList {
    pub reviews: Vec<Review>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

// ============================================================================
// Follows
// ============================================================================

/// Directed follow edge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follow {
    pub id: Uuid,
    pub follower_id: Uuid,
    pub following_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Follow {
    pub fn new(follower_id: Uuid, following_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            follower_id,
            following_id,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FollowStats {
    pub followers_count: u64,
    pub following_count: u64,
}

/// Page of public profiles
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AccountList {
    pub users: Vec<AccountPublic>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(review: Uuid, parent: Option<Uuid>, text: &str) -> ReviewComment {
        ReviewComment::new(review, Uuid::new_v4(), parent, text.to_string())
    }

    #[test]
    fn test_comment_tree_nesting() {
        let review = Uuid::new_v4();
        let root = comment(review, None, "root");
        let reply = comment(review, Some(root.id), "reply");
        let nested = comment(review, Some(reply.id), "nested");
        let other = comment(review, None, "other");

        let tree = build_comment_tree(vec![root.clone(), reply.clone(), nested, other]);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].comment.id, root.id);
        assert_eq!(tree[0].replies.len(), 1);
        assert_eq!(tree[0].replies[0].comment.id, reply.id);
        assert_eq!(tree[0].replies[0].replies.len(), 1);
        assert!(tree[1].replies.is_empty());
    }

    #[test]
    fn test_removed_comment_text_hidden() {
        let review = Uuid::new_v4();
        let mut root = comment(review, None, "offensive");
        root.is_removed = true;
        let reply = comment(review, Some(root.id), "reply");

        let tree = build_comment_tree(vec![root, reply]);
        assert_eq!(tree[0].comment.comment_text, REMOVED_COMMENT_TEXT);
        assert_eq!(tree[0].replies[0].comment.comment_text, "reply");
    }

    #[test]
    fn test_orphan_comment_is_top_level() {
        let review = Uuid::new_v4();
        let orphan = comment(review, Some(Uuid::new_v4()), "orphan");
        let tree = build_comment_tree(vec![orphan]);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_movie_filter() {
        let mut movie = Movie::submitted(
            MovieDraft {
                title: "The Matrix".to_string(),
                release_year: 1999,
                genres: vec!["Action".to_string(), "Sci-Fi".to_string()],
                ..Default::default()
            },
            Uuid::new_v4(),
        );
        movie.status = MovieStatus::Approved;

        let mut filter = MovieFilter {
            status: MovieStatus::Approved,
            genre: Some("sci-fi".to_string()),
            year: Some(1999),
            search: Some("matrix".to_string()),
            sort: MovieSort::Title,
            page: Page::new(None, None, 20, 100),
        };
        assert!(filter.matches(&movie));

        filter.year = Some(2003);
        assert!(!filter.matches(&movie));

        filter.year = None;
        filter.status = MovieStatus::PendingApproval;
        assert!(!filter.matches(&movie));
    }

    #[test]
    fn test_movie_update_is_partial() {
        let mut movie = Movie::submitted(
            MovieDraft {
                title: "Heat".to_string(),
                release_year: 1995,
                summary: Some("A heist".to_string()),
                ..Default::default()
            },
            Uuid::new_v4(),
        );
        MovieUpdate {
            runtime_minutes: Some(170),
            ..Default::default()
        }
        .apply(&mut movie);

        assert_eq!(movie.title, "Heat");
        assert_eq!(movie.summary.as_deref(), Some("A heist"));
        assert_eq!(movie.runtime_minutes, Some(170));
    }

    #[test]
    fn test_sort_parsing_falls_back_to_title() {
        assert_eq!("rating".parse::<MovieSort>().unwrap(), MovieSort::Rating);
        assert_eq!("bogus".parse::<MovieSort>().unwrap(), MovieSort::Title);
    }
}
