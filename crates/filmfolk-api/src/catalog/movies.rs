//! Movie catalog service
//!
//! Users submit movies, moderators approve or reject them, admins delete
//! them. Only approved movies appear in public listings.

use std::sync::Arc;

use chrono::Utc;
use filmfolk_core::{MovieStatus, Page};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::models::{Movie, MovieDraft, MovieFilter, MovieList, MovieSort, MovieUpdate};
use super::repository::{MovieRepository, ReviewRepository};
use super::{CatalogError, CatalogResult, DEFAULT_PAGE_SIZE, MAX_MOVIE_PAGE_SIZE};
use crate::auth::middleware::AuthenticatedUser;
use crate::store::Repositories;

/// Movie submission
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateMovieRequest {
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 characters"))]
    pub title: String,
    #[validate(range(min = 1888, max = 2100, message = "release_year must be between 1888 and 2100"))]
    pub release_year: i32,
    #[serde(default)]
    pub genres: Vec<String>,
    #[validate(length(max = 5000, message = "summary must be at most 5000 characters"))]
    pub summary: Option<String>,
    #[validate(url(message = "poster_url must be a valid URL"))]
    pub poster_url: Option<String>,
    #[validate(url(message = "backdrop_url must be a valid URL"))]
    pub backdrop_url: Option<String>,
    #[validate(range(min = 1, max = 1000, message = "runtime_minutes must be between 1 and 1000"))]
    pub runtime_minutes: Option<i32>,
    #[validate(length(max = 10, message = "language must be at most 10 characters"))]
    pub language: Option<String>,
    pub tmdb_id: Option<i32>,
    #[validate(length(max = 20, message = "imdb_id must be at most 20 characters"))]
    pub imdb_id: Option<String>,
}

impl From<CreateMovieRequest> for MovieDraft {
    fn from(req: CreateMovieRequest) -> Self {
        MovieDraft {
            title: req.title.trim().to_string(),
            release_year: req.release_year,
            genres: normalize_genres(req.genres),
            summary: req.summary,
            poster_url: req.poster_url,
            backdrop_url: req.backdrop_url,
            runtime_minutes: req.runtime_minutes,
            language: req.language,
            tmdb_id: req.tmdb_id,
            imdb_id: req.imdb_id,
        }
    }
}

/// Partial movie edit (moderators)
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpdateMovieRequest {
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 characters"))]
    pub title: Option<String>,
    #[validate(range(min = 1888, max = 2100, message = "release_year must be between 1888 and 2100"))]
    pub release_year: Option<i32>,
    pub genres: Option<Vec<String>>,
    #[validate(length(max = 5000, message = "summary must be at most 5000 characters"))]
    pub summary: Option<String>,
    #[validate(url(message = "poster_url must be a valid URL"))]
    pub poster_url: Option<String>,
    #[validate(url(message = "backdrop_url must be a valid URL"))]
    pub backdrop_url: Option<String>,
    #[validate(range(min = 1, max = 1000, message = "runtime_minutes must be between 1 and 1000"))]
    pub runtime_minutes: Option<i32>,
    #[validate(length(max = 10, message = "language must be at most 10 characters"))]
    pub language: Option<String>,
}

impl From<UpdateMovieRequest> for MovieUpdate {
    fn from(req: UpdateMovieRequest) -> Self {
        MovieUpdate {
            title: req.title.map(|t| t.trim().to_string()),
            release_year: req.release_year,
            genres: req.genres.map(normalize_genres),
            summary: req.summary,
            poster_url: req.poster_url,
            backdrop_url: req.backdrop_url,
            runtime_minutes: req.runtime_minutes,
            language: req.language,
        }
    }
}

/// Listing query string
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MovieQuery {
    pub genre: Option<String>,
    pub year: Option<i32>,
    /// Case-insensitive title substring
    pub search: Option<String>,
    /// `title` (default), `rating`, `year` or `reviews`
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl MovieQuery {
    fn into_filter(self, status: MovieStatus) -> MovieFilter {
        MovieFilter {
            status,
            genre: self.genre.filter(|g| !g.trim().is_empty()),
            year: self.year,
            search: self.search.filter(|s| !s.trim().is_empty()),
            sort: self
                .sort
                .as_deref()
                .map(|s| s.parse::<MovieSort>().unwrap_or_default())
                .unwrap_or(MovieSort::Title),
            page: Page::new(
                self.page,
                self.page_size,
                DEFAULT_PAGE_SIZE,
                MAX_MOVIE_PAGE_SIZE,
            ),
        }
    }
}

fn normalize_genres(genres: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(genres.len());
    for genre in genres {
        let genre = genre.trim().to_string();
        if !genre.is_empty() && !out.iter().any(|g| g.eq_ignore_ascii_case(&genre)) {
            out.push(genre);
        }
    }
    out
}

/// Movie catalog service
#[derive(Clone)]
pub struct MovieService {
    movies: Arc<dyn MovieRepository>,
    reviews: Arc<dyn ReviewRepository>,
}

impl MovieService {
    pub fn new(repos: &Repositories) -> Self {
        Self {
            movies: repos.movies.clone(),
            reviews: repos.reviews.clone(),
        }
    }

    /// Approved movies matching the query
    pub async fn list_public(&self, query: MovieQuery) -> CatalogResult<MovieList> {
        self.list(query.into_filter(MovieStatus::Approved)).await
    }

    /// Submissions awaiting a moderator, oldest title order
    pub async fn list_pending(&self, query: MovieQuery) -> CatalogResult<MovieList> {
        self.list(query.into_filter(MovieStatus::PendingApproval))
            .await
    }

    async fn list(&self, filter: MovieFilter) -> CatalogResult<MovieList> {
        let (movies, total) = self.movies.list(&filter).await?;
        Ok(MovieList {
            movies,
            total,
            page: filter.page.page,
            page_size: filter.page.page_size,
        })
    }

    /// A single movie as seen by `viewer`
    ///
    /// Unapproved movies are only visible to their submitter and to
    /// moderators.
    pub async fn get(&self, id: Uuid, viewer: Option<&AuthenticatedUser>) -> CatalogResult<Movie> {
        let movie = self.find(id).await?;
        if movie.status == MovieStatus::Approved {
            return Ok(movie);
        }

        let visible = viewer.is_some_and(|v| v.is_moderator() || movie.submitted_by == Some(v.user_id));
        if visible {
            Ok(movie)
        } else {
            Err(CatalogError::not_found("movie"))
        }
    }

    pub async fn create(&self, draft: MovieDraft, submitted_by: Uuid) -> CatalogResult<Movie> {
        let movie = Movie::submitted(draft, submitted_by);
        let movie = self.movies.create(movie).await.map_err(|err| {
            if err.is_conflict_on("tmdb") {
                CatalogError::Conflict("movie with this TMDB id already exists".to_string())
            } else {
                CatalogError::Repository(err)
            }
        })?;
        debug!(movie_id = %movie.id, "movie submitted");
        Ok(movie)
    }

    pub async fn update(&self, id: Uuid, update: MovieUpdate) -> CatalogResult<Movie> {
        let mut movie = self.find(id).await?;
        update.apply(&mut movie);
        self.save(movie).await
    }

    pub async fn approve(&self, id: Uuid, moderator: Uuid) -> CatalogResult<Movie> {
        let mut movie = self.find(id).await?;
        if movie.status == MovieStatus::Approved {
            return Err(CatalogError::Validation(
                "movie is already approved".to_string(),
            ));
        }
        movie.status = MovieStatus::Approved;
        movie.approved_by = Some(moderator);
        movie.updated_at = Utc::now();
        self.save(movie).await
    }

    pub async fn reject(&self, id: Uuid) -> CatalogResult<Movie> {
        let mut movie = self.find(id).await?;
        if movie.status == MovieStatus::Rejected {
            return Err(CatalogError::Validation(
                "movie is already rejected".to_string(),
            ));
        }
        movie.status = MovieStatus::Rejected;
        movie.approved_by = None;
        movie.updated_at = Utc::now();
        self.save(movie).await
    }

    pub async fn delete(&self, id: Uuid) -> CatalogResult<()> {
        if self.movies.delete(id).await? {
            Ok(())
        } else {
            Err(CatalogError::not_found("movie"))
        }
    }

    /// Recompute average rating and review count from published reviews
    pub async fn recalculate_stats(&self, movie_id: Uuid) -> CatalogResult<()> {
        let (average, count) = self.reviews.rating_stats(movie_id).await?;
        self.movies.update_stats(movie_id, average, count).await?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> CatalogResult<Movie> {
        self.movies
            .find_by_id(id)
            .await?
            .ok_or_else(|| CatalogError::not_found("movie"))
    }

    async fn save(&self, movie: Movie) -> CatalogResult<Movie> {
        self.movies
            .save(movie)
            .await?
            .ok_or_else(|| CatalogError::not_found("movie"))
    }
}
