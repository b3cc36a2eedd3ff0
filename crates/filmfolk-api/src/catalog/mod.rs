//! Resource services: movies, reviews, follows and profiles
//!
//! Thin rules over the repositories. Services read the caller's identity
//! as attached by the auth middleware and never touch tokens themselves.

pub mod followers;
pub mod models;
pub mod movies;
pub mod profiles;
pub mod repository;
pub mod reviews;

pub use followers::FollowerService;
pub use movies::MovieService;
pub use profiles::ProfileService;
pub use reviews::ReviewService;

use thiserror::Error;

use crate::auth::repository::RepositoryError;

/// Default and maximum page sizes for list endpoints
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_MOVIE_PAGE_SIZE: u32 = 100;
pub const MAX_REVIEW_PAGE_SIZE: u32 = 50;
pub const MAX_USER_PAGE_SIZE: u32 = 100;

/// Resource service errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl CatalogError {
    pub(crate) fn not_found(what: &str) -> Self {
        CatalogError::NotFound(format!("{what} not found"))
    }
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
