//! Storage backends
//!
//! Services receive repository trait objects through [`Repositories`];
//! nothing in the crate reaches for a global connection.

pub mod postgres;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::repository::{AccountRepository, RefreshTokenRepository, RepositoryError};
use crate::catalog::repository::{FollowRepository, MovieRepository, ReviewRepository};

/// Connectivity probe used by the health endpoints
#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Every repository the services need
#[derive(Clone)]
pub struct Repositories {
    pub accounts: Arc<dyn AccountRepository>,
    pub refresh_tokens: Arc<dyn RefreshTokenRepository>,
    pub movies: Arc<dyn MovieRepository>,
    pub reviews: Arc<dyn ReviewRepository>,
    pub follows: Arc<dyn FollowRepository>,
    pub health: Arc<dyn StoreHealth>,
}

impl Repositories {
    /// Repositories backed by one PostgreSQL pool
    pub fn postgres(pool: PgPool) -> Self {
        let store = Arc::new(postgres::PgStore::new(pool));
        Self {
            accounts: store.clone(),
            refresh_tokens: store.clone(),
            movies: store.clone(),
            reviews: store.clone(),
            follows: store.clone(),
            health: store,
        }
    }

    /// Repositories backed by a fresh in-memory store
    #[cfg(any(test, feature = "test-utils"))]
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryStore::new());
        Self {
            accounts: store.clone(),
            refresh_tokens: store.clone(),
            movies: store.clone(),
            reviews: store.clone(),
            follows: store.clone(),
            health: store,
        }
    }
}
