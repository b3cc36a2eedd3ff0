//! PostgreSQL store
//!
//! Implements every repository trait over a shared `PgPool`. Enumerations
//! are stored as text and parsed back through their `FromStr` impls; a
//! value the enum does not know is reported as invalid data.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use filmfolk_core::{AccountStatus, AuthProvider, Page, ReviewStatus, UserRole};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
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

const UNIQUE_VIOLATION: &str = "23505";

/// Store backed by PostgreSQL
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return RepositoryError::Conflict(db.constraint().unwrap_or("unique").to_string());
        }
    }
    RepositoryError::DatabaseError(err.to_string())
}

fn parse_column<T>(value: &str) -> Result<T, RepositoryError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| RepositoryError::InvalidData(e.to_string()))
}

fn page_bounds(page: Page) -> (i64, i64) {
    (page.limit() as i64, page.offset() as i64)
}

/// Escape LIKE wildcards and wrap for a substring match
fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[async_trait]
impl StoreHealth for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(db_error)
    }
}

// ============================================================================
// Accounts
// ============================================================================

const ACCOUNT_COLUMNS: &str = "id, username, email, password_hash, auth_provider, provider_id, \
     status, role, avatar_url, bio, created_at, updated_at, last_login_at";

#[derive(FromRow)]
struct AccountRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: Option<String>,
    auth_provider: String,
    provider_id: Option<String>,
    status: String,
    role: String,
    avatar_url: Option<String>,
    bio: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
}

impl TryFrom<AccountRow> for Account {
    type Error = RepositoryError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Account {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            auth_provider: parse_column(&row.auth_provider)?,
            provider_id: row.provider_id,
            status: parse_column(&row.status)?,
            role: parse_column(&row.role)?,
            avatar_url: row.avatar_url,
            bio: row.bio,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_login_at: row.last_login_at,
        })
    }
}

fn into_accounts(rows: Vec<AccountRow>) -> Result<Vec<Account>, RepositoryError> {
    rows.into_iter().map(Account::try_from).collect()
}

impl PgStore {
    async fn account_where(
        &self,
        clause: &str,
        value: &str,
    ) -> Result<Option<Account>, RepositoryError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE {clause} = $1");
        sqlx::query_as::<_, AccountRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .map(Account::try_from)
            .transpose()
    }
}

#[async_trait]
impl AccountRepository for PgStore {
    async fn create(&self, account: Account) -> Result<Account, RepositoryError> {
        account
            .check_credentials()
            .map_err(RepositoryError::InvalidData)?;

        let sql = format!(
            "INSERT INTO accounts ({ACCOUNT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {ACCOUNT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(account.id)
            .bind(&account.username)
            .bind(&account.email)
            .bind(&account.password_hash)
            .bind(account.auth_provider.as_str())
            .bind(&account.provider_id)
            .bind(account.status.as_str())
            .bind(account.role.as_str())
            .bind(&account.avatar_url)
            .bind(&account.bio)
            .bind(account.created_at)
            .bind(account.updated_at)
            .bind(account.last_login_at)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Account::try_from(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, RepositoryError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        sqlx::query_as::<_, AccountRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .map(Account::try_from)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, RepositoryError> {
        self.account_where("email", email).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, RepositoryError> {
        self.account_where("username", username).await
    }

    async fn find_by_provider(
        &self,
        provider: AuthProvider,
        provider_id: &str,
    ) -> Result<Option<Account>, RepositoryError> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE auth_provider = $1 AND provider_id = $2"
        );
        sqlx::query_as::<_, AccountRow>(&sql)
            .bind(provider.as_str())
            .bind(provider_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .map(Account::try_from)
            .transpose()
    }

    async fn update_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE accounts SET last_login_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<Account>, RepositoryError> {
        let sql = format!(
            "UPDATE accounts SET bio = COALESCE($2, bio), avatar_url = COALESCE($3, avatar_url), \
             updated_at = NOW() WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}"
        );
        sqlx::query_as::<_, AccountRow>(&sql)
            .bind(id)
            .bind(update.bio)
            .bind(update.avatar_url)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .map(Account::try_from)
            .transpose()
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: AccountStatus,
    ) -> Result<Option<Account>, RepositoryError> {
        let sql = format!(
            "UPDATE accounts SET status = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {ACCOUNT_COLUMNS}"
        );
        sqlx::query_as::<_, AccountRow>(&sql)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .map(Account::try_from)
            .transpose()
    }

    async fn update_role(
        &self,
        id: Uuid,
        role: UserRole,
    ) -> Result<Option<Account>, RepositoryError> {
        let sql = format!(
            "UPDATE accounts SET role = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {ACCOUNT_COLUMNS}"
        );
        sqlx::query_as::<_, AccountRow>(&sql)
            .bind(id)
            .bind(role.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .map(Account::try_from)
            .transpose()
    }
}

// ============================================================================
// Refresh-token ledger
// ============================================================================

#[derive(FromRow)]
struct RefreshTokenRow {
    id: Uuid,
    account_id: Uuid,
    token: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

impl From<RefreshTokenRow> for RefreshToken {
    fn from(row: RefreshTokenRow) -> Self {
        RefreshToken {
            id: row.id,
            account_id: row.account_id,
            token: row.token,
            expires_at: row.expires_at,
            created_at: row.created_at,
            revoked_at: row.revoked_at,
        }
    }
}

#[async_trait]
impl RefreshTokenRepository for PgStore {
    async fn insert(&self, token: RefreshToken) -> Result<RefreshToken, RepositoryError> {
        sqlx::query(
            "INSERT INTO refresh_tokens (id, account_id, token, expires_at, created_at, revoked_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(token.id)
        .bind(token.account_id)
        .bind(&token.token)
        .bind(token.expires_at)
        .bind(token.created_at)
        .bind(token.revoked_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(token)
    }

    async fn find(
        &self,
        token: &str,
        account_id: Uuid,
    ) -> Result<Option<RefreshToken>, RepositoryError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            "SELECT id, account_id, token, expires_at, created_at, revoked_at \
             FROM refresh_tokens WHERE token = $1 AND account_id = $2",
        )
        .bind(token)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map(RefreshToken::from))
    }

    async fn revoke(&self, token: &str, at: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = $2 WHERE token = $1 AND revoked_at IS NULL",
        )
        .bind(token)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(result.rows_affected())
    }

    async fn revoke_all_for_account(
        &self,
        account_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = $2 \
             WHERE account_id = $1 AND revoked_at IS NULL",
        )
        .bind(account_id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(result.rows_affected())
    }
}

// ============================================================================
// Movies
// ============================================================================

const MOVIE_COLUMNS: &str = "id, title, release_year, genres, summary, poster_url, backdrop_url, \
     runtime_minutes, language, tmdb_id, imdb_id, status, submitted_by, approved_by, \
     average_rating, total_reviews, created_at, updated_at";

#[derive(FromRow)]
struct MovieRow {
    id: Uuid,
    title: String,
    release_year: i32,
    genres: Vec<String>,
    summary: Option<String>,
    poster_url: Option<String>,
    backdrop_url: Option<String>,
    runtime_minutes: Option<i32>,
    language: Option<String>,
    tmdb_id: Option<i32>,
    imdb_id: Option<String>,
    status: String,
    submitted_by: Option<Uuid>,
    approved_by: Option<Uuid>,
    average_rating: Option<f64>,
    total_reviews: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MovieRow> for Movie {
    type Error = RepositoryError;

    fn try_from(row: MovieRow) -> Result<Self, Self::Error> {
        Ok(Movie {
            id: row.id,
            title: row.title,
            release_year: row.release_year,
            genres: row.genres,
            summary: row.summary,
            poster_url: row.poster_url,
            backdrop_url: row.backdrop_url,
            runtime_minutes: row.runtime_minutes,
            language: row.language,
            tmdb_id: row.tmdb_id,
            imdb_id: row.imdb_id,
            status: parse_column(&row.status)?,
            submitted_by: row.submitted_by,
            approved_by: row.approved_by,
            average_rating: row.average_rating,
            total_reviews: row.total_reviews,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn push_movie_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &MovieFilter) {
    qb.push(" WHERE status = ");
    qb.push_bind(filter.status.as_str().to_string());
    if let Some(genre) = &filter.genre {
        qb.push(" AND EXISTS (SELECT 1 FROM unnest(genres) g WHERE lower(g) = lower(");
        qb.push_bind(genre.clone());
        qb.push("))");
    }
    if let Some(year) = filter.year {
        qb.push(" AND release_year = ");
        qb.push_bind(year);
    }
    if let Some(search) = &filter.search {
        qb.push(" AND title ILIKE ");
        qb.push_bind(like_pattern(search));
    }
}

#[async_trait]
impl MovieRepository for PgStore {
    async fn create(&self, movie: Movie) -> Result<Movie, RepositoryError> {
        let sql = format!(
            "INSERT INTO movies ({MOVIE_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
             RETURNING {MOVIE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, MovieRow>(&sql)
            .bind(movie.id)
            .bind(&movie.title)
            .bind(movie.release_year)
            .bind(&movie.genres)
            .bind(&movie.summary)
            .bind(&movie.poster_url)
            .bind(&movie.backdrop_url)
            .bind(movie.runtime_minutes)
            .bind(&movie.language)
            .bind(movie.tmdb_id)
            .bind(&movie.imdb_id)
            .bind(movie.status.as_str())
            .bind(movie.submitted_by)
            .bind(movie.approved_by)
            .bind(movie.average_rating)
            .bind(movie.total_reviews)
            .bind(movie.created_at)
            .bind(movie.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Movie::try_from(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Movie>, RepositoryError> {
        let sql = format!("SELECT {MOVIE_COLUMNS} FROM movies WHERE id = $1");
        sqlx::query_as::<_, MovieRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .map(Movie::try_from)
            .transpose()
    }

    async fn list(&self, filter: &MovieFilter) -> Result<(Vec<Movie>, u64), RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM movies");
        push_movie_filters(&mut count, filter);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;

        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {MOVIE_COLUMNS} FROM movies"));
        push_movie_filters(&mut query, filter);
        query.push(match filter.sort {
            MovieSort::Title => " ORDER BY title ASC",
            MovieSort::Rating => " ORDER BY average_rating DESC NULLS LAST",
            MovieSort::Year => " ORDER BY release_year DESC",
            MovieSort::Reviews => " ORDER BY total_reviews DESC",
        });
        let (limit, offset) = page_bounds(filter.page);
        query.push(" LIMIT ");
        query.push_bind(limit);
        query.push(" OFFSET ");
        query.push_bind(offset);

        let rows = query
            .build_query_as::<MovieRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        let movies = rows
            .into_iter()
            .map(Movie::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((movies, total.max(0) as u64))
    }

    async fn save(&self, movie: Movie) -> Result<Option<Movie>, RepositoryError> {
        let sql = format!(
            "UPDATE movies SET title = $2, release_year = $3, genres = $4, summary = $5, \
             poster_url = $6, backdrop_url = $7, runtime_minutes = $8, language = $9, \
             status = $10, approved_by = $11, updated_at = $12 \
             WHERE id = $1 RETURNING {MOVIE_COLUMNS}"
        );
        sqlx::query_as::<_, MovieRow>(&sql)
            .bind(movie.id)
            .bind(&movie.title)
            .bind(movie.release_year)
            .bind(&movie.genres)
            .bind(&movie.summary)
            .bind(&movie.poster_url)
            .bind(&movie.backdrop_url)
            .bind(movie.runtime_minutes)
            .bind(&movie.language)
            .bind(movie.status.as_str())
            .bind(movie.approved_by)
            .bind(movie.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .map(Movie::try_from)
            .transpose()
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM movies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_stats(
        &self,
        id: Uuid,
        average_rating: Option<f64>,
        total_reviews: i64,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE movies SET average_rating = $2, total_reviews = $3 WHERE id = $1")
            .bind(id)
            .bind(average_rating)
            .bind(i32::try_from(total_reviews).unwrap_or(i32::MAX))
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }
}

// ============================================================================
// Reviews
// ============================================================================

const REVIEW_COLUMNS: &str = "id, user_id, movie_id, rating, review_text, sentiment, status, \
     is_thread_locked, likes_count, comments_count, created_at, updated_at";

const COMMENT_COLUMNS: &str = "id, review_id, user_id, parent_comment_id, comment_text, \
     is_removed, removed_by, likes_count, created_at, updated_at";

#[derive(FromRow)]
struct ReviewRow {
    id: Uuid,
    user_id: Uuid,
    movie_id: Uuid,
    rating: i32,
    review_text: String,
    sentiment: Option<String>,
    status: String,
    is_thread_locked: bool,
    likes_count: i32,
    comments_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = RepositoryError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        Ok(Review {
            id: row.id,
            user_id: row.user_id,
            movie_id: row.movie_id,
            rating: row.rating,
            review_text: row.review_text,
            sentiment: row.sentiment,
            status: parse_column(&row.status)?,
            is_thread_locked: row.is_thread_locked,
            likes_count: row.likes_count,
            comments_count: row.comments_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct CommentRow {
    id: Uuid,
    review_id: Uuid,
    user_id: Uuid,
    parent_comment_id: Option<Uuid>,
    comment_text: String,
    is_removed: bool,
    removed_by: Option<Uuid>,
    likes_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CommentRow> for ReviewComment {
    fn from(row: CommentRow) -> Self {
        ReviewComment {
            id: row.id,
            review_id: row.review_id,
            user_id: row.user_id,
            parent_comment_id: row.parent_comment_id,
            comment_text: row.comment_text,
            is_removed: row.is_removed,
            removed_by: row.removed_by,
            likes_count: row.likes_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl ReviewRepository for PgStore {
    async fn create(&self, review: Review) -> Result<Review, RepositoryError> {
        let sql = format!(
            "INSERT INTO reviews ({REVIEW_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING {REVIEW_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(review.id)
            .bind(review.user_id)
            .bind(review.movie_id)
            .bind(review.rating)
            .bind(&review.review_text)
            .bind(&review.sentiment)
            .bind(review.status.as_str())
            .bind(review.is_thread_locked)
            .bind(review.likes_count)
            .bind(review.comments_count)
            .bind(review.created_at)
            .bind(review.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Review::try_from(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Review>, RepositoryError> {
        let sql = format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1");
        sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .map(Review::try_from)
            .transpose()
    }

    async fn find_by_author_and_movie(
        &self,
        user_id: Uuid,
        movie_id: Uuid,
    ) -> Result<Option<Review>, RepositoryError> {
        let sql =
            format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE user_id = $1 AND movie_id = $2");
        sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(user_id)
            .bind(movie_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .map(Review::try_from)
            .transpose()
    }

    async fn list_for_movie(
        &self,
        movie_id: Uuid,
        status: ReviewStatus,
        page: Page,
    ) -> Result<(Vec<Review>, u64), RepositoryError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE movie_id = $1 AND status = $2")
                .bind(movie_id)
                .bind(status.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(db_error)?;

        let (limit, offset) = page_bounds(page);
        let sql = format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE movie_id = $1 AND status = $2 \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        );
        let rows = sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(movie_id)
            .bind(status.as_str())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        let reviews = rows
            .into_iter()
            .map(Review::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((reviews, total.max(0) as u64))
    }

    async fn save(&self, review: Review) -> Result<Option<Review>, RepositoryError> {
        let sql = format!(
            "UPDATE reviews SET rating = $2, review_text = $3, sentiment = $4, status = $5, \
             is_thread_locked = $6, updated_at = $7 WHERE id = $1 RETURNING {REVIEW_COLUMNS}"
        );
        sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(review.id)
            .bind(review.rating)
            .bind(&review.review_text)
            .bind(&review.sentiment)
            .bind(review.status.as_str())
            .bind(review.is_thread_locked)
            .bind(review.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .map(Review::try_from)
            .transpose()
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn rating_stats(&self, movie_id: Uuid) -> Result<(Option<f64>, i64), RepositoryError> {
        let (average, count): (Option<f64>, i64) = sqlx::query_as(
            "SELECT AVG(rating)::DOUBLE PRECISION, COUNT(*) FROM reviews \
             WHERE movie_id = $1 AND status = 'published'",
        )
        .bind(movie_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok((average, count))
    }

    async fn adjust_comment_count(
        &self,
        review_id: Uuid,
        delta: i32,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE reviews SET comments_count = GREATEST(comments_count + $2, 0) WHERE id = $1",
        )
        .bind(review_id)
        .bind(delta)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn create_comment(
        &self,
        comment: ReviewComment,
    ) -> Result<ReviewComment, RepositoryError> {
        let sql = format!(
            "INSERT INTO review_comments ({COMMENT_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {COMMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(comment.id)
            .bind(comment.review_id)
            .bind(comment.user_id)
            .bind(comment.parent_comment_id)
            .bind(&comment.comment_text)
            .bind(comment.is_removed)
            .bind(comment.removed_by)
            .bind(comment.likes_count)
            .bind(comment.created_at)
            .bind(comment.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(row.into())
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<ReviewComment>, RepositoryError> {
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM review_comments WHERE id = $1");
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(row.map(ReviewComment::from))
    }

    async fn list_comments(&self, review_id: Uuid) -> Result<Vec<ReviewComment>, RepositoryError> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM review_comments WHERE review_id = $1 \
             ORDER BY created_at ASC"
        );
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(review_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(ReviewComment::from).collect())
    }

    async fn remove_comment(&self, id: Uuid, removed_by: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE review_comments SET is_removed = TRUE, removed_by = $2, updated_at = NOW() \
             WHERE id = $1 AND is_removed = FALSE",
        )
        .bind(id)
        .bind(removed_by)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}

// ============================================================================
// Follows
// ============================================================================

impl PgStore {
    /// One page of accounts on one side of the follow graph
    ///
    /// `anchor` is the column matched against `account_id`; `other` is the
    /// column joined to the returned accounts.
    async fn follow_page(
        &self,
        anchor: &str,
        other: &str,
        account_id: Uuid,
        page: Page,
    ) -> Result<(Vec<Account>, u64), RepositoryError> {
        let count_sql = format!("SELECT COUNT(*) FROM follows WHERE {anchor} = $1");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(account_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;

        let columns = ACCOUNT_COLUMNS
            .split(", ")
            .map(|c| format!("a.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {columns} FROM follows f JOIN accounts a ON a.id = f.{other} \
             WHERE f.{anchor} = $1 ORDER BY f.created_at DESC LIMIT $2 OFFSET $3"
        );
        let (limit, offset) = page_bounds(page);
        let rows = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(account_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        Ok((into_accounts(rows)?, total.max(0) as u64))
    }
}

#[async_trait]
impl FollowRepository for PgStore {
    async fn create(&self, follow: Follow) -> Result<Follow, RepositoryError> {
        sqlx::query(
            "INSERT INTO follows (id, follower_id, following_id, created_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(follow.id)
        .bind(follow.follower_id)
        .bind(follow.following_id)
        .bind(follow.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(follow)
    }

    async fn delete(&self, follower_id: Uuid, following_id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND following_id = $2")
            .bind(follower_id)
            .bind(following_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn exists(&self, follower_id: Uuid, following_id: Uuid) -> Result<bool, RepositoryError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = $1 AND following_id = $2)",
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn followers(
        &self,
        account_id: Uuid,
        page: Page,
    ) -> Result<(Vec<Account>, u64), RepositoryError> {
        self.follow_page("following_id", "follower_id", account_id, page)
            .await
    }

    async fn following(
        &self,
        account_id: Uuid,
        page: Page,
    ) -> Result<(Vec<Account>, u64), RepositoryError> {
        self.follow_page("follower_id", "following_id", account_id, page)
            .await
    }

    async fn stats(&self, account_id: Uuid) -> Result<FollowStats, RepositoryError> {
        let (followers, following): (i64, i64) = sqlx::query_as(
            "SELECT \
                (SELECT COUNT(*) FROM follows WHERE following_id = $1), \
                (SELECT COUNT(*) FROM follows WHERE follower_id = $1)",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(FollowStats {
            followers_count: followers.max(0) as u64,
            following_count: following.max(0) as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("matrix"), "%matrix%");
        assert_eq!(like_pattern("100%_done"), "%100\\%\\_done%");
    }

    #[test]
    fn test_page_bounds() {
        let page = Page::new(Some(2), Some(25), 20, 100);
        assert_eq!(page_bounds(page), (25, 25));
    }
}
