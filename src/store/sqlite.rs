//! SQLite-backed user store.
//!
//! Email uniqueness is enforced by the UNIQUE constraint on the `users`
//! table; partial updates are single UPDATE statements, so concurrent
//! writers cannot interleave inside a read-modify-write.

use std::str::FromStr;

use anyhow::Context;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{QueryBuilder, SqlitePool};
use tracing::info;
use uuid::Uuid;

use super::{StoreError, User, UserQuery, UserStore, UserUpdate};

/// Embedded schema migrations, applied idempotently on connect.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// [`UserStore`] implementation on a SQLite database.
pub struct SqliteUserStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    hashed_password: String,
    session_id: Option<String>,
    reset_token: Option<String>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id)
            .with_context(|| format!("corrupt user id in store: {}", row.id))?;
        Ok(User {
            id,
            email: row.email,
            hashed_password: row.hashed_password,
            session_id: row.session_id,
            reset_token: row.reset_token,
        })
    }
}

impl SqliteUserStore {
    /// Wrap an existing pool. Migrations must already be applied.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `url` and apply migrations.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid database url: {url}"))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("connect to database")?;

        MIGRATOR.run(&pool).await.context("apply migrations")?;
        info!("database ready at {url}");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl UserStore for SqliteUserStore {
    async fn create(&self, email: &str, hashed_password: &str) -> Result<User, StoreError> {
        let id = Uuid::new_v4();

        sqlx::query("INSERT INTO users (id, email, hashed_password) VALUES (?, ?, ?)")
            .bind(id.to_string())
            .bind(email)
            .bind(hashed_password)
            .execute(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    StoreError::DuplicateEmail(email.to_string())
                }
                _ => StoreError::Backend(e.into()),
            })?;

        Ok(User {
            id,
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
            session_id: None,
            reset_token: None,
        })
    }

    async fn find_by(&self, query: UserQuery) -> Result<User, StoreError> {
        let row = match &query {
            UserQuery::Id(id) => {
                sqlx::query_as::<_, UserRow>(
                    "SELECT id, email, hashed_password, session_id, reset_token
                     FROM users WHERE id = ? ORDER BY rowid LIMIT 1",
                )
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
            }
            UserQuery::Email(email) => {
                sqlx::query_as::<_, UserRow>(
                    "SELECT id, email, hashed_password, session_id, reset_token
                     FROM users WHERE email = ? ORDER BY rowid LIMIT 1",
                )
                .bind(email)
                .fetch_optional(&self.pool)
                .await
            }
            UserQuery::SessionId(session_id) => {
                sqlx::query_as::<_, UserRow>(
                    "SELECT id, email, hashed_password, session_id, reset_token
                     FROM users WHERE session_id = ? ORDER BY rowid LIMIT 1",
                )
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await
            }
            UserQuery::ResetToken(reset_token) => {
                sqlx::query_as::<_, UserRow>(
                    "SELECT id, email, hashed_password, session_id, reset_token
                     FROM users WHERE reset_token = ? ORDER BY rowid LIMIT 1",
                )
                .bind(reset_token)
                .fetch_optional(&self.pool)
                .await
            }
        }
        .map_err(|e| StoreError::Backend(e.into()))?;

        row.ok_or(StoreError::NotFound)?.try_into()
    }

    async fn update(&self, id: Uuid, changes: UserUpdate) -> Result<(), StoreError> {
        if changes.is_empty() {
            // Nothing to write, but the id must still exist.
            let exists = sqlx::query("SELECT id FROM users WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::Backend(e.into()))?;
            return exists.map(|_| ()).ok_or(StoreError::NotFound);
        }

        let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE users SET ");
        let mut separated = query.separated(", ");

        if let Some(ref hash) = changes.hashed_password {
            separated.push("hashed_password = ");
            separated.push_bind_unseparated(hash.clone());
        }
        if let Some(ref session_id) = changes.session_id {
            separated.push("session_id = ");
            separated.push_bind_unseparated(session_id.clone());
        }
        if let Some(ref reset_token) = changes.reset_token {
            separated.push("reset_token = ");
            separated.push_bind_unseparated(reset_token.clone());
        }

        query.push(" WHERE id = ");
        query.push_bind(id.to_string());

        let result = query
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
