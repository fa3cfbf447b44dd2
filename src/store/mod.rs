//! User persistence: the `UserStore` trait and its implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

mod memory;
mod sqlite;

pub use memory::MemoryUserStore;
pub use sqlite::{SqliteUserStore, MIGRATOR};

/// A registered user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,                     // unique user ID, assigned by the store
    pub email: String,                // unique across all users
    #[serde(skip_serializing)]
    pub hashed_password: String,      // Argon2 PHC string, never the plaintext
    pub session_id: Option<String>,   // set iff a session is active
    pub reset_token: Option<String>,  // set iff a password reset is pending
}

/// Lookup criterion for [`UserStore::find_by`]. Exactly one per call.
#[derive(Debug, Clone)]
pub enum UserQuery {
    Id(Uuid),
    Email(String),
    SessionId(String),
    ResetToken(String),
}

/// Partial update applied to a user record.
///
/// The outer `Option` means "change this field"; for the nullable fields the
/// inner `Option` is the new value, so `Some(None)` clears the column.
/// `id` and `email` are immutable after creation and cannot be expressed here.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub hashed_password: Option<String>,
    pub session_id: Option<Option<String>>,
    pub reset_token: Option<Option<String>>,
}

impl UserUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a new password hash.
    pub fn hashed_password(mut self, hash: impl Into<String>) -> Self {
        self.hashed_password = Some(hash.into());
        self
    }

    /// Set or clear the session ID.
    pub fn session_id(mut self, session_id: Option<String>) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Set or clear the reset token.
    pub fn reset_token(mut self, reset_token: Option<String>) -> Self {
        self.reset_token = Some(reset_token);
        self
    }

    /// Check if any fields are set.
    pub fn is_empty(&self) -> bool {
        self.hashed_password.is_none() && self.session_id.is_none() && self.reset_token.is_none()
    }
}

/// Store-level errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A user with this email already exists.
    #[error("email {0} is already registered")]
    DuplicateEmail(String),

    /// No user matched the lookup.
    #[error("no user matched the lookup")]
    NotFound,

    /// Backend failure (connectivity, I/O, corrupt data). Never surfaced as
    /// a distinct domain case by callers.
    #[error("storage backend failure")]
    Backend(#[from] anyhow::Error),
}

/// Keyed-record persistence for users.
///
/// Implementations must serialize their check-then-write sequences: a
/// duplicate-email check and the insert it guards, and the read-modify-write
/// inside `update`, each behave as one atomic step with respect to
/// concurrent calls.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persist a new user and assign its ID.
    ///
    /// Fails with [`StoreError::DuplicateEmail`] if the email is taken; the
    /// check and the insert are race-free against concurrent `create` calls.
    async fn create(&self, email: &str, hashed_password: &str) -> Result<User, StoreError>;

    /// Find the user matching the criterion.
    ///
    /// Fails with [`StoreError::NotFound`] on zero matches. If several
    /// records match (which the invariants rule out), the first in insertion
    /// order is returned.
    async fn find_by(&self, query: UserQuery) -> Result<User, StoreError>;

    /// Apply a partial update to the user with the given ID atomically.
    ///
    /// Fails with [`StoreError::NotFound`] if the ID does not exist.
    async fn update(&self, id: Uuid, changes: UserUpdate) -> Result<(), StoreError>;
}
