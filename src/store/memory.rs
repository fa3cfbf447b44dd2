//! In-memory user store.
//!
//! Keeps records in insertion order behind an async RwLock. The write lock
//! spans every check-then-write sequence, so duplicate-email checks and
//! read-modify-write updates are serialized.

use tokio::sync::RwLock;
use uuid::Uuid;

use super::{StoreError, User, UserQuery, UserStore, UserUpdate};

/// In-process [`UserStore`] implementation.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(user: &User, query: &UserQuery) -> bool {
    match query {
        UserQuery::Id(id) => user.id == *id,
        UserQuery::Email(email) => user.email == *email,
        UserQuery::SessionId(session_id) => user.session_id.as_deref() == Some(session_id),
        UserQuery::ResetToken(reset_token) => user.reset_token.as_deref() == Some(reset_token),
    }
}

#[async_trait::async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, email: &str, hashed_password: &str) -> Result<User, StoreError> {
        let mut users = self.users.write().await;

        if users.iter().any(|u| u.email == email) {
            return Err(StoreError::DuplicateEmail(email.to_string()));
        }

        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
            session_id: None,
            reset_token: None,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by(&self, query: UserQuery) -> Result<User, StoreError> {
        let users = self.users.read().await;
        users
            .iter()
            .find(|u| matches(u, &query))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, id: Uuid, changes: UserUpdate) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::NotFound)?;

        if let Some(hash) = changes.hashed_password {
            user.hashed_password = hash;
        }
        if let Some(session_id) = changes.session_id {
            user.session_id = session_id;
        }
        if let Some(reset_token) = changes.reset_token {
            user.reset_token = reset_token;
        }
        Ok(())
    }
}
