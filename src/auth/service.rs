//! Authentication service: registration, login, session and password-reset
//! orchestration.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::error::AuthError;
use crate::auth::{password, token};
use crate::store::{StoreError, User, UserQuery, UserStore, UserUpdate};

/// Orchestrates the password hasher, token generator and user store.
///
/// Holds the one store instance for its lifetime; constructed once at
/// service start.
pub struct AuthService {
    store: Arc<dyn UserStore>,
}

/// Canonical form of an email address, applied before every store access.
///
/// Uniqueness and lookups are effectively case-insensitive because both
/// writes and reads pass through here.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AuthService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Register a new user.
    ///
    /// Fails with [`AuthError::AlreadyRegistered`] if the email has an
    /// account. The lookup is an early exit; the store's own duplicate
    /// check makes the sequence atomic against a concurrent registration
    /// for the same email.
    pub async fn register_user(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = normalize_email(email);

        match self.store.find_by(UserQuery::Email(email.clone())).await {
            Ok(_) => return Err(AuthError::AlreadyRegistered(email)),
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let hash = password::hash_password(password).map_err(|e| AuthError::Hashing(e.to_string()))?;

        let user = match self.store.create(&email, &hash).await {
            Ok(user) => user,
            // Lost the race against a concurrent registration.
            Err(StoreError::DuplicateEmail(email)) => {
                return Err(AuthError::AlreadyRegistered(email))
            }
            Err(e) => return Err(e.into()),
        };

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(user)
    }

    /// Check login credentials.
    ///
    /// Returns `false` both for an unknown email and for a wrong password;
    /// callers cannot distinguish the two.
    pub async fn valid_login(&self, email: &str, password: &str) -> Result<bool, AuthError> {
        let email = normalize_email(email);

        let user = match self.store.find_by(UserQuery::Email(email)).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        Ok(password::verify_password(password, &user.hashed_password))
    }

    /// Start a session for the user with this email.
    ///
    /// Returns `None` for an unknown email. Any prior session is
    /// overwritten; a user holds at most one session.
    pub async fn create_session(&self, email: &str) -> Result<Option<String>, AuthError> {
        let email = normalize_email(email);

        let user = match self.store.find_by(UserQuery::Email(email)).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let session_id = token::new_token();
        self.store
            .update(
                user.id,
                UserUpdate::new().session_id(Some(session_id.clone())),
            )
            .await?;

        debug!(user_id = %user.id, "session created");
        Ok(Some(session_id))
    }

    /// Resolve a session token to its user.
    ///
    /// An absent or empty token is an immediate `None` without a store
    /// lookup; an unrecognized one maps to `None` as well.
    pub async fn user_by_session_id(
        &self,
        session_id: Option<&str>,
    ) -> Result<Option<User>, AuthError> {
        let session_id = match session_id {
            Some(s) if !s.is_empty() => s,
            _ => return Ok(None),
        };

        match self
            .store
            .find_by(UserQuery::SessionId(session_id.to_string()))
            .await
        {
            Ok(user) => Ok(Some(user)),
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// End the session of the user with this id. Idempotent; an unknown id
    /// is swallowed.
    pub async fn destroy_session(&self, user_id: Uuid) -> Result<(), AuthError> {
        match self
            .store
            .update(user_id, UserUpdate::new().session_id(None))
            .await
        {
            Ok(()) | Err(StoreError::NotFound) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Issue a password-reset token for this email, overwriting any pending
    /// one.
    ///
    /// Fails with [`AuthError::UserNotFound`] for an unknown email.
    pub async fn reset_password_token(&self, email: &str) -> Result<String, AuthError> {
        let email = normalize_email(email);

        let user = match self.store.find_by(UserQuery::Email(email)).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => return Err(AuthError::UserNotFound),
            Err(e) => return Err(e.into()),
        };

        let reset_token = token::new_token();
        self.store
            .update(
                user.id,
                UserUpdate::new().reset_token(Some(reset_token.clone())),
            )
            .await?;

        debug!(user_id = %user.id, "reset token issued");
        Ok(reset_token)
    }

    /// Consume a reset token: set the new password and clear the token in
    /// one store update. The session, if any, is left untouched.
    ///
    /// Fails with [`AuthError::InvalidResetToken`] for an unrecognized
    /// token, including one that was already consumed.
    pub async fn update_password(
        &self,
        reset_token: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user = match self
            .store
            .find_by(UserQuery::ResetToken(reset_token.to_string()))
            .await
        {
            Ok(user) => user,
            Err(StoreError::NotFound) => return Err(AuthError::InvalidResetToken),
            Err(e) => return Err(e.into()),
        };

        let hash = password::hash_password(new_password)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;

        self.store
            .update(
                user.id,
                UserUpdate::new().hashed_password(hash).reset_token(None),
            )
            .await?;

        info!(user_id = %user.id, "password updated");
        Ok(())
    }
}
