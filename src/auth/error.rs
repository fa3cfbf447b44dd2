//! Authentication error types.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Registration with an email that already has an account.
    #[error("user {0} already exists")]
    AlreadyRegistered(String),

    /// Reset-token issuance for an email with no account.
    #[error("user not found")]
    UserNotFound,

    /// Password update with a token no pending reset matches.
    #[error("invalid reset token")]
    InvalidResetToken,

    /// Credential hashing failed.
    #[error("credential hashing failed: {0}")]
    Hashing(String),

    /// Unexpected store failure. Expected not-found outcomes never take
    /// this path; they are absorbed into bool/Option results or mapped to
    /// the domain variants above.
    #[error(transparent)]
    Store(#[from] StoreError),
}
