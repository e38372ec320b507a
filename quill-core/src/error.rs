//! Error types for quill

use crate::Version;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QuillError {
    /// Missing, malformed, forged or expired credentials, or an unknown subject.
    /// The cause is never surfaced to the caller.
    #[error("Invalid authentication credentials")]
    Unauthenticated,

    #[error("Username or email already registered")]
    IdentityConflict,

    /// A missing note and a note owned by someone else are indistinguishable.
    #[error("Note not found")]
    NotFound,

    #[error("Note has been modified by another user. Please refresh and try again.")]
    VersionConflict { current: Version },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
