//! Core data models, authentication and concurrency control for quill

pub mod auth;
pub mod error;
pub mod occ;
pub mod store;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::*;
pub use occ::*;
pub use store::*;
pub use types::*;

/// Result type alias for quill operations
pub type Result<T> = std::result::Result<T, QuillError>;
