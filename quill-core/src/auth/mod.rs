//! Authentication for quill
//!
//! This module implements the stateless authentication plane:
//! - Salted adaptive password hashing behind [`CredentialHasher`]
//! - Signed, expiring bearer tokens behind a swappable [`TokenSigner`]
//! - Resolution of an `Authorization` header into a [`crate::Principal`]

pub mod password;
pub mod resolver;
pub mod signer;
pub mod token;

pub use password::*;
pub use resolver::*;
pub use signer::*;
pub use token::*;
