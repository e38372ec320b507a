//! Password hashing
//!
//! Digests are PHC strings, so the salt, algorithm and cost parameters
//! travel with the digest and verification never needs outside state.

use crate::{QuillError, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params};
use std::fmt;

/// One-way credential hashing provider
pub trait CredentialHasher: Send + Sync {
    /// Produce a salted, self-describing digest of `password`
    fn hash(&self, password: &str) -> Result<String>;

    /// Check `password` against `digest`. Malformed digests yield `false`.
    fn verify(&self, password: &str, digest: &str) -> bool;
}

/// Argon2id hasher
#[derive(Clone)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    /// Hasher with the crate's recommended default cost
    pub fn new() -> Self {
        Argon2Hasher {
            argon2: Argon2::default(),
        }
    }

    /// Hasher with explicit memory (KiB), iteration and lane parameters
    pub fn with_cost(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| QuillError::Crypto(format!("invalid argon2 parameters: {}", e)))?;

        Ok(Argon2Hasher {
            argon2: Argon2::new(Algorithm::Argon2id, argon2::Version::V0x13, params),
        })
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Argon2Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Argon2Hasher").finish_non_exhaustive()
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|digest| digest.to_string())
            .map_err(|e| QuillError::Crypto(format!("password hashing failed: {}", e)))
    }

    fn verify(&self, password: &str, digest: &str) -> bool {
        // Parameters come from the digest, not from `self`.
        match PasswordHash::new(digest) {
            Ok(parsed) => self
                .argon2
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fast_hasher;

    #[test]
    fn test_hash_and_verify() {
        let hasher = fast_hasher();
        let digest = hasher.hash("correct horse").unwrap();

        assert!(digest.starts_with("$argon2id$"));
        assert!(hasher.verify("correct horse", &digest));
        assert!(!hasher.verify("battery staple", &digest));
    }

    #[test]
    fn test_digests_are_salted() {
        let hasher = fast_hasher();
        let first = hasher.hash("same password").unwrap();
        let second = hasher.hash("same password").unwrap();

        assert_ne!(first, second);
        assert!(hasher.verify("same password", &first));
        assert!(hasher.verify("same password", &second));
    }

    #[test]
    fn test_verify_uses_embedded_parameters() {
        let cheap = fast_hasher();
        let other = Argon2Hasher::with_cost(16, 2, 1).unwrap();
        let digest = cheap.hash("portable").unwrap();

        assert!(other.verify("portable", &digest));
    }

    #[test]
    fn test_malformed_digest_is_rejected_quietly() {
        let hasher = fast_hasher();
        for digest in ["", "plaintext", "$argon2id$", "$argon2id$v=19$m=8,t=1,p=1$@@@$###", "$2b$12$abc"] {
            assert!(!hasher.verify("anything", digest), "accepted {:?}", digest);
        }
    }

    #[test]
    fn test_invalid_cost_is_an_error() {
        assert!(Argon2Hasher::with_cost(0, 0, 0).is_err());
    }
}
