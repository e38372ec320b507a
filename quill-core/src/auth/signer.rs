//! Token signing providers
//!
//! The token service only talks to [`TokenSigner`], so the algorithm can be
//! replaced without touching issuing or verifying code. Both providers are
//! thin wrappers over jwt-simple keys.

use crate::{QuillError, Result};
use ed25519_dalek::SigningKey;
use jwt_simple::prelude::{
    Ed25519KeyPair, Ed25519PublicKey, EdDSAKeyPairLike, EdDSAPublicKeyLike, HS256Key, JWTClaims,
    MACLike, NoCustomClaims, VerificationOptions,
};
use rand::rngs::OsRng;
use std::fmt;

/// A signing capability for bearer tokens
pub trait TokenSigner: Send + Sync {
    /// Algorithm name written into, and required from, the token header
    fn algorithm(&self) -> &'static str;

    /// Encode and sign `claims` as a compact token
    fn sign(&self, claims: JWTClaims<NoCustomClaims>) -> std::result::Result<String, jwt_simple::Error>;

    /// Check the header algorithm and signature of `token`, then its time claims
    fn verify(
        &self,
        token: &str,
        options: VerificationOptions,
    ) -> std::result::Result<JWTClaims<NoCustomClaims>, jwt_simple::Error>;
}

/// HMAC-SHA256 keyed by a shared process secret
pub struct Hs256Signer {
    key: HS256Key,
}

impl Hs256Signer {
    /// Minimum secret length in bytes (256 bits)
    pub const MIN_KEY_LENGTH: usize = 32;

    /// Create a signer from the shared secret
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self> {
        let secret = secret.as_ref();
        if secret.len() < Self::MIN_KEY_LENGTH {
            return Err(QuillError::Crypto(format!(
                "signing secret too short: got {} bytes, need at least {}",
                secret.len(),
                Self::MIN_KEY_LENGTH
            )));
        }

        Ok(Hs256Signer {
            key: HS256Key::from_bytes(secret),
        })
    }
}

impl TokenSigner for Hs256Signer {
    fn algorithm(&self) -> &'static str {
        "HS256"
    }

    fn sign(&self, claims: JWTClaims<NoCustomClaims>) -> std::result::Result<String, jwt_simple::Error> {
        self.key.authenticate(claims)
    }

    fn verify(
        &self,
        token: &str,
        options: VerificationOptions,
    ) -> std::result::Result<JWTClaims<NoCustomClaims>, jwt_simple::Error> {
        self.key.verify_token::<NoCustomClaims>(token, Some(options))
    }
}

impl fmt::Debug for Hs256Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hs256Signer").finish_non_exhaustive()
    }
}

/// Ed25519 signer.
///
/// Asymmetric alternative to [`Hs256Signer`]; only the public half is
/// needed to check tokens.
pub struct Ed25519Signer {
    key_pair: Ed25519KeyPair,
    public_key: Ed25519PublicKey,
    verifying_key_bytes: [u8; 32],
}

impl Ed25519Signer {
    /// Generate a fresh key pair from the OS RNG
    pub fn generate() -> Result<Self> {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Restore a key pair from its 32-byte seed
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self> {
        Self::from_signing_key(SigningKey::from_bytes(seed))
    }

    fn from_signing_key(signing_key: SigningKey) -> Result<Self> {
        // jwt-simple wants the 64-byte secret || public form.
        let verifying_key_bytes = signing_key.verifying_key().to_bytes();
        let mut keypair_bytes = [0u8; 64];
        keypair_bytes[..32].copy_from_slice(&signing_key.to_bytes());
        keypair_bytes[32..].copy_from_slice(&verifying_key_bytes);

        let key_pair = Ed25519KeyPair::from_bytes(&keypair_bytes)
            .map_err(|e| QuillError::Crypto(format!("key conversion failed: {}", e)))?;
        let public_key = key_pair.public_key();

        Ok(Ed25519Signer {
            key_pair,
            public_key,
            verifying_key_bytes,
        })
    }

    /// Public key bytes
    pub fn verifying_key_bytes(&self) -> [u8; 32] {
        self.verifying_key_bytes
    }
}

impl TokenSigner for Ed25519Signer {
    fn algorithm(&self) -> &'static str {
        "EdDSA"
    }

    fn sign(&self, claims: JWTClaims<NoCustomClaims>) -> std::result::Result<String, jwt_simple::Error> {
        self.key_pair.sign(claims)
    }

    fn verify(
        &self,
        token: &str,
        options: VerificationOptions,
    ) -> std::result::Result<JWTClaims<NoCustomClaims>, jwt_simple::Error> {
        self.public_key
            .verify_token::<NoCustomClaims>(token, Some(options))
    }
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("verifying_key", &self.verifying_key_bytes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jwt_simple::prelude::{Claims, Duration};

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn claims() -> JWTClaims<NoCustomClaims> {
        Claims::create(Duration::from_secs(60)).with_subject("7")
    }

    #[test]
    fn test_hs256_rejects_short_secret() {
        assert!(Hs256Signer::new("short").is_err());
        assert!(Hs256Signer::new([7u8; 31]).is_err());
        assert!(Hs256Signer::new([7u8; 32]).is_ok());
    }

    #[test]
    fn test_hs256_sign_verify() {
        let signer = Hs256Signer::new(SECRET).unwrap();
        let token = signer.sign(claims()).unwrap();

        let verified = signer.verify(&token, VerificationOptions::default()).unwrap();
        assert_eq!(verified.subject.as_deref(), Some("7"));
    }

    #[test]
    fn test_hs256_is_keyed() {
        let a = Hs256Signer::new(SECRET).unwrap();
        let b = Hs256Signer::new([9u8; 32]).unwrap();

        let token = a.sign(claims()).unwrap();
        assert!(b.verify(&token, VerificationOptions::default()).is_err());
    }

    #[test]
    fn test_ed25519_sign_verify() {
        let signer = Ed25519Signer::generate().unwrap();
        let token = signer.sign(claims()).unwrap();

        let verified = signer.verify(&token, VerificationOptions::default()).unwrap();
        assert_eq!(verified.subject.as_deref(), Some("7"));

        let other = Ed25519Signer::generate().unwrap();
        assert!(other.verify(&token, VerificationOptions::default()).is_err());
    }

    #[test]
    fn test_ed25519_seed_is_deterministic() {
        let seed = [42u8; 32];
        let a = Ed25519Signer::from_seed(&seed).unwrap();
        let b = Ed25519Signer::from_seed(&seed).unwrap();

        assert_eq!(a.verifying_key_bytes(), b.verifying_key_bytes());

        let token = a.sign(claims()).unwrap();
        assert!(b.verify(&token, VerificationOptions::default()).is_ok());
    }
}
