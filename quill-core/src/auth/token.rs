//! Bearer token issuing and verification
//!
//! Tokens are JWTs in compact form, encoded and checked by jwt-simple
//! through the configured [`TokenSigner`]. The claims are `sub`, `iat` and
//! `exp` in epoch seconds.
//!
//! Verification order is fixed: structure, then signature, then expiry. No
//! claim is read before the signature has been checked, and there is no
//! clock-skew allowance.

use crate::auth::{Hs256Signer, TokenSigner};
use crate::{QuillError, Result};
use chrono::Utc;
use jwt_simple::prelude::{Claims as JwtClaims, Duration as JwtDuration, VerificationOptions};
use jwt_simple::JWTError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Why a token was rejected
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token has expired")]
    Expired,
}

impl From<jwt_simple::Error> for TokenError {
    fn from(e: jwt_simple::Error) -> Self {
        match e.downcast_ref::<JWTError>() {
            Some(
                JWTError::InvalidAuthenticationTag
                | JWTError::InvalidSignature
                | JWTError::AlgorithmMismatch,
            ) => TokenError::SignatureInvalid,
            Some(JWTError::TokenHasExpired) => TokenError::Expired,
            _ => TokenError::Malformed,
        }
    }
}

/// Claims carried by a bearer token (epoch seconds)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Exactly three non-empty dot-separated segments
fn has_compact_shape(token: &str) -> bool {
    let segments: Vec<&str> = token.split('.').collect();
    segments.len() == 3 && segments.iter().all(|s| !s.is_empty())
}

/// Issues and verifies bearer tokens with a process-wide signer
#[derive(Clone)]
pub struct TokenService {
    signer: Arc<dyn TokenSigner>,
}

impl TokenService {
    /// Latest expiry the claim encoding can carry
    pub const MAX_EXPIRY: i64 = u32::MAX as i64;

    pub fn new(signer: Arc<dyn TokenSigner>) -> Self {
        TokenService { signer }
    }

    /// HMAC-SHA256 service keyed by `secret`
    pub fn hs256(secret: impl AsRef<[u8]>) -> Result<Self> {
        Ok(Self::new(Arc::new(Hs256Signer::new(secret)?)))
    }

    pub fn algorithm(&self) -> &'static str {
        self.signer.algorithm()
    }

    /// Issue a token for `subject` valid for `ttl` from now
    pub fn issue(&self, subject: &str, ttl: Duration) -> Result<String> {
        self.issue_at(subject, ttl, Utc::now().timestamp())
    }

    /// Issue a token as if the current time were `now`
    pub fn issue_at(&self, subject: &str, ttl: Duration, now: i64) -> Result<String> {
        let exp = i64::try_from(ttl.as_secs())
            .ok()
            .and_then(|ttl| now.checked_add(ttl));
        let (iat, exp) = match exp {
            Some(exp) if now >= 0 && exp <= Self::MAX_EXPIRY => (now as u64, exp as u64),
            _ => {
                return Err(QuillError::Internal(format!(
                    "token expiry out of range: now={} ttl={:?}",
                    now, ttl
                )))
            }
        };

        let mut claims = JwtClaims::create(JwtDuration::from_secs(exp - iat)).with_subject(subject);
        claims.issued_at = Some(JwtDuration::from_secs(iat));
        claims.expires_at = Some(JwtDuration::from_secs(exp));
        claims.invalid_before = None;

        self.signer
            .sign(claims)
            .map_err(|e| QuillError::Crypto(format!("token signing failed: {}", e)))
    }

    /// Verify `token` and return its subject
    pub fn verify(&self, token: &str) -> std::result::Result<String, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
            .map(|claims| claims.sub)
    }

    /// Verify `token` as if the current time were `now`
    pub fn verify_at(&self, token: &str, now: i64) -> std::result::Result<Claims, TokenError> {
        if !has_compact_shape(token) {
            return Err(TokenError::Malformed);
        }

        let options = VerificationOptions {
            time_tolerance: Some(JwtDuration::from_secs(0)),
            artificial_time: Some(JwtDuration::from_secs(u64::try_from(now).unwrap_or(0))),
            ..Default::default()
        };

        // The signer rejects a foreign `alg` or a bad signature before any
        // claim is decoded.
        let verified = self.signer.verify(token, options)?;

        let sub = verified.subject.ok_or(TokenError::Malformed)?;
        let iat = verified.issued_at.ok_or(TokenError::Malformed)?.as_secs();
        let exp = verified.expires_at.ok_or(TokenError::Malformed)?.as_secs();
        let exp = i64::try_from(exp).map_err(|_| TokenError::Malformed)?;

        // Expired at the boundary second itself.
        if now >= exp {
            return Err(TokenError::Expired);
        }

        Ok(Claims {
            sub,
            iat: i64::try_from(iat).map_err(|_| TokenError::Malformed)?,
            exp,
        })
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &self.signer.algorithm())
            .finish_non_exhaustive()
    }
}
