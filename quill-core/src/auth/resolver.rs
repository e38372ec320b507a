//! Resolution of inbound credentials into a principal
//!
//! Every way a credential can fail (no header, wrong scheme, bad token,
//! unknown subject) ends in the same [`QuillError::Unauthenticated`]. The
//! specific cause is only logged.

use crate::auth::TokenService;
use crate::{Principal, PrincipalId, PrincipalLookup, QuillError, Result};
use chrono::Utc;
use tracing::debug;

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn extract_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }

    Some(token)
}

/// Turns a raw credential into the acting principal
#[derive(Debug, Clone)]
pub struct AuthResolver {
    tokens: TokenService,
}

impl AuthResolver {
    pub fn new(tokens: TokenService) -> Self {
        AuthResolver { tokens }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Resolve the `Authorization` header value against `lookup`
    pub fn resolve<L>(&self, lookup: &L, header: Option<&str>) -> Result<Principal>
    where
        L: PrincipalLookup + ?Sized,
    {
        self.resolve_at(lookup, header, Utc::now().timestamp())
    }

    /// Same as [`resolve`](Self::resolve) with an explicit clock
    pub fn resolve_at<L>(&self, lookup: &L, header: Option<&str>, now: i64) -> Result<Principal>
    where
        L: PrincipalLookup + ?Sized,
    {
        let Some(header) = header else {
            debug!("no authorization header");
            return Err(QuillError::Unauthenticated);
        };

        let Some(token) = extract_bearer(header) else {
            debug!("authorization header is not a bearer credential");
            return Err(QuillError::Unauthenticated);
        };

        let claims = self.tokens.verify_at(token, now).map_err(|e| {
            debug!(reason = %e, "bearer token rejected");
            QuillError::Unauthenticated
        })?;

        let id: PrincipalId = claims.sub.parse().map_err(|_| {
            debug!("token subject is not a principal id");
            QuillError::Unauthenticated
        })?;

        // Storage faults are not authentication failures and propagate as-is.
        match lookup.find_principal(id)? {
            Some(principal) => Ok(principal),
            None => {
                debug!(principal = %id, "token subject no longer exists");
                Err(QuillError::Unauthenticated)
            }
        }
    }
}
