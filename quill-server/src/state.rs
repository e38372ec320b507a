//! Shared, read-only request context

use crate::config::ServerConfig;
use quill_core::auth::{Argon2Hasher, AuthResolver, CredentialHasher, TokenService};
use quill_core::Result;
use quill_engine::{NoteRepository, PrincipalStore, StorageEngine};
use std::sync::Arc;
use std::time::Duration;

/// Everything a handler needs. Built once at startup; never mutated.
pub struct AppState {
    pub resolver: AuthResolver,
    pub hasher: Arc<dyn CredentialHasher>,
    pub principals: PrincipalStore,
    pub notes: NoteRepository,
    pub token_ttl: Duration,
    /// Digest checked when a login names an unknown user, so both failure
    /// paths cost one hash verification.
    pub login_decoy: String,
}

impl AppState {
    pub fn new(
        engine: StorageEngine,
        tokens: TokenService,
        hasher: Arc<dyn CredentialHasher>,
        token_ttl: Duration,
    ) -> Result<Self> {
        let login_decoy = hasher.hash("quill-login-decoy")?;

        Ok(AppState {
            resolver: AuthResolver::new(tokens),
            hasher,
            principals: PrincipalStore::new(engine.clone()),
            notes: NoteRepository::new(engine),
            token_ttl,
            login_decoy,
        })
    }

    /// Production wiring: HS256 tokens and default-cost Argon2id
    pub fn from_config(config: &ServerConfig, engine: StorageEngine) -> Result<Self> {
        let tokens = TokenService::hs256(config.secret_key.as_bytes())?;
        Self::new(
            engine,
            tokens,
            Arc::new(Argon2Hasher::new()),
            config.token_ttl,
        )
    }

    pub fn tokens(&self) -> &TokenService {
        self.resolver.tokens()
    }
}
