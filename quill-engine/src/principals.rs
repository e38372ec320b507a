//! Principal records and their unique username/email indexes

use crate::{decode_u64, storage_error, StorageEngine};
use chrono::Utc;
use fjall::ReadTransaction;
use quill_core::*;
use tracing::{debug, info};

/// Persistent registry of principals
#[derive(Clone)]
pub struct PrincipalStore {
    engine: StorageEngine,
}

impl PrincipalStore {
    pub fn new(engine: StorageEngine) -> Self {
        PrincipalStore { engine }
    }

    /// Register a principal with an already-computed password digest.
    ///
    /// The uniqueness check and the insert share one write transaction, so
    /// two registrations racing for the same username or email cannot both
    /// succeed.
    pub fn register(&self, request: &NewPrincipal, password_hash: String) -> Result<Principal> {
        request.validate()?;

        let username_key = username_key(&request.username);
        let email_key = email_key(&request.email);

        let mut tx = self.engine.keyspace().write_tx();
        let taken = tx
            .get(&self.engine.principals, username_key.as_bytes())
            .map_err(storage_error)?
            .is_some()
            || tx
                .get(&self.engine.principals, email_key.as_bytes())
                .map_err(storage_error)?
                .is_some();
        if taken {
            debug!(username = %request.username, "registration rejected: identity taken");
            return Err(QuillError::IdentityConflict);
        }

        let id = PrincipalId::new(self.engine.next_sequence(&mut tx, "principal")?);
        let principal = Principal {
            id,
            username: request.username.clone(),
            email: request.email.clone(),
            password_hash,
            created_at: Utc::now(),
        };

        let id_bytes = id.get().to_le_bytes().to_vec();
        tx.insert(
            &self.engine.principals,
            principal_key(id).as_bytes(),
            serde_json::to_vec(&principal)?,
        );
        tx.insert(&self.engine.principals, username_key.as_bytes(), id_bytes.clone());
        tx.insert(&self.engine.principals, email_key.as_bytes(), id_bytes);
        self.engine.commit(tx)?;

        info!(principal = %id, username = %principal.username, "principal registered");
        Ok(principal)
    }

    /// Look a principal up by its login name
    pub fn find_by_username(&self, username: &str) -> Result<Option<Principal>> {
        let tx = self.engine.keyspace().read_tx();
        let id = match tx
            .get(&self.engine.principals, username_key(username).as_bytes())
            .map_err(storage_error)?
        {
            Some(bytes) => PrincipalId::new(decode_u64(&bytes)?),
            None => return Ok(None),
        };

        self.load(&tx, id)
    }

    /// Look a principal up by id
    pub fn find_by_id(&self, id: PrincipalId) -> Result<Option<Principal>> {
        let tx = self.engine.keyspace().read_tx();
        self.load(&tx, id)
    }

    fn load(&self, tx: &ReadTransaction, id: PrincipalId) -> Result<Option<Principal>> {
        match tx
            .get(&self.engine.principals, principal_key(id).as_bytes())
            .map_err(storage_error)?
        {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl PrincipalLookup for PrincipalStore {
    fn find_principal(&self, id: PrincipalId) -> Result<Option<Principal>> {
        self.find_by_id(id)
    }
}

fn principal_key(id: PrincipalId) -> String {
    format!("principal:{:020}", id.get())
}

fn username_key(username: &str) -> String {
    format!("username:{}", username)
}

fn email_key(email: &str) -> String {
    format!("email:{}", email)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, email: &str) -> NewPrincipal {
        NewPrincipal::new(username, email, "pw").unwrap()
    }

    #[test]
    fn test_register_and_find() {
        let (engine, _temp) = StorageEngine::temp().unwrap();
        let store = PrincipalStore::new(engine);

        let alice = store
            .register(&request("alice", "alice@example.com"), "digest".to_string())
            .unwrap();
        assert_eq!(alice.id.get(), 1);

        let by_name = store.find_by_username("alice").unwrap().unwrap();
        assert_eq!(by_name, alice);

        let by_id = store.find_principal(alice.id).unwrap().unwrap();
        assert_eq!(by_id.email, "alice@example.com");

        assert!(store.find_by_username("bob").unwrap().is_none());
        assert!(store.find_by_id(PrincipalId::new(99)).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_username_or_email_is_rejected() {
        let (engine, _temp) = StorageEngine::temp().unwrap();
        let store = PrincipalStore::new(engine);

        store
            .register(&request("alice", "alice@example.com"), "d".to_string())
            .unwrap();

        let same_name = store.register(&request("alice", "other@example.com"), "d".to_string());
        assert!(matches!(same_name, Err(QuillError::IdentityConflict)));

        let same_email = store.register(&request("alicia", "alice@example.com"), "d".to_string());
        assert!(matches!(same_email, Err(QuillError::IdentityConflict)));

        // The rejected attempts left no partial index entries behind.
        assert!(store.find_by_username("alicia").unwrap().is_none());
        let bob = store
            .register(&request("bob", "bob@example.com"), "d".to_string())
            .unwrap();
        assert_eq!(bob.id.get(), 2);
    }

    #[test]
    fn test_invalid_request_is_rejected_before_storage() {
        let (engine, _temp) = StorageEngine::temp().unwrap();
        let store = PrincipalStore::new(engine);

        let bad = NewPrincipal {
            username: "has space".to_string(),
            email: "x@example.com".to_string(),
            password: "pw".to_string(),
        };
        assert!(matches!(
            store.register(&bad, "d".to_string()),
            Err(QuillError::Validation(_))
        ));
    }
}
