//! Test doubles for the storage contracts and cheap crypto providers

use crate::auth::Argon2Hasher;
use crate::{
    CasOutcome, NewNote, Note, NoteId, NoteStore, Principal, PrincipalId, PrincipalLookup,
    Result, Version,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// Argon2id with the smallest legal cost, so tests stay fast
pub fn fast_hasher() -> Argon2Hasher {
    Argon2Hasher::with_cost(8, 1, 1).expect("minimal argon2 parameters are valid")
}

/// Principal with a placeholder digest
pub fn test_principal(id: u64, username: &str) -> Principal {
    Principal {
        id: PrincipalId::new(id),
        username: username.to_string(),
        email: format!("{}@example.com", username),
        password_hash: "$argon2id$placeholder".to_string(),
        created_at: Utc::now(),
    }
}

/// In-memory [`NoteStore`]; the map lock is the atomicity boundary
pub struct MemoryNoteStore {
    notes: Mutex<BTreeMap<(PrincipalId, NoteId), Note>>,
    next_id: AtomicU64,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        MemoryNoteStore {
            notes: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn insert(&self, owner: PrincipalId, fields: NewNote) -> Note {
        let id = NoteId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let note = Note::new(id, owner, fields, Utc::now());
        self.notes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert((owner, id), note.clone());
        note
    }

    /// Drop a note the way an unconditional delete would
    pub fn remove(&self, owner: PrincipalId, id: NoteId) -> bool {
        self.notes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&(owner, id))
            .is_some()
    }
}

impl Default for MemoryNoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteStore for MemoryNoteStore {
    fn load_owned(&self, owner: PrincipalId, id: NoteId) -> Result<Option<Note>> {
        let notes = self.notes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(notes.get(&(owner, id)).cloned())
    }

    fn compare_and_swap(&self, expected: Version, replacement: &Note) -> Result<CasOutcome> {
        let mut notes = self.notes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match notes.get_mut(&(replacement.owner_id, replacement.id)) {
            None => Ok(CasOutcome::Missing),
            Some(current) if current.version != expected => Ok(CasOutcome::Stale {
                current: current.version,
            }),
            Some(current) => {
                *current = replacement.clone();
                Ok(CasOutcome::Applied(replacement.clone()))
            }
        }
    }
}

/// Wraps a store and commits a competing update right before the first
/// conditional write, simulating a writer that wins the race.
pub struct RacingNoteStore<'a> {
    inner: &'a MemoryNoteStore,
    competing_title: String,
    fired: AtomicBool,
}

impl<'a> RacingNoteStore<'a> {
    pub fn new(inner: &'a MemoryNoteStore, competing_title: &str) -> Self {
        RacingNoteStore {
            inner,
            competing_title: competing_title.to_string(),
            fired: AtomicBool::new(false),
        }
    }
}

impl NoteStore for RacingNoteStore<'_> {
    fn load_owned(&self, owner: PrincipalId, id: NoteId) -> Result<Option<Note>> {
        self.inner.load_owned(owner, id)
    }

    fn compare_and_swap(&self, expected: Version, replacement: &Note) -> Result<CasOutcome> {
        if !self.fired.swap(true, Ordering::SeqCst) {
            if let Some(current) = self.inner.load_owned(replacement.owner_id, replacement.id)? {
                let mut winner = current.clone();
                winner.title = self.competing_title.clone();
                winner.version = current.version.next().unwrap_or(current.version);
                self.inner.compare_and_swap(current.version, &winner)?;
            }
        }
        self.inner.compare_and_swap(expected, replacement)
    }
}

/// In-memory [`PrincipalLookup`]
#[derive(Default)]
pub struct MemoryPrincipals {
    principals: Mutex<BTreeMap<PrincipalId, Principal>>,
}

impl MemoryPrincipals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, principal: Principal) {
        self.principals
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(principal.id, principal);
    }
}

impl PrincipalLookup for MemoryPrincipals {
    fn find_principal(&self, id: PrincipalId) -> Result<Option<Principal>> {
        let principals = self
            .principals
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(principals.get(&id).cloned())
    }
}
