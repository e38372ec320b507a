//! Optimistic concurrency control for note updates
//!
//! An update names the version it was built on. It is accepted only if that
//! version is still the persisted one at commit time; otherwise the caller
//! receives [`QuillError::VersionConflict`] carrying the current version and
//! is expected to reload and retry. Nothing here blocks or waits.

use crate::{CasOutcome, Note, NoteId, NotePatch, NoteStore, Principal, QuillError, Result, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// An update request as seen by the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteUpdate {
    /// Version the caller built the change on
    pub version: Version,
    #[serde(flatten)]
    pub patch: NotePatch,
}

/// Runs the update protocol against a [`NoteStore`]
pub struct ConcurrencyController<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: NoteStore + ?Sized> ConcurrencyController<'a, S> {
    pub fn new(store: &'a S) -> Self {
        ConcurrencyController { store }
    }

    /// Apply `update` to the owner's note `note_id`
    pub fn update(&self, owner: &Principal, note_id: NoteId, update: &NoteUpdate) -> Result<Note> {
        self.update_at(owner, note_id, update, Utc::now())
    }

    /// Same as [`update`](Self::update) with an explicit clock
    pub fn update_at(
        &self,
        owner: &Principal,
        note_id: NoteId,
        update: &NoteUpdate,
        now: DateTime<Utc>,
    ) -> Result<Note> {
        // Ownership is part of the lookup key; a foreign note is simply absent.
        let loaded = self
            .store
            .load_owned(owner.id, note_id)?
            .ok_or(QuillError::NotFound)?;

        if loaded.version != update.version {
            debug!(
                note = %note_id,
                expected = %update.version,
                current = %loaded.version,
                "stale version rejected"
            );
            return Err(QuillError::VersionConflict {
                current: loaded.version,
            });
        }

        let mut replacement = update.patch.apply_to(&loaded);
        replacement.version = next_version(loaded.version)?;
        replacement.updated_at = now;

        match self.store.compare_and_swap(loaded.version, &replacement)? {
            CasOutcome::Applied(note) => {
                debug!(note = %note_id, version = %note.version, "update committed");
                Ok(note)
            }
            CasOutcome::Stale { current } => {
                debug!(
                    note = %note_id,
                    read = %loaded.version,
                    current = %current,
                    "lost conditional write race"
                );
                Err(QuillError::VersionConflict { current })
            }
            CasOutcome::Missing => Err(QuillError::NotFound),
        }
    }
}

fn next_version(current: Version) -> Result<Version> {
    current
        .next()
        .ok_or_else(|| QuillError::Internal(format!("version counter exhausted at {}", current)))
}
