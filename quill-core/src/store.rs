//! Storage contracts the core depends on
//!
//! Implementations live outside this crate (see `quill-engine`). The core
//! only relies on the guarantees documented here.

use crate::{Note, NoteId, Principal, PrincipalId, Result, Version};

/// Read access to registered principals
pub trait PrincipalLookup: Send + Sync {
    /// Fetch a principal by id
    fn find_principal(&self, id: PrincipalId) -> Result<Option<Principal>>;
}

/// Outcome of a conditional note write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasOutcome {
    /// The precondition held and the replacement was committed
    Applied(Note),
    /// The persisted version no longer matched; carries the current one
    Stale { current: Version },
    /// The note disappeared (or never belonged to this owner)
    Missing,
}

/// Note persistence used by the optimistic update protocol
pub trait NoteStore: Send + Sync {
    /// Load a note by id, scoped to its owner
    fn load_owned(&self, owner: PrincipalId, id: NoteId) -> Result<Option<Note>>;

    /// Replace the note identified by `replacement.owner_id` and
    /// `replacement.id` only if its persisted version still equals
    /// `expected`.
    ///
    /// The version check and the write must happen as one atomic
    /// operation. A separate read followed by a write does not satisfy
    /// this contract.
    fn compare_and_swap(&self, expected: Version, replacement: &Note) -> Result<CasOutcome>;
}
