//! Note records, keyed by owner so every lookup is ownership-scoped

use crate::{storage_error, StorageEngine};
use chrono::Utc;
use quill_core::*;
use tracing::debug;

/// Persistent note storage
#[derive(Clone)]
pub struct NoteRepository {
    engine: StorageEngine,
}

impl NoteRepository {
    pub fn new(engine: StorageEngine) -> Self {
        NoteRepository { engine }
    }

    /// Create a note for `owner` at the initial version
    pub fn create(&self, owner: PrincipalId, fields: NewNote) -> Result<Note> {
        let mut tx = self.engine.keyspace().write_tx();
        let id = NoteId::new(self.engine.next_sequence(&mut tx, "note")?);
        let note = Note::new(id, owner, fields, Utc::now());

        tx.insert(
            &self.engine.notes,
            note_key(owner, id).as_bytes(),
            serde_json::to_vec(&note)?,
        );
        self.engine.commit(tx)?;

        debug!(note = %id, owner = %owner, "note created");
        Ok(note)
    }

    /// Fetch one of `owner`'s notes
    pub fn get(&self, owner: PrincipalId, id: NoteId) -> Result<Option<Note>> {
        let tx = self.engine.keyspace().read_tx();
        match tx
            .get(&self.engine.notes, note_key(owner, id).as_bytes())
            .map_err(storage_error)?
        {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Page through `owner`'s notes in id order
    pub fn list(&self, owner: PrincipalId, skip: usize, limit: usize) -> Result<Vec<Note>> {
        let tx = self.engine.keyspace().read_tx();
        let prefix = owner_prefix(owner);

        let mut notes = Vec::new();
        for item in tx.prefix(&self.engine.notes, prefix.as_bytes()).skip(skip).take(limit) {
            let (_key, value) = item.map_err(storage_error)?;
            notes.push(serde_json::from_slice(&value)?);
        }

        Ok(notes)
    }

    /// Remove one of `owner`'s notes. There is no version precondition.
    pub fn delete(&self, owner: PrincipalId, id: NoteId) -> Result<()> {
        let key = note_key(owner, id);
        let mut tx = self.engine.keyspace().write_tx();

        if tx
            .get(&self.engine.notes, key.as_bytes())
            .map_err(storage_error)?
            .is_none()
        {
            return Err(QuillError::NotFound);
        }

        tx.remove(&self.engine.notes, key.as_bytes());
        self.engine.commit(tx)?;

        debug!(note = %id, owner = %owner, "note deleted");
        Ok(())
    }
}

impl NoteStore for NoteRepository {
    fn load_owned(&self, owner: PrincipalId, id: NoteId) -> Result<Option<Note>> {
        self.get(owner, id)
    }

    fn compare_and_swap(&self, expected: Version, replacement: &Note) -> Result<CasOutcome> {
        let key = note_key(replacement.owner_id, replacement.id);
        let mut tx = self.engine.keyspace().write_tx();

        let current: Note = match tx
            .get(&self.engine.notes, key.as_bytes())
            .map_err(storage_error)?
        {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => return Ok(CasOutcome::Missing),
        };

        if current.version != expected {
            return Ok(CasOutcome::Stale {
                current: current.version,
            });
        }

        tx.insert(&self.engine.notes, key.as_bytes(), serde_json::to_vec(replacement)?);
        self.engine.commit(tx)?;

        Ok(CasOutcome::Applied(replacement.clone()))
    }
}

fn owner_prefix(owner: PrincipalId) -> String {
    format!("note:{:020}:", owner.get())
}

fn note_key(owner: PrincipalId, id: NoteId) -> String {
    format!("{}{:020}", owner_prefix(owner), id.get())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(title: &str) -> NewNote {
        NewNote {
            title: title.to_string(),
            content: format!("{} content", title),
        }
    }

    fn repository() -> (NoteRepository, tempfile::TempDir) {
        let (engine, temp) = StorageEngine::temp().unwrap();
        (NoteRepository::new(engine), temp)
    }

    #[test]
    fn test_create_and_get() {
        let (notes, _temp) = repository();
        let owner = PrincipalId::new(1);

        let note = notes.create(owner, fields("first")).unwrap();
        assert_eq!(note.version, Version::INITIAL);
        assert_eq!(note.created_at, note.updated_at);

        let loaded = notes.get(owner, note.id).unwrap().unwrap();
        assert_eq!(loaded, note);
    }

    #[test]
    fn test_notes_are_owner_scoped() {
        let (notes, _temp) = repository();
        let alice = PrincipalId::new(1);
        let bob = PrincipalId::new(2);

        let note = notes.create(alice, fields("private")).unwrap();

        assert!(notes.get(bob, note.id).unwrap().is_none());
        assert!(notes.list(bob, 0, 100).unwrap().is_empty());
        assert!(matches!(notes.delete(bob, note.id), Err(QuillError::NotFound)));
        assert!(notes.get(alice, note.id).unwrap().is_some());
    }

    #[test]
    fn test_list_pages_in_id_order() {
        let (notes, _temp) = repository();
        let owner = PrincipalId::new(3);
        let other = PrincipalId::new(30);

        // Ids above 9 check that ordering is numeric, not lexical.
        for i in 0..12 {
            notes.create(owner, fields(&format!("n{}", i))).unwrap();
            notes.create(other, fields("noise")).unwrap();
        }

        let all = notes.list(owner, 0, 100).unwrap();
        assert_eq!(all.len(), 12);
        assert!(all.windows(2).all(|w| w[0].id < w[1].id));
        assert!(all.iter().all(|n| n.owner_id == owner));

        let page = notes.list(owner, 10, 5).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].title, "n10");

        assert!(notes.list(owner, 0, 0).unwrap().is_empty());
    }

    #[test]
    fn test_delete_then_not_found() {
        let (notes, _temp) = repository();
        let owner = PrincipalId::new(1);
        let note = notes.create(owner, fields("doomed")).unwrap();

        notes.delete(owner, note.id).unwrap();

        assert!(notes.get(owner, note.id).unwrap().is_none());
        assert!(matches!(notes.delete(owner, note.id), Err(QuillError::NotFound)));
    }

    #[test]
    fn test_compare_and_swap_outcomes() {
        let (notes, _temp) = repository();
        let owner = PrincipalId::new(1);
        let note = notes.create(owner, fields("cas")).unwrap();

        let mut replacement = note.clone();
        replacement.title = "swapped".to_string();
        replacement.version = Version::new(2);

        match notes.compare_and_swap(Version::new(5), &replacement).unwrap() {
            CasOutcome::Stale { current } => assert_eq!(current, Version::INITIAL),
            other => panic!("expected stale, got {:?}", other),
        }

        assert!(matches!(
            notes.compare_and_swap(Version::INITIAL, &replacement).unwrap(),
            CasOutcome::Applied(_)
        ));
        assert_eq!(notes.get(owner, note.id).unwrap().unwrap().title, "swapped");

        notes.delete(owner, note.id).unwrap();
        assert!(matches!(
            notes.compare_and_swap(Version::new(2), &replacement).unwrap(),
            CasOutcome::Missing
        ));
    }
}
