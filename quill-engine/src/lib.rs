//! Storage engine implementation using fjall
//!
//! Every mutation runs inside a single fjall write transaction. Write
//! transactions are serialized by the keyspace, which is what makes
//! read-check-write sequences (uniqueness checks, conditional note writes)
//! atomic.

use fjall::{Config, PartitionCreateOptions, PersistMode, TransactionalKeyspace, TransactionalPartitionHandle, WriteTransaction};
use quill_core::*;
use std::path::Path;
use std::sync::Arc;
use tracing::error;

pub mod notes;
pub mod principals;

pub use notes::*;
pub use principals::*;

const NOTES_PARTITION: &str = "notes";
const PRINCIPALS_PARTITION: &str = "principals";
const META_PARTITION: &str = "meta";

/// Storage engine wrapping a transactional fjall keyspace
#[derive(Clone)]
pub struct StorageEngine {
    keyspace: Arc<TransactionalKeyspace>,
    pub(crate) notes: TransactionalPartitionHandle,
    pub(crate) principals: TransactionalPartitionHandle,
    pub(crate) meta: TransactionalPartitionHandle,
}

impl StorageEngine {
    /// Create new storage engine at the given path
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let keyspace = Config::new(path)
            .open_transactional()
            .map_err(storage_error)?;

        let notes = open_partition(&keyspace, NOTES_PARTITION)?;
        let principals = open_partition(&keyspace, PRINCIPALS_PARTITION)?;
        let meta = open_partition(&keyspace, META_PARTITION)?;

        Ok(StorageEngine {
            keyspace: Arc::new(keyspace),
            notes,
            principals,
            meta,
        })
    }

    /// Create temporary storage engine for testing
    #[cfg(any(test, feature = "test-utils"))]
    pub fn temp() -> Result<(Self, tempfile::TempDir)> {
        let temp_dir = tempfile::tempdir()
            .map_err(|e| QuillError::Internal(e.to_string()))?;
        let engine = Self::new(temp_dir.path())?;
        Ok((engine, temp_dir))
    }

    pub(crate) fn keyspace(&self) -> &TransactionalKeyspace {
        &self.keyspace
    }

    /// Commit `tx` and make it durable.
    ///
    /// Once the commit succeeds the write is visible to every reader, so a
    /// failed sync afterwards is logged rather than returned.
    pub(crate) fn commit(&self, tx: WriteTransaction) -> Result<()> {
        tx.commit().map_err(storage_error)?;
        settle_persist(self.persist());
        Ok(())
    }

    /// Persist all changes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace
            .persist(PersistMode::SyncAll)
            .map_err(storage_error)
    }

    /// Allocate the next value of the named sequence inside `tx`; sequences start at 1
    pub(crate) fn next_sequence(&self, tx: &mut WriteTransaction, name: &str) -> Result<u64> {
        let key = format!("seq:{}", name);
        let current = match tx.get(&self.meta, key.as_bytes()).map_err(storage_error)? {
            Some(bytes) => decode_u64(&bytes)?,
            None => 0,
        };

        let next = current
            .checked_add(1)
            .ok_or_else(|| QuillError::Internal(format!("sequence '{}' exhausted", name)))?;
        tx.insert(&self.meta, key.as_bytes(), next.to_le_bytes().to_vec());
        Ok(next)
    }
}

fn open_partition(keyspace: &TransactionalKeyspace, name: &str) -> Result<TransactionalPartitionHandle> {
    keyspace
        .open_partition(name, PartitionCreateOptions::default())
        .map_err(storage_error)
}

fn settle_persist(persisted: Result<()>) {
    if let Err(e) = persisted {
        error!(error = %e, "write committed but not yet synced to disk");
    }
}

pub(crate) fn storage_error(e: impl std::fmt::Display) -> QuillError {
    QuillError::Storage(e.to_string())
}

pub(crate) fn decode_u64(bytes: &[u8]) -> Result<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| QuillError::Storage(format!("expected 8-byte counter, got {} bytes", bytes.len())))?;
    Ok(u64::from_le_bytes(raw))
}
