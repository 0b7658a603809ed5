//! Backing stores of the two state tries.
//!
//! `StateDB` is the overlay database: a write-buffering layer over a
//! shared [`KeyValueDB`] handle. Trie node flushes, code blobs and
//! secure-key preimages all accumulate in the buffer and reach the backend
//! only on `commit()`; `rollback()` drops them. Each trie owns one
//! `StateDB` and the two never share a keyspace on disk because they open
//! distinct paths.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ethereum_types::H256;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::{info, warn};

use quanta_common::constants::DATABASE_VERSION;
use quanta_trie::{NodeHash, TrieDB, TrieError};

use crate::error::StoreError;

const STATE_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("State");

/// Suffix appended to a hashed key to address its stored preimage.
const PREIMAGE_SUFFIX: &[u8] = b"aux";

/// What to do with an existing database directory on open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithExisting {
    /// Reuse whatever is on disk.
    Trust,
    /// Wipe the versioned directory and start over.
    Kill,
}

/// Raw persistent key/value backend. Writes land as a single batch so a
/// block's flush is all-or-nothing as far as the backend can provide.
pub trait KeyValueDB: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
    fn write_batch(&self, batch: Vec<(Vec<u8>, Option<Vec<u8>>)>) -> Result<(), StoreError>;
}

/// In-memory backend over a shareable map, for tests and throwaway
/// states.
#[derive(Default, Clone)]
pub struct InMemoryKv {
    inner: Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueDB for InMemoryKv {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .inner
            .lock()
            .map_err(|_| StoreError::LockError)?
            .get(key)
            .cloned())
    }

    fn write_batch(&self, batch: Vec<(Vec<u8>, Option<Vec<u8>>)>) -> Result<(), StoreError> {
        let mut map = self.inner.lock().map_err(|_| StoreError::LockError)?;
        for (key, value) in batch {
            match value {
                Some(value) => {
                    map.insert(key, value);
                }
                None => {
                    map.remove(&key);
                }
            }
        }
        Ok(())
    }
}

/// `redb` file backend: a single table holding trie nodes, code blobs and
/// preimages.
pub struct RedbKv {
    db: Database,
}

impl RedbKv {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = Database::create(path).map_err(map_database_error)?;
        Ok(Self { db })
    }
}

fn map_database_error(err: redb::DatabaseError) -> StoreError {
    match err {
        redb::DatabaseError::DatabaseAlreadyOpen => StoreError::DatabaseAlreadyOpen,
        redb::DatabaseError::Storage(redb::StorageError::Io(io))
            if io.kind() == std::io::ErrorKind::StorageFull =>
        {
            StoreError::NotEnoughAvailableSpace
        }
        other => StoreError::Backend(other.into()),
    }
}

impl KeyValueDB for RedbKv {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| StoreError::Backend(e.into()))?;
        let table = match txn.open_table(STATE_TABLE) {
            Ok(table) => table,
            // Nothing was ever written
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(StoreError::Backend(e.into())),
        };
        Ok(table
            .get(key)
            .map_err(|e| StoreError::Backend(e.into()))?
            .map(|guard| guard.value().to_vec()))
    }

    fn write_batch(&self, batch: Vec<(Vec<u8>, Option<Vec<u8>>)>) -> Result<(), StoreError> {
        let txn = self
            .db
            .begin_write()
            .map_err(|e| StoreError::Backend(e.into()))?;
        {
            let mut table = txn
                .open_table(STATE_TABLE)
                .map_err(|e| StoreError::Backend(e.into()))?;
            for (key, value) in batch {
                match value {
                    Some(value) => {
                        table
                            .insert(key.as_slice(), value.as_slice())
                            .map_err(|e| StoreError::Backend(e.into()))?;
                    }
                    None => {
                        table
                            .remove(key.as_slice())
                            .map_err(|e| StoreError::Backend(e.into()))?;
                    }
                }
            }
        }
        txn.commit().map_err(|e| StoreError::Backend(e.into()))?;
        Ok(())
    }
}

struct StateDbInner {
    backend: Arc<dyn KeyValueDB>,
    pending: Mutex<HashMap<Vec<u8>, Option<Vec<u8>>>>,
    lock_path: Option<PathBuf>,
}

impl Drop for StateDbInner {
    fn drop(&mut self) {
        if let Some(lock) = &self.lock_path {
            let _ = fs::remove_file(lock);
        }
    }
}

/// The overlay database. Cloning shares the buffer and the backend, so
/// the account trie, its storage tries and the code blob reads all observe
/// one coherent pending view.
#[derive(Clone)]
pub struct StateDB {
    inner: Arc<StateDbInner>,
}

impl StateDB {
    pub fn new(backend: Arc<dyn KeyValueDB>) -> Self {
        Self {
            inner: Arc::new(StateDbInner {
                backend,
                pending: Mutex::new(HashMap::new()),
                lock_path: None,
            }),
        }
    }

    /// Fresh in-memory overlay; nothing survives the handle.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryKv::new()))
    }

    /// Opens the on-disk store for one trie under
    /// `<base>/<genesis4>/<version>/state/`, guarded by a lock file.
    pub fn open(
        base_path: &Path,
        genesis_hash: H256,
        with_existing: WithExisting,
    ) -> Result<Self, StoreError> {
        let dir = base_path
            .join(hex::encode(&genesis_hash.as_bytes()[..4]))
            .join(DATABASE_VERSION.to_string())
            .join("state");
        if with_existing == WithExisting::Kill && dir.exists() {
            info!(path = %dir.display(), "killing state database");
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;

        let lock_path = dir.join("LOCK");
        if let Err(err) = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            if err.kind() == std::io::ErrorKind::AlreadyExists {
                warn!(path = %dir.display(), "state database already open, bailing");
                return Err(StoreError::DatabaseAlreadyOpen);
            }
            if err.kind() == std::io::ErrorKind::StorageFull {
                warn!("not enough available space found on hard drive");
                return Err(StoreError::NotEnoughAvailableSpace);
            }
            return Err(err.into());
        }

        let backend = match RedbKv::open(&dir.join("state.redb")) {
            Ok(backend) => backend,
            Err(err) => {
                let _ = fs::remove_file(&lock_path);
                return Err(err);
            }
        };
        info!(path = %dir.display(), "opened state DB");
        Ok(Self {
            inner: Arc::new(StateDbInner {
                backend: Arc::new(backend),
                pending: Mutex::new(HashMap::new()),
                lock_path: Some(lock_path),
            }),
        })
    }

    /// Reads through the pending buffer into the backend.
    pub fn lookup(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let pending = self
            .inner
            .pending
            .lock()
            .map_err(|_| StoreError::LockError)?;
        if let Some(entry) = pending.get(key) {
            return Ok(entry.clone());
        }
        drop(pending);
        self.inner.backend.get(key)
    }

    pub fn insert(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StoreError> {
        self.inner
            .pending
            .lock()
            .map_err(|_| StoreError::LockError)?
            .insert(key, Some(value));
        Ok(())
    }

    pub fn remove(&self, key: Vec<u8>) -> Result<(), StoreError> {
        self.inner
            .pending
            .lock()
            .map_err(|_| StoreError::LockError)?
            .insert(key, None);
        Ok(())
    }

    /// Records the preimage of a secure trie key.
    pub fn insert_preimage(&self, hashed: H256, preimage: &[u8]) -> Result<(), StoreError> {
        self.insert(preimage_key(hashed), preimage.to_vec())
    }

    pub fn lookup_preimage(&self, hashed: H256) -> Result<Option<Vec<u8>>, StoreError> {
        self.lookup(&preimage_key(hashed))
    }

    /// Flushes the pending buffer to the backend as one batch.
    pub fn commit(&self) -> Result<(), StoreError> {
        let batch: Vec<_> = {
            let mut pending = self
                .inner
                .pending
                .lock()
                .map_err(|_| StoreError::LockError)?;
            pending.drain().collect()
        };
        self.inner.backend.write_batch(batch)
    }

    /// Drops every pending write.
    pub fn rollback(&self) -> Result<(), StoreError> {
        self.inner
            .pending
            .lock()
            .map_err(|_| StoreError::LockError)?
            .clear();
        Ok(())
    }
}

fn preimage_key(hashed: H256) -> Vec<u8> {
    let mut key = hashed.as_bytes().to_vec();
    key.extend_from_slice(PREIMAGE_SUFFIX);
    key
}

// The tries flush their node caches straight into the overlay.
impl TrieDB for StateDB {
    fn get(&self, key: NodeHash) -> Result<Option<Vec<u8>>, TrieError> {
        self.lookup(key.as_ref())
            .map_err(|e| TrieError::DbError(e.into()))
    }

    fn put(&self, key: NodeHash, value: Vec<u8>) -> Result<(), TrieError> {
        self.insert(key.as_ref().to_vec(), value)
            .map_err(|e| TrieError::DbError(e.into()))
    }

    fn put_batch(&self, key_values: Vec<(NodeHash, Vec<u8>)>) -> Result<(), TrieError> {
        for (key, value) in key_values {
            self.insert(key.as_ref().to_vec(), value)
                .map_err(|e| TrieError::DbError(e.into()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn overlay_reads_through_pending() {
        let db = StateDB::in_memory();
        assert_eq!(db.lookup(b"k").unwrap(), None);
        db.insert(b"k".to_vec(), b"v".to_vec()).unwrap();
        assert_eq!(db.lookup(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn rollback_discards_pending_writes() {
        let backend = Arc::new(InMemoryKv::new());
        let db = StateDB::new(backend.clone());
        db.insert(b"a".to_vec(), b"1".to_vec()).unwrap();
        db.rollback().unwrap();
        assert_eq!(db.lookup(b"a").unwrap(), None);
        assert_eq!(backend.get(b"a").unwrap(), None);
    }

    #[test]
    fn commit_flushes_to_backend() {
        let backend = Arc::new(InMemoryKv::new());
        let db = StateDB::new(backend.clone());
        db.insert(b"a".to_vec(), b"1".to_vec()).unwrap();
        db.insert(b"b".to_vec(), b"2".to_vec()).unwrap();
        db.remove(b"b".to_vec()).unwrap();
        db.commit().unwrap();
        assert_eq!(backend.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(backend.get(b"b").unwrap(), None);
        // a second handle over the same backend sees the data
        let other = StateDB::new(backend);
        assert_eq!(other.lookup(b"a").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn deletion_shadows_backend_until_commit() {
        let backend = Arc::new(InMemoryKv::new());
        backend
            .write_batch(vec![(b"a".to_vec(), Some(b"1".to_vec()))])
            .unwrap();
        let db = StateDB::new(backend.clone());
        db.remove(b"a".to_vec()).unwrap();
        assert_eq!(db.lookup(b"a").unwrap(), None);
        assert_eq!(backend.get(b"a").unwrap(), Some(b"1".to_vec()));
        db.commit().unwrap();
        assert_eq!(backend.get(b"a").unwrap(), None);
    }
}
