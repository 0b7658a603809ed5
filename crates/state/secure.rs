//! Secure-keyed view over a Merkle-Patricia trie: every key is stored
//! under its keccak hash, and the preimage is recorded in the overlay's
//! aux space so iteration can hand back real keys (addresses, storage
//! slots). The hashing keeps trie paths uniform and adversary-resistant
//! without changing the canonical root rules.

use ethereum_types::H256;

use quanta_common::crypto::keccak;
use quanta_trie::{EMPTY_TRIE_HASH, Trie};

use crate::db::StateDB;
use crate::error::StateError;

pub struct SecureTrie {
    trie: Trie,
    db: StateDB,
}

impl SecureTrie {
    /// A trie anchored at the canonical empty root.
    pub fn new(db: StateDB) -> Self {
        Self {
            trie: Trie::new(Box::new(db.clone())),
            db,
        }
    }

    /// Rebase onto an existing root; O(1), nothing is read until the
    /// first lookup.
    pub fn open(db: StateDB, root: H256) -> Self {
        Self {
            trie: Trie::open(Box::new(db.clone()), root),
            db,
        }
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        Ok(self.trie.get(&keccak(key).as_bytes().to_vec())?)
    }

    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), StateError> {
        let hashed = keccak(key);
        self.db.insert_preimage(hashed, key)?;
        self.trie.insert(hashed.as_bytes().to_vec(), value)?;
        Ok(())
    }

    pub fn remove(&mut self, key: &[u8]) -> Result<(), StateError> {
        self.trie.remove(keccak(key).as_bytes().to_vec())?;
        Ok(())
    }

    /// Current root over the in-memory node state.
    pub fn root(&self) -> H256 {
        self.trie.hash_no_commit()
    }

    /// Drains the node cache into the overlay and returns the root.
    pub fn commit(&mut self) -> Result<H256, StateError> {
        Ok(self.trie.hash()?)
    }

    /// Rebase to a recorded root, discarding uncommitted nodes.
    pub fn set_root(&mut self, root: H256) {
        self.trie = Trie::open(Box::new(self.db.clone()), root);
    }

    /// Installs the canonical empty-trie root.
    pub fn init(&mut self) {
        self.set_root(*EMPTY_TRIE_HASH);
    }

    /// All live `(key, value)` pairs, with keys recovered through the
    /// preimage records. A missing preimage means the aux space is out of
    /// sync with the trie and surfaces as `InvalidTrie`.
    pub fn iterate(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StateError> {
        let mut entries = Vec::new();
        for (hashed_path, value) in self.trie.iter().content() {
            if hashed_path.len() != 32 {
                return Err(StateError::InvalidTrie);
            }
            let hashed = H256::from_slice(&hashed_path);
            let key = self
                .db
                .lookup_preimage(hashed)?
                .ok_or(StateError::InvalidTrie)?;
            entries.push((key, value));
        }
        Ok(entries)
    }

    /// Ref-enforced structural verification from the current root.
    pub fn is_trie_good(&self) -> bool {
        self.trie.verify_integrity().is_ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn get_insert_remove_roundtrip() {
        let mut trie = SecureTrie::new(StateDB::in_memory());
        assert_eq!(trie.get(b"alpha").unwrap(), None);
        trie.insert(b"alpha", b"1".to_vec()).unwrap();
        trie.insert(b"beta", b"2".to_vec()).unwrap();
        assert_eq!(trie.get(b"alpha").unwrap(), Some(b"1".to_vec()));
        trie.remove(b"alpha").unwrap();
        assert_eq!(trie.get(b"alpha").unwrap(), None);
        assert_eq!(trie.get(b"beta").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn empty_root_is_canonical() {
        let trie = SecureTrie::new(StateDB::in_memory());
        assert_eq!(trie.root(), *EMPTY_TRIE_HASH);
    }

    #[test]
    fn set_root_rebases_reads() {
        let db = StateDB::in_memory();
        let mut trie = SecureTrie::new(db.clone());
        trie.insert(b"alpha", b"1".to_vec()).unwrap();
        let root_one = trie.commit().unwrap();
        trie.insert(b"beta", b"2".to_vec()).unwrap();
        let root_two = trie.commit().unwrap();
        assert_ne!(root_one, root_two);

        let mut reopened = SecureTrie::open(db, root_one);
        assert_eq!(reopened.get(b"alpha").unwrap(), Some(b"1".to_vec()));
        assert_eq!(reopened.get(b"beta").unwrap(), None);
        reopened.set_root(root_two);
        assert_eq!(reopened.get(b"beta").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn iterate_recovers_preimages() {
        let mut trie = SecureTrie::new(StateDB::in_memory());
        trie.insert(b"one", vec![1]).unwrap();
        trie.insert(b"two", vec![2]).unwrap();
        trie.commit().unwrap();
        let mut entries = trie.iterate().unwrap();
        entries.sort();
        assert_eq!(
            entries,
            vec![(b"one".to_vec(), vec![1]), (b"two".to_vec(), vec![2])]
        );
    }
}
