pub mod db;
pub mod error;
mod nibbles;
mod node;
mod node_hash;
mod state;
mod trie_iter;

use ethereum_types::H256;
use quanta_rlp::constants::RLP_NULL;
use sha3::{Digest, Keccak256};

pub use self::db::{InMemoryTrieDB, TrieDB};
pub use self::error::TrieError;
pub use self::nibbles::Nibbles;
pub use self::node::{BranchNode, ExtensionNode, LeafNode, Node};
pub use self::node_hash::NodeHash;
pub use self::state::TrieState;
pub use self::trie_iter::TrieIterator;

use lazy_static::lazy_static;

lazy_static! {
    // Hash of an empty trie, equal to keccak(RLP_NULL)
    pub static ref EMPTY_TRIE_HASH: H256 = H256::from_slice(
        Keccak256::new()
            .chain_update([RLP_NULL])
            .finalize()
            .as_slice(),
    );
}

/// RLP-encoded trie path
pub type PathRLP = Vec<u8>;
/// RLP-encoded trie value
pub type ValueRLP = Vec<u8>;

/// Ethereum Compatible Merkle Patricia Trie over a pluggable node store
pub struct Trie {
    /// Reference to the current root node
    root: Option<NodeHash>,
    /// Contains the trie's nodes
    pub(crate) state: TrieState,
}

impl Trie {
    /// An empty trie over a fresh store.
    pub fn new(db: Box<dyn TrieDB>) -> Self {
        Self {
            state: TrieState::new(db),
            root: None,
        }
    }

    /// A trie over an already-populated store, anchored at `root`.
    /// This is the O(1) rebase used for reorgs and snapshot reads: no node
    /// is touched until the first lookup.
    pub fn open(db: Box<dyn TrieDB>, root: H256) -> Self {
        let root = (root != *EMPTY_TRIE_HASH).then_some(NodeHash::from(root));
        Self {
            state: TrieState::new(db),
            root,
        }
    }

    /// Looks a value up by its path.
    pub fn get(&self, path: &PathRLP) -> Result<Option<ValueRLP>, TrieError> {
        match &self.root {
            Some(root) => {
                let root_node = self
                    .state
                    .get_node(root.clone())?
                    .ok_or(TrieError::InconsistentTree)?;
                root_node.get(&self.state, Nibbles::from_bytes(path))
            }
            None => Ok(None),
        }
    }

    /// Stores a value under a path, replacing any previous value there.
    pub fn insert(&mut self, path: PathRLP, value: ValueRLP) -> Result<(), TrieError> {
        match self.root.take() {
            Some(root) => {
                let root_node = self
                    .state
                    .get_node(root)?
                    .ok_or(TrieError::InconsistentTree)?;
                let root_node =
                    root_node.insert(&mut self.state, Nibbles::from_bytes(&path), value)?;
                self.root = Some(root_node.insert_self(&mut self.state)?);
            }
            None => {
                // first entry: the whole trie is one leaf
                let leaf = Node::from(LeafNode::new(Nibbles::from_bytes(&path), value));
                self.root = Some(leaf.insert_self(&mut self.state)?);
            }
        }
        Ok(())
    }

    /// Removes the value under a path, handing it back if it was stored.
    pub fn remove(&mut self, path: PathRLP) -> Result<Option<ValueRLP>, TrieError> {
        let Some(root) = self.root.take() else {
            return Ok(None);
        };
        let root_node = self
            .state
            .get_node(root)?
            .ok_or(TrieError::InconsistentTree)?;
        let (root_node, old_value) =
            root_node.remove(&mut self.state, Nibbles::from_bytes(&path))?;
        self.root = root_node
            .map(|node| node.insert_self(&mut self.state))
            .transpose()?;
        Ok(old_value)
    }

    /// Root hash after committing pending nodes to the store.
    /// An empty trie hashes to keccak(RLP_NULL).
    pub fn hash(&mut self) -> Result<H256, TrieError> {
        self.commit()?;
        Ok(self.hash_no_commit())
    }

    /// Root hash over the in-memory state, leaving pending nodes uncommitted.
    pub fn hash_no_commit(&self) -> H256 {
        self.root
            .as_ref()
            .map(|root| root.finalize())
            .unwrap_or(*EMPTY_TRIE_HASH)
    }

    /// Flushes the node cache into the store, keeping only nodes reachable
    /// from the current root.
    pub fn commit(&mut self) -> Result<(), TrieError> {
        if let Some(root) = self.root.clone() {
            self.state.commit(&root)?;
        }
        Ok(())
    }

    /// Walks the whole trie from the current root, checking that every
    /// referenced node resolves. A dangling reference means the backing
    /// store lost nodes (or the root is foreign to it).
    pub fn verify_integrity(&self) -> Result<(), TrieError> {
        if let Some(root) = self.root.clone() {
            self.verify_node(root)?;
        }
        Ok(())
    }

    fn verify_node(&self, hash: NodeHash) -> Result<(), TrieError> {
        let node = self
            .state
            .get_node(hash)?
            .ok_or(TrieError::InconsistentTree)?;
        match node {
            Node::Branch(branch) => {
                for choice in branch.choices.iter() {
                    if choice.is_valid() {
                        self.verify_node(choice.clone())?;
                    }
                }
            }
            Node::Extension(extension) => self.verify_node(extension.child)?,
            Node::Leaf(_) => {}
        }
        Ok(())
    }

    /// Iterator over all (path, value) leaf pairs, ordered by path.
    pub fn iter(&self) -> TrieIterator<'_> {
        TrieIterator::new(&self.state, self.root.clone())
    }

    #[cfg(test)]
    /// A throwaway trie over its own in-memory store.
    pub(crate) fn new_temp() -> Self {
        use std::collections::HashMap;
        use std::sync::{Arc, Mutex};

        let map = Arc::new(Mutex::new(HashMap::new()));
        Trie::new(Box::new(InMemoryTrieDB::new(map)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::collection::{btree_map, btree_set, vec};
    use proptest::prelude::*;

    // Fixtures shaped like this engine's tries: 32-byte keccak paths (the
    // secure-keyed account and storage views) with record-sized payloads.
    fn hashed_path(seed: &[u8]) -> Vec<u8> {
        Keccak256::digest(seed).to_vec()
    }

    fn record(tag: u8) -> Vec<u8> {
        // roughly an RLP-encoded account 4-tuple
        vec![tag; 70]
    }

    #[test]
    fn empty_trie_hashes_to_the_genesis_root() {
        // both roots of a genesis header anchor at keccak(RLP_NULL)
        let mut trie = Trie::new_temp();
        let expected = H256::from_slice(Keccak256::digest([RLP_NULL]).as_slice());
        assert_eq!(trie.hash().unwrap(), expected);
        assert_eq!(*EMPTY_TRIE_HASH, expected);
    }

    #[test]
    fn lookups_return_what_was_stored() {
        let mut trie = Trie::new_temp();
        let alpha = hashed_path(b"alpha");
        let beta = hashed_path(b"beta");
        assert_eq!(trie.get(&alpha).unwrap(), None);

        trie.insert(alpha.clone(), record(1)).unwrap();
        trie.insert(beta.clone(), record(2)).unwrap();
        assert_eq!(trie.get(&alpha).unwrap(), Some(record(1)));
        assert_eq!(trie.get(&beta).unwrap(), Some(record(2)));
        assert_eq!(trie.get(&hashed_path(b"gamma")).unwrap(), None);
    }

    #[test]
    fn overwriting_replaces_value_and_restores_prior_root() {
        let mut trie = Trie::new_temp();
        let path = hashed_path(b"account");
        trie.insert(path.clone(), record(1)).unwrap();
        let first_root = trie.hash().unwrap();

        trie.insert(path.clone(), record(2)).unwrap();
        assert_ne!(trie.hash().unwrap(), first_root);
        assert_eq!(trie.get(&path).unwrap(), Some(record(2)));

        trie.insert(path.clone(), record(1)).unwrap();
        assert_eq!(trie.hash().unwrap(), first_root);
    }

    #[test]
    fn root_is_independent_of_insertion_order() {
        let entries: Vec<_> = (0u8..24)
            .map(|i| (hashed_path(&[i]), record(i)))
            .collect();

        let mut forward = Trie::new_temp();
        for (path, value) in &entries {
            forward.insert(path.clone(), value.clone()).unwrap();
        }
        let mut backward = Trie::new_temp();
        for (path, value) in entries.iter().rev() {
            backward.insert(path.clone(), value.clone()).unwrap();
        }
        assert_eq!(forward.hash().unwrap(), backward.hash().unwrap());
    }

    #[test]
    fn removal_undoes_insertion() {
        let mut trie = Trie::new_temp();
        let keep = hashed_path(b"keep");
        let doomed = hashed_path(b"doomed");
        trie.insert(keep.clone(), record(1)).unwrap();
        let before = trie.hash().unwrap();

        trie.insert(doomed.clone(), record(2)).unwrap();
        assert_eq!(trie.remove(doomed.clone()).unwrap(), Some(record(2)));
        assert_eq!(trie.remove(doomed).unwrap(), None);

        assert_eq!(trie.hash().unwrap(), before);
        assert_eq!(trie.get(&keep).unwrap(), Some(record(1)));
    }

    #[test]
    fn removal_collapses_to_the_canonical_shape() {
        // removing an entry must leave exactly the trie that would have
        // been built without it, however the branches collapse
        let paths: Vec<Vec<u8>> = ["a", "b", "c", "d"]
            .iter()
            .map(|seed| hashed_path(seed.as_bytes()))
            .collect();

        let mut pruned = Trie::new_temp();
        for (i, path) in paths.iter().enumerate() {
            pruned.insert(path.clone(), record(i as u8)).unwrap();
        }
        pruned.remove(paths[0].clone()).unwrap();
        pruned.remove(paths[2].clone()).unwrap();

        let mut rebuilt = Trie::new_temp();
        rebuilt.insert(paths[1].clone(), record(1)).unwrap();
        rebuilt.insert(paths[3].clone(), record(3)).unwrap();

        assert_eq!(pruned.hash().unwrap(), rebuilt.hash().unwrap());
    }

    #[test]
    fn variable_length_keys_coexist() {
        // the UTXO trie and tests feed byte keys of mixed lengths; paths
        // stay prefix-free thanks to the terminator
        let mut trie = Trie::new_temp();
        let keys: [&[u8]; 4] = [&[0xd7], &[0xd7, 0x99], &[0xd7, 0x99, 0xea], &[0x00]];
        for (i, key) in keys.iter().enumerate() {
            trie.insert(key.to_vec(), vec![i as u8 + 1]).unwrap();
        }
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(trie.get(&key.to_vec()).unwrap(), Some(vec![i as u8 + 1]));
        }
    }

    #[test]
    fn commit_then_open_at_root_reads_from_the_store() {
        use std::collections::HashMap;
        use std::sync::{Arc, Mutex};

        let store = Arc::new(Mutex::new(HashMap::new()));
        let mut trie = Trie::new(Box::new(InMemoryTrieDB::new(store.clone())));
        let sender = hashed_path(b"sender");
        let receiver = hashed_path(b"receiver");
        trie.insert(sender.clone(), record(1)).unwrap();
        trie.insert(receiver.clone(), record(2)).unwrap();
        let root = trie.hash().unwrap();
        drop(trie);

        let reopened = Trie::open(Box::new(InMemoryTrieDB::new(store)), root);
        assert_eq!(reopened.get(&sender).unwrap(), Some(record(1)));
        assert_eq!(reopened.get(&receiver).unwrap(), Some(record(2)));
        reopened.verify_integrity().unwrap();
    }

    #[test]
    fn opening_at_a_stale_root_sees_the_old_view() {
        use std::collections::HashMap;
        use std::sync::{Arc, Mutex};

        // the reorg path: roots recorded per block keep resolving because
        // nodes are never deleted
        let store = Arc::new(Mutex::new(HashMap::new()));
        let mut trie = Trie::new(Box::new(InMemoryTrieDB::new(store.clone())));
        let account = hashed_path(b"account");
        trie.insert(account.clone(), record(1)).unwrap();
        let old_root = trie.hash().unwrap();
        trie.insert(account.clone(), record(9)).unwrap();
        trie.insert(hashed_path(b"other"), record(2)).unwrap();
        trie.hash().unwrap();
        drop(trie);

        let rewound = Trie::open(Box::new(InMemoryTrieDB::new(store)), old_root);
        assert_eq!(rewound.get(&account).unwrap(), Some(record(1)));
        assert_eq!(rewound.get(&hashed_path(b"other")).unwrap(), None);
    }

    #[test]
    fn integrity_check_flags_a_lost_node() {
        use std::collections::HashMap;
        use std::sync::{Arc, Mutex};

        let store = Arc::new(Mutex::new(HashMap::new()));
        let mut trie = Trie::new(Box::new(InMemoryTrieDB::new(store.clone())));
        for i in 0u8..32 {
            trie.insert(hashed_path(&[i]), record(i)).unwrap();
        }
        let root = trie.hash().unwrap();
        drop(trie);

        let victim = {
            let nodes = store.lock().unwrap();
            nodes.keys().next().cloned().unwrap()
        };
        store.lock().unwrap().remove(&victim);

        let damaged = Trie::open(Box::new(InMemoryTrieDB::new(store)), root);
        assert!(damaged.verify_integrity().is_err());
    }

    proptest! {
        #[test]
        fn everything_inserted_is_retrievable(
            entries in btree_map(vec(any::<u8>(), 1..64), vec(any::<u8>(), 1..64), 1..48)
        ) {
            let mut trie = Trie::new_temp();
            for (path, value) in &entries {
                trie.insert(path.clone(), value.clone()).unwrap();
            }
            for (path, value) in &entries {
                prop_assert_eq!(trie.get(path).unwrap(), Some(value.clone()));
            }
        }

        #[test]
        fn removals_leave_the_rest_intact(
            entries in btree_map(vec(any::<u8>(), 1..48), vec(any::<u8>(), 1..48), 2..32),
            selector in any::<u64>()
        ) {
            let mut trie = Trie::new_temp();
            for (path, value) in &entries {
                trie.insert(path.clone(), value.clone()).unwrap();
            }
            // drop a pseudo-random half of the keys
            let doomed: Vec<_> = entries
                .keys()
                .enumerate()
                .filter(|(i, _)| (selector >> (i % 64)) & 1 == 1)
                .map(|(_, path)| path.clone())
                .collect();
            for path in &doomed {
                let removed = trie.remove(path.clone()).unwrap();
                prop_assert_eq!(removed.as_ref(), entries.get(path));
            }
            for (path, value) in &entries {
                let expected = (!doomed.contains(path)).then(|| value.clone());
                prop_assert_eq!(trie.get(path).unwrap(), expected);
            }
        }

        #[test]
        fn pruned_trie_matches_a_rebuilt_one(
            paths in btree_set(vec(any::<u8>(), 1..48), 2..32),
            selector in any::<u64>()
        ) {
            // canonical form: removal must converge to the same structure
            // as never inserting, whatever collapses happen on the way
            let mut pruned = Trie::new_temp();
            for path in &paths {
                pruned.insert(path.clone(), path.clone()).unwrap();
            }
            let mut rebuilt = Trie::new_temp();
            for (i, path) in paths.iter().enumerate() {
                if (selector >> (i % 64)) & 1 == 1 {
                    pruned.remove(path.clone()).unwrap();
                } else {
                    rebuilt.insert(path.clone(), path.clone()).unwrap();
                }
            }
            prop_assert_eq!(pruned.hash().unwrap(), rebuilt.hash().unwrap());
        }
    }
}
