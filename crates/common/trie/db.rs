use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::TrieError;
use crate::node_hash::NodeHash;

/// Store for trie nodes, keyed by node hash. Nodes are content-addressed
/// and never deleted, so any previously committed root stays readable
/// until the store is pruned.
pub trait TrieDB: Send + Sync {
    fn get(&self, key: NodeHash) -> Result<Option<Vec<u8>>, TrieError>;
    fn put(&self, key: NodeHash, value: Vec<u8>) -> Result<(), TrieError>;
    fn put_batch(&self, key_values: Vec<(NodeHash, Vec<u8>)>) -> Result<(), TrieError>;
}

/// Node store over a shared in-memory map. Handles built from the same
/// map observe each other's writes, which reopen-at-root tests lean on.
#[derive(Default)]
pub struct InMemoryTrieDB {
    nodes: Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>,
}

type NodeGuard<'a> = MutexGuard<'a, HashMap<Vec<u8>, Vec<u8>>>;

impl InMemoryTrieDB {
    pub fn new(nodes: Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>) -> Self {
        Self { nodes }
    }

    fn nodes(&self) -> Result<NodeGuard<'_>, TrieError> {
        self.nodes.lock().map_err(|_| TrieError::LockError)
    }
}

impl TrieDB for InMemoryTrieDB {
    fn get(&self, key: NodeHash) -> Result<Option<Vec<u8>>, TrieError> {
        Ok(self.nodes()?.get(key.as_ref()).cloned())
    }

    fn put(&self, key: NodeHash, value: Vec<u8>) -> Result<(), TrieError> {
        self.nodes()?.insert(key.as_ref().to_vec(), value);
        Ok(())
    }

    fn put_batch(&self, key_values: Vec<(NodeHash, Vec<u8>)>) -> Result<(), TrieError> {
        let mut nodes = self.nodes()?;
        for (key, value) in key_values {
            nodes.insert(key.as_ref().to_vec(), value);
        }
        Ok(())
    }
}
