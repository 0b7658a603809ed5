use std::cell::RefCell;
use std::collections::HashMap;

use crate::db::TrieDB;
use crate::error::TrieError;
use crate::node::Node;
use crate::node_hash::NodeHash;

// Node cache behind accessor methods. Lookups populate it lazily, which
// forces interior mutability; keeping the RefCell private to short-lived
// get/insert calls means no borrow can escape and panic later.
struct TrieStateCache {
    inner: RefCell<HashMap<NodeHash, Node>>,
}

impl TrieStateCache {
    pub fn new_empty() -> Self {
        Self {
            inner: Default::default(),
        }
    }

    pub fn insert(&self, key: NodeHash, value: Node) {
        self.inner.borrow_mut().insert(key, value);
    }

    pub fn get(&self, key: &NodeHash) -> Option<Node> {
        self.inner.borrow().get(key).cloned()
    }

    pub fn remove(&self, key: &NodeHash) -> Option<Node> {
        self.inner.borrow_mut().remove(key)
    }

    pub fn clear(&self) {
        self.inner.borrow_mut().clear();
    }
}

/// The trie's node state: a write-back cache of decoded nodes over the
/// node store. Mutations only touch the cache; `commit` persists the nodes
/// reachable from a root and drops everything else.
pub struct TrieState {
    db: Box<dyn TrieDB>,
    cache: TrieStateCache,
}

impl TrieState {
    /// A fresh node state over the given store.
    pub fn new(db: Box<dyn TrieDB>) -> TrieState {
        TrieState {
            db,
            cache: TrieStateCache::new_empty(),
        }
    }

    /// Resolves a node reference: inlined nodes decode straight from the
    /// reference, hashed ones go through the cache and then the store.
    pub fn get_node(&self, hash: NodeHash) -> Result<Option<Node>, TrieError> {
        if let NodeHash::Inline(encoded) = &hash {
            if !encoded.is_empty() {
                return Ok(Some(Node::decode_raw(encoded)?));
            }
            return Ok(None);
        }
        if let Some(node) = self.cache.get(&hash) {
            return Ok(Some(node));
        }
        let Some(node) = self
            .db
            .get(hash.clone())?
            .map(|rlp| Node::decode_raw(&rlp).map_err(TrieError::RLPDecode))
            .transpose()?
        else {
            return Ok(None);
        };
        self.cache.insert(hash, node.clone());
        Ok(Some(node))
    }

    /// Caches a node under its reference. Inlined nodes live inside their
    /// parent's encoding and are not tracked separately.
    pub fn insert_node(&mut self, node: Node, hash: NodeHash) {
        if matches!(hash, NodeHash::Hashed(_)) {
            self.cache.insert(hash, node);
        }
    }

    /// Flushes the nodes reachable from `root` to the store as one batch
    /// and drops the cache; orphans of discarded intermediate states go
    /// with it.
    pub fn commit(&mut self, root: &NodeHash) -> Result<(), TrieError> {
        let mut to_commit = vec![];
        self.collect_commit_batch(root, &mut to_commit)?;
        self.db.put_batch(to_commit)?;
        self.cache.clear();
        Ok(())
    }

    // Collects a node and its children into the write batch
    fn collect_commit_batch(
        &mut self,
        node_hash: &NodeHash,
        acc: &mut Vec<(NodeHash, Vec<u8>)>,
    ) -> Result<(), TrieError> {
        let Some(node) = self.cache.remove(node_hash) else {
            // already stored, nothing below it can be pending
            return Ok(());
        };
        // Commit children (if any)
        match &node {
            Node::Branch(branch) => {
                for child in branch.choices.iter() {
                    if child.is_valid() {
                        self.collect_commit_batch(child, acc)?;
                    }
                }
            }
            Node::Extension(extension) => self.collect_commit_batch(&extension.child, acc)?,
            Node::Leaf(_) => {}
        }
        // Commit self
        acc.push((node_hash.clone(), node.encode_raw()));
        Ok(())
    }
}
