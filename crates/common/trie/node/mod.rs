mod branch;
mod extension;
mod leaf;

pub use branch::BranchNode;
pub use extension::ExtensionNode;
pub use leaf::LeafNode;

use quanta_rlp::{decode::decode_bytes, error::RLPDecodeError, structs::Decoder};

use crate::ValueRLP;
use crate::error::TrieError;
use crate::nibbles::Nibbles;
use crate::node_hash::NodeHash;
use crate::state::TrieState;

/// A Node in an Ethereum Compatible Patricia Merkle Trie
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Branch(Box<BranchNode>),
    Extension(ExtensionNode),
    Leaf(LeafNode),
}

impl From<BranchNode> for Node {
    fn from(val: BranchNode) -> Self {
        Node::Branch(Box::new(val))
    }
}

impl From<ExtensionNode> for Node {
    fn from(val: ExtensionNode) -> Self {
        Node::Extension(val)
    }
}

impl From<LeafNode> for Node {
    fn from(val: LeafNode) -> Self {
        Node::Leaf(val)
    }
}

impl Node {
    /// Retrieves a value from the subtrie originating from this node given its path
    pub fn get(&self, state: &TrieState, path: Nibbles) -> Result<Option<ValueRLP>, TrieError> {
        match self {
            Node::Branch(n) => n.get(state, path),
            Node::Extension(n) => n.get(state, path),
            Node::Leaf(n) => n.get(path),
        }
    }

    /// Inserts a value into the subtrie originating from this node and
    /// returns the new root of the subtrie
    pub fn insert(
        self,
        state: &mut TrieState,
        path: Nibbles,
        value: ValueRLP,
    ) -> Result<Node, TrieError> {
        match self {
            Node::Branch(n) => n.insert(state, path, value),
            Node::Extension(n) => n.insert(state, path, value),
            Node::Leaf(n) => n.insert(state, path, value),
        }
    }

    /// Removes a value from the subtrie originating from this node given its path
    /// Returns the new root of the subtrie (if any) and the removed value if
    /// it existed in the subtrie
    pub fn remove(
        self,
        state: &mut TrieState,
        path: Nibbles,
    ) -> Result<(Option<Node>, Option<ValueRLP>), TrieError> {
        match self {
            Node::Branch(n) => n.remove(state, path),
            Node::Extension(n) => n.remove(state, path),
            Node::Leaf(n) => n.remove(path),
        }
    }

    /// Encodes the node
    pub fn encode_raw(&self) -> Vec<u8> {
        match self {
            Node::Branch(n) => n.encode_raw(),
            Node::Extension(n) => n.encode_raw(),
            Node::Leaf(n) => n.encode_raw(),
        }
    }

    /// Decodes the node from its RLP encoding
    pub fn decode_raw(rlp: &[u8]) -> Result<Self, RLPDecodeError> {
        let mut rlp_items = vec![];
        let mut decoder = Decoder::new(rlp)?;
        let mut item;
        loop {
            (item, decoder) = decoder.get_encoded_item()?;
            rlp_items.push(item);
            // Check if we reached the end or decoded more items than a node can hold
            if decoder.is_done() || rlp_items.len() > 17 {
                break;
            }
        }
        // Deserialize into node depending on the available fields
        Ok(match rlp_items.len() {
            // Leaf or Extension Node
            2 => {
                let (path, _) = decode_bytes(&rlp_items[0])?;
                let path = Nibbles::decode_compact(path);
                if path.is_leaf() {
                    let (value, _) = decode_bytes(&rlp_items[1])?;
                    LeafNode {
                        partial: path,
                        value: value.to_vec(),
                    }
                    .into()
                } else {
                    ExtensionNode {
                        prefix: path,
                        child: decode_child(&rlp_items[1]),
                    }
                    .into()
                }
            }
            // Branch Node
            17 => {
                let choices = std::array::from_fn(|i| decode_child(&rlp_items[i]));
                let (value, _) = decode_bytes(&rlp_items[16])?;
                BranchNode {
                    choices: Box::new(choices),
                    value: value.to_vec(),
                }
                .into()
            }
            n => {
                return Err(RLPDecodeError::Custom(format!(
                    "Invalid arg count for Node, expected 2 or 17, got {n}"
                )));
            }
        })
    }

    /// Computes the node's hash
    pub fn compute_hash(&self) -> NodeHash {
        NodeHash::from_encoded_raw(&self.encode_raw())
    }

    /// Stores the node in the trie's state and returns its hash
    pub fn insert_self(self, state: &mut TrieState) -> Result<NodeHash, TrieError> {
        let hash = self.compute_hash();
        state.insert_node(self, hash.clone());
        Ok(hash)
    }
}

fn decode_child(rlp: &[u8]) -> NodeHash {
    match decode_bytes(rlp) {
        Ok((hash, &[])) if hash.len() == 32 => {
            NodeHash::from(ethereum_types::H256::from_slice(hash))
        }
        Ok((&[], &[])) => NodeHash::default(),
        _ => NodeHash::Inline(rlp.to_vec()),
    }
}

/// Splices a child reference into a parent node encoding: hashed children
/// are encoded as 32-byte strings, inlined children verbatim.
pub(crate) fn encode_child(child: &NodeHash, buf: &mut Vec<u8>) {
    use quanta_rlp::encode::RLPEncode;
    match child {
        NodeHash::Hashed(hash) => hash.as_bytes().encode(buf),
        NodeHash::Inline(raw) if !raw.is_empty() => buf.extend_from_slice(raw),
        NodeHash::Inline(_) => (&[] as &[u8]).encode(buf),
    }
}
