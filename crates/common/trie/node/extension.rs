use quanta_rlp::encode::{RLPEncode, encode_length};

use crate::ValueRLP;
use crate::error::TrieError;
use crate::nibbles::{Nibbles, TERMINATOR};
use crate::node_hash::NodeHash;
use crate::state::TrieState;

use super::{BranchNode, LeafNode, Node, encode_child};

/// Extension Node of an an Ethereum Compatible Patricia Merkle Trie
/// Contains the node's prefix and a its child node hash, doesn't store any value
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionNode {
    pub prefix: Nibbles,
    pub child: NodeHash,
}

impl ExtensionNode {
    /// Creates a new extension node given its prefix and child hash
    pub fn new(prefix: Nibbles, child: NodeHash) -> Self {
        Self { prefix, child }
    }

    /// Follows the prefix and delegates to the child
    pub fn get(&self, state: &TrieState, mut path: Nibbles) -> Result<Option<ValueRLP>, TrieError> {
        if path.skip_prefix(&self.prefix) {
            let child_node = state
                .get_node(self.child.clone())?
                .ok_or(TrieError::InconsistentTree)?;
            child_node.get(state, path)
        } else {
            Ok(None)
        }
    }

    /// Stores the given value, splitting the prefix when paths diverge
    pub fn insert(
        mut self,
        state: &mut TrieState,
        path: Nibbles,
        value: ValueRLP,
    ) -> Result<Node, TrieError> {
        let match_index = path.count_prefix(&self.prefix);
        if match_index == self.prefix.len() {
            // Insert into child
            let child_node = state
                .get_node(self.child.clone())?
                .ok_or(TrieError::InconsistentTree)?;
            let new_child = child_node.insert(state, path.offset(match_index), value)?;
            self.child = new_child.insert_self(state)?;
            return Ok(self.into());
        }

        // Paths diverge within the prefix: split it around a new branch.
        // Whatever remains of the prefix below the split keeps pointing at
        // the old child.
        let inner_child = if match_index + 1 == self.prefix.len() {
            self.child
        } else {
            Node::from(ExtensionNode::new(
                self.prefix.offset(match_index + 1),
                self.child,
            ))
            .insert_self(state)?
        };

        let mut choices: [NodeHash; 16] = std::array::from_fn(|_| NodeHash::default());
        choices[self.prefix.at(match_index)] = inner_child;

        let new_leaf_idx = path.at(match_index);
        let branch_node = if new_leaf_idx == TERMINATOR as usize {
            BranchNode::new_with_value(Box::new(choices), value)
        } else {
            choices[new_leaf_idx] =
                Node::from(LeafNode::new(path.offset(match_index + 1), value)).insert_self(state)?;
            BranchNode::new(Box::new(choices))
        };

        if match_index == 0 {
            Ok(branch_node.into())
        } else {
            let branch_hash = Node::from(branch_node).insert_self(state)?;
            Ok(ExtensionNode::new(self.prefix.slice(0, match_index), branch_hash).into())
        }
    }

    /// Removes a value from the subtrie, merging with the new child when it
    /// collapses into an extension or leaf
    pub fn remove(
        mut self,
        state: &mut TrieState,
        mut path: Nibbles,
    ) -> Result<(Option<Node>, Option<ValueRLP>), TrieError> {
        if !path.skip_prefix(&self.prefix) {
            return Ok((Some(self.into()), None));
        }
        let child_node = state
            .get_node(self.child.clone())?
            .ok_or(TrieError::InconsistentTree)?;
        let (new_child, old_value) = child_node.remove(state, path)?;

        let node = match new_child {
            Some(node @ Node::Branch(_)) => {
                self.child = node.insert_self(state)?;
                Some(self.into())
            }
            Some(Node::Extension(inner)) => {
                // merge consecutive extensions
                self.prefix.extend(&inner.prefix);
                self.child = inner.child;
                Some(self.into())
            }
            Some(Node::Leaf(mut leaf)) => {
                // absorb the prefix into the leaf
                leaf.partial = self.prefix.concat(&leaf.partial);
                Some(leaf.into())
            }
            None => None,
        };
        Ok((node, old_value))
    }

    /// Encodes the node: RLP list of [compact(prefix), child]
    pub fn encode_raw(&self) -> Vec<u8> {
        let compact = self.prefix.encode_compact();
        let child_len = match &self.child {
            NodeHash::Hashed(_) => 33,
            NodeHash::Inline(raw) if !raw.is_empty() => raw.len(),
            NodeHash::Inline(_) => 1,
        };
        let payload_len = RLPEncode::length(compact.as_slice()) + child_len;
        let mut buf = Vec::with_capacity(payload_len + 4);
        encode_length(payload_len, &mut buf);
        compact.as_slice().encode(&mut buf);
        encode_child(&self.child, &mut buf);
        buf
    }
}
