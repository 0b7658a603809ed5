use quanta_rlp::encode::{RLPEncode, encode_length};

use crate::ValueRLP;
use crate::error::TrieError;
use crate::nibbles::{Nibbles, TERMINATOR};
use crate::node_hash::NodeHash;
use crate::state::TrieState;

use super::{BranchNode, ExtensionNode, Node};

/// Leaf Node of an an Ethereum Compatible Patricia Merkle Trie
/// Contains the node's path remainder (terminator included) and value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeafNode {
    pub partial: Nibbles,
    pub value: ValueRLP,
}

impl LeafNode {
    /// Creates a new leaf node given its partial path and value
    pub fn new(partial: Nibbles, value: ValueRLP) -> Self {
        Self { partial, value }
    }

    /// Returns the stored value if the path matches the stored path
    pub fn get(&self, path: Nibbles) -> Result<Option<ValueRLP>, TrieError> {
        if self.partial == path {
            Ok(Some(self.value.clone()))
        } else {
            Ok(None)
        }
    }

    /// Stores the given value, splitting into a branch (and possibly an
    /// extension) when the paths diverge
    pub fn insert(
        self,
        state: &mut TrieState,
        path: Nibbles,
        value: ValueRLP,
    ) -> Result<Node, TrieError> {
        if self.partial == path {
            let mut node = self;
            node.value = value;
            return Ok(node.into());
        }

        // Paths diverge: build a branch at the first mismatching nibble.
        // Terminator nibbles route the value into the branch itself.
        let match_index = path.count_prefix(&self.partial);
        let self_choice_idx = self.partial.at(match_index);
        let new_leaf_choice_idx = path.at(match_index);

        let mut choices: [NodeHash; 16] = std::array::from_fn(|_| NodeHash::default());
        let branch_node = if self_choice_idx == TERMINATOR as usize {
            // Yield self's value to the branch node
            choices[new_leaf_choice_idx] =
                LeafNode::new(path.offset(match_index + 1), value).into_node_hash(state)?;
            BranchNode::new_with_value(Box::new(choices), self.value)
        } else if new_leaf_choice_idx == TERMINATOR as usize {
            choices[self_choice_idx] = LeafNode::new(self.partial.offset(match_index + 1), self.value)
                .into_node_hash(state)?;
            BranchNode::new_with_value(Box::new(choices), value)
        } else {
            choices[self_choice_idx] = LeafNode::new(self.partial.offset(match_index + 1), self.value)
                .into_node_hash(state)?;
            choices[new_leaf_choice_idx] =
                LeafNode::new(path.offset(match_index + 1), value).into_node_hash(state)?;
            BranchNode::new(Box::new(choices))
        };

        if match_index == 0 {
            Ok(branch_node.into())
        } else {
            // Shared prefix lives in an extension above the branch
            let branch_hash = Node::from(branch_node).insert_self(state)?;
            Ok(ExtensionNode::new(path.slice(0, match_index), branch_hash).into())
        }
    }

    fn into_node_hash(self, state: &mut TrieState) -> Result<NodeHash, TrieError> {
        Node::from(self).insert_self(state)
    }

    /// Removes the value if the path matches the stored path
    pub fn remove(self, path: Nibbles) -> Result<(Option<Node>, Option<ValueRLP>), TrieError> {
        if self.partial == path {
            Ok((None, Some(self.value)))
        } else {
            Ok((Some(self.into()), None))
        }
    }

    /// Encodes the node: RLP list of [compact(partial), value]
    pub fn encode_raw(&self) -> Vec<u8> {
        let compact = self.partial.encode_compact();
        let payload_len =
            RLPEncode::length(compact.as_slice()) + RLPEncode::length(self.value.as_slice());
        let mut buf = Vec::with_capacity(payload_len + 4);
        encode_length(payload_len, &mut buf);
        compact.as_slice().encode(&mut buf);
        self.value.as_slice().encode(&mut buf);
        buf
    }
}
