use quanta_rlp::encode::{RLPEncode, encode_length};

use crate::ValueRLP;
use crate::error::TrieError;
use crate::nibbles::{Nibbles, TERMINATOR};
use crate::node_hash::NodeHash;
use crate::state::TrieState;

use super::{ExtensionNode, LeafNode, Node, encode_child};

/// Branch Node of an an Ethereum Compatible Patricia Merkle Trie
/// Contains the node's 16 child references and an optional value
#[derive(Debug, Clone, PartialEq)]
pub struct BranchNode {
    pub choices: Box<[NodeHash; 16]>,
    pub value: ValueRLP,
}

impl BranchNode {
    /// Creates a new branch node given its children
    pub fn new(choices: Box<[NodeHash; 16]>) -> Self {
        Self {
            choices,
            value: Default::default(),
        }
    }

    /// Creates a new branch node given its children and value
    pub fn new_with_value(choices: Box<[NodeHash; 16]>, value: ValueRLP) -> Self {
        Self { choices, value }
    }

    /// Retrieves a value from the subtrie: the next path nibble picks the
    /// child, the terminator selects the branch's own value
    pub fn get(&self, state: &TrieState, mut path: Nibbles) -> Result<Option<ValueRLP>, TrieError> {
        match path.next_choice() {
            Some(choice) => {
                let child = &self.choices[choice];
                if child.is_valid() {
                    let child_node = state
                        .get_node(child.clone())?
                        .ok_or(TrieError::InconsistentTree)?;
                    child_node.get(state, path)
                } else {
                    Ok(None)
                }
            }
            None => Ok((!self.value.is_empty()).then(|| self.value.clone())),
        }
    }

    /// Stores the given value in the subtrie
    pub fn insert(
        mut self,
        state: &mut TrieState,
        mut path: Nibbles,
        value: ValueRLP,
    ) -> Result<Node, TrieError> {
        match path.next_choice() {
            Some(choice) => {
                if self.choices[choice].is_valid() {
                    let child_node = state
                        .get_node(self.choices[choice].clone())?
                        .ok_or(TrieError::InconsistentTree)?;
                    let new_child = child_node.insert(state, path, value)?;
                    self.choices[choice] = new_child.insert_self(state)?;
                } else {
                    self.choices[choice] =
                        Node::from(LeafNode::new(path, value)).insert_self(state)?;
                }
            }
            None => self.value = value,
        }
        Ok(self.into())
    }

    /// Removes a value from the subtrie, collapsing the branch when it is
    /// left with a single child or only a value
    pub fn remove(
        mut self,
        state: &mut TrieState,
        mut path: Nibbles,
    ) -> Result<(Option<Node>, Option<ValueRLP>), TrieError> {
        let old_value = match path.next_choice() {
            Some(choice) if self.choices[choice].is_valid() => {
                let child_node = state
                    .get_node(self.choices[choice].clone())?
                    .ok_or(TrieError::InconsistentTree)?;
                let (new_child, old_value) = child_node.remove(state, path)?;
                self.choices[choice] = match new_child {
                    Some(node) => node.insert_self(state)?,
                    None => NodeHash::default(),
                };
                old_value
            }
            Some(_) => None,
            None => (!self.value.is_empty()).then(|| std::mem::take(&mut self.value)),
        };

        let children: Vec<usize> = (0..16).filter(|i| self.choices[*i].is_valid()).collect();

        let new_node = match (children.len(), self.value.is_empty()) {
            // Branch with no children nor value vanishes
            (0, true) => None,
            // Value-only branch collapses into a leaf with an empty partial
            (0, false) => Some(
                LeafNode::new(
                    Nibbles::from_hex(vec![TERMINATOR]),
                    std::mem::take(&mut self.value),
                )
                .into(),
            ),
            // Single-child, valueless branch gets absorbed into its child
            (1, true) => {
                let choice_index = children[0];
                let child_hash = self.choices[choice_index].clone();
                let child = state
                    .get_node(child_hash.clone())?
                    .ok_or(TrieError::InconsistentTree)?;
                match child {
                    Node::Branch(_) => Some(
                        ExtensionNode::new(
                            Nibbles::from_hex(vec![choice_index as u8]),
                            child_hash,
                        )
                        .into(),
                    ),
                    Node::Extension(mut extension) => {
                        extension.prefix.prepend(choice_index as u8);
                        Some(extension.into())
                    }
                    Node::Leaf(mut leaf) => {
                        leaf.partial.prepend(choice_index as u8);
                        Some(leaf.into())
                    }
                }
            }
            _ => Some(self.into()),
        };
        Ok((new_node, old_value))
    }

    /// Encodes the node: RLP list of 16 children plus the value
    pub fn encode_raw(&self) -> Vec<u8> {
        let children_len: usize = self
            .choices
            .iter()
            .map(|child| match child {
                NodeHash::Hashed(_) => 33,
                NodeHash::Inline(raw) if !raw.is_empty() => raw.len(),
                NodeHash::Inline(_) => 1,
            })
            .sum();
        let payload_len = children_len + RLPEncode::length(self.value.as_slice());
        let mut buf = Vec::with_capacity(payload_len + 4);
        encode_length(payload_len, &mut buf);
        for child in self.choices.iter() {
            encode_child(child, &mut buf);
        }
        self.value.as_slice().encode(&mut buf);
        buf
    }
}
