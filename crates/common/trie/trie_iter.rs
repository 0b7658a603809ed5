use crate::nibbles::Nibbles;
use crate::node::Node;
use crate::node_hash::NodeHash;
use crate::state::TrieState;
use crate::{PathRLP, ValueRLP};

/// In-order iterator over a trie's nodes. The stack is used as a reversed
/// FIFO: children of a branch are pushed in reverse so the lowest choice is
/// visited first.
pub struct TrieIterator<'a> {
    state: &'a TrieState,
    stack: Vec<(Nibbles, NodeHash)>,
}

impl<'a> TrieIterator<'a> {
    pub(crate) fn new(state: &'a TrieState, root: Option<NodeHash>) -> Self {
        let mut stack = Vec::new();
        if let Some(root) = root {
            if root.is_valid() {
                stack.push((Nibbles::default(), root));
            }
        }
        Self { state, stack }
    }

    /// Iterator over the leaf (path, value) pairs, paths rebuilt as full
    /// byte strings.
    pub fn content(self) -> impl Iterator<Item = (PathRLP, ValueRLP)> + 'a {
        self.filter_map(|(path, node)| match node {
            Node::Branch(branch_node) => {
                (!branch_node.value.is_empty()).then(|| (path.to_bytes(), branch_node.value))
            }
            Node::Extension(_) => None,
            Node::Leaf(leaf_node) => Some((path.to_bytes(), leaf_node.value)),
        })
    }
}

impl Iterator for TrieIterator<'_> {
    type Item = (Nibbles, Node);

    fn next(&mut self) -> Option<Self::Item> {
        let (mut path, next_node_hash) = self.stack.pop()?;
        let next_node = self.state.get_node(next_node_hash).ok().flatten()?;
        match &next_node {
            Node::Branch(branch_node) => {
                // Add all children to the stack (in reverse order so we
                // process the first child first)
                for (choice, child) in branch_node.choices.iter().enumerate().rev() {
                    if child.is_valid() {
                        let mut child_path = path.clone();
                        child_path.append(choice as u8);
                        self.stack.push((child_path, child.clone()))
                    }
                }
            }
            Node::Extension(extension_node) => {
                // Update path
                path.extend(&extension_node.prefix);
                // Add child to the stack
                self.stack
                    .push((path.clone(), extension_node.child.clone()));
            }
            Node::Leaf(leaf) => {
                path.extend(&leaf.partial);
            }
        }
        Some((path, next_node))
    }
}
