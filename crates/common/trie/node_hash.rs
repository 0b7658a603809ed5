use ethereum_types::H256;
use sha3::{Digest, Keccak256};

/// Reference to a trie node as stored by its parent: nodes whose RLP
/// encoding reaches 32 bytes are referenced by keccak hash, shorter nodes
/// are inlined verbatim (per the Ethereum trie specification).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeHash {
    Hashed(H256),
    Inline(Vec<u8>),
}

impl NodeHash {
    /// Returns the hash of the node given its RLP encoding.
    pub fn from_encoded_raw(encoded: &[u8]) -> NodeHash {
        if encoded.len() >= 32 {
            NodeHash::Hashed(H256::from_slice(Keccak256::digest(encoded).as_slice()))
        } else {
            NodeHash::Inline(encoded.to_vec())
        }
    }

    /// Converts the reference into a definite H256, hashing inlined nodes.
    /// Only meaningful for root nodes; child references are spliced as-is.
    pub fn finalize(&self) -> H256 {
        match self {
            NodeHash::Hashed(hash) => *hash,
            NodeHash::Inline(encoded) => {
                H256::from_slice(Keccak256::digest(encoded).as_slice())
            }
        }
    }

    /// An empty inline reference marks an absent branch child.
    pub fn is_valid(&self) -> bool {
        !matches!(self, NodeHash::Inline(encoded) if encoded.is_empty())
    }
}

impl Default for NodeHash {
    fn default() -> Self {
        NodeHash::Inline(Vec::new())
    }
}

impl From<H256> for NodeHash {
    fn from(value: H256) -> Self {
        NodeHash::Hashed(value)
    }
}

impl AsRef<[u8]> for NodeHash {
    fn as_ref(&self) -> &[u8] {
        match self {
            NodeHash::Hashed(hash) => hash.as_bytes(),
            NodeHash::Inline(encoded) => encoded,
        }
    }
}
