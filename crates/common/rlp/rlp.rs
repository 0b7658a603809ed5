//! Recursive Length Prefix (RLP) encoding and decoding.
//!
//! RLP is the serialization format of every trie payload in the engine:
//! account records, per-account storage slots and UTXO-reference lists all
//! travel through it before landing in an authenticated trie.
//!
//! The two core traits are [`encode::RLPEncode`] and [`decode::RLPDecode`].
//! Structured types are built field by field with [`structs::Encoder`] and
//! [`structs::Decoder`].

pub mod constants;
pub mod decode;
pub mod encode;
pub mod error;
pub mod structs;
