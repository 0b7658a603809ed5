use ethereum_types::H256;
use hex_literal::hex;

/// Keccak-256 hash of the empty byte string; the code hash of every
/// account that has never held code.
pub const EMPTY_KECCAK_HASH: H256 = H256(hex!(
    "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
));

/// Base units per coin.
pub const COIN: crate::Amount = 100_000_000;

/// Layout version of the persisted state databases.
pub const DATABASE_VERSION: u32 = 12041;
