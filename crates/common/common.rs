pub mod constants;
pub mod crypto;
pub mod types;

pub use ethereum_types::{Address, H160, H256, U256};

/// Base coin amount, in the smallest on-chain unit.
pub type Amount = i64;
