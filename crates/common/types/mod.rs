mod account;
mod block;
pub mod genesis;
mod params;
mod receipt;
pub mod script;
mod transaction;
mod vin;
pub mod wire;

pub use account::{Account, AccountStatus};
pub use block::{Block, BlockHeader, merkle_root};
pub use params::{ChainParams, ConsensusParams, Deployment, DeploymentPos, Network};
pub use receipt::{LogEntry, TransactionReceipt};
pub use script::Script;
pub use transaction::{ContractTransaction, OutPoint, Transaction, TxIn, TxOut};
pub use vin::{Vin, VinSet};
