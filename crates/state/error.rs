use quanta_rlp::error::RLPDecodeError;
use quanta_trie::TrieError;
use quanta_vm::VmError;
use thiserror::Error;

/// Failures of the backing stores. All of these are fatal to the node:
/// it cannot run without its databases.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not enough available space on the state database volume")]
    NotEnoughAvailableSpace,
    #[error("State database already open by another instance")]
    DatabaseAlreadyOpen,
    #[error("Panicked while acquiring a database lock")]
    LockError,
    #[error("Database error: {0}")]
    Backend(anyhow::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures surfaced by the state engine. `NotEnoughCash` is
/// transaction-local and reverts the offending transaction; the trie and
/// start-nonce variants abort the whole block.
#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Trie(#[from] TrieError),
    #[error(transparent)]
    Rlp(#[from] RLPDecodeError),
    #[error("Structural trie verification failed")]
    InvalidTrie,
    #[error("Account start nonce queried before being set, or changed after")]
    InvalidAccountStartNonce,
    #[error("Not enough cash")]
    NotEnoughCash,
    #[error(transparent)]
    Vm(#[from] VmError),
}
