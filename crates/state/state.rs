//! The hybrid UTXO/account state engine.
//!
//! [`QuantaState`] answers, for every block, what each account owns and
//! which unspent outputs back those balances. It keeps two authenticated
//! tries (the account trie and the UTXO-reference trie) behind write-back
//! caches, drives the contract VM through the executive, and materializes
//! contract-initiated value movements as Bitcoin-shaped transactions.
//!
//! A `QuantaState` is single-threaded: it owns its caches, its overlays
//! and its cursors into the backing stores. Read-only sharing across
//! threads happens through distinct instances rebased onto the same
//! committed root pair.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use ethereum_types::{Address, H256, U256};

use quanta_common::types::{Account, VinSet};
use quanta_trie::EMPTY_TRIE_HASH;

pub mod db;
pub mod error;
mod executive;
mod host;
mod ledger;
mod secure;
mod txgen;
mod utxo;

pub use db::{InMemoryKv, KeyValueDB, RedbKv, StateDB, WithExisting};
pub use error::{StateError, StoreError};
pub use executive::{EnvInfo, Permanence, ResultExecute};
pub use host::StateHost;
pub use secure::SecureTrie;
pub use utxo::sort_outpoints;

/// Path suffix of the UTXO-side database, a fixed on-disk convention.
pub const UTXO_DB_SUFFIX: &str = "qtumDB";

/// How to treat the trie roots at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseState {
    /// The caller will `set_root` to a recorded pair before reading.
    PreExisting,
    /// Anchor both tries at the canonical empty root.
    Empty,
}

/// The two-trie state: account records keyed by address, UTXO-reference
/// sets keyed by the same addresses, with dirty-tracking caches in front
/// and one overlay database behind each trie.
pub struct QuantaState {
    pub(crate) db: StateDB,
    pub(crate) trie: SecureTrie,
    pub(crate) cache: HashMap<Address, Account>,
    pub(crate) touched: HashSet<Address>,
    account_start_nonce: Option<U256>,

    pub(crate) db_utxo: StateDB,
    pub(crate) trie_utxo: SecureTrie,
    pub(crate) cache_utxo: HashMap<Address, VinSet>,

    /// Root pair of the last successful `commit_all`, the rollback anchor
    /// when the second flush of a commit fails.
    committed_roots: (H256, H256),
}

impl QuantaState {
    pub fn new(
        account_start_nonce: U256,
        db: StateDB,
        db_utxo: StateDB,
        base: BaseState,
    ) -> Self {
        let mut trie = SecureTrie::new(db.clone());
        let mut trie_utxo = SecureTrie::new(db_utxo.clone());
        if base == BaseState::Empty {
            trie.init();
            trie_utxo.init();
        }
        Self {
            db,
            trie,
            cache: HashMap::new(),
            touched: HashSet::new(),
            account_start_nonce: Some(account_start_nonce),
            db_utxo,
            trie_utxo,
            cache_utxo: HashMap::new(),
            committed_roots: (*EMPTY_TRIE_HASH, *EMPTY_TRIE_HASH),
        }
    }

    /// Opens both backing stores under `<base>/` and `<base>/qtumDB/`,
    /// each versioned by the genesis hash prefix.
    pub fn open(
        base_path: &Path,
        genesis_hash: H256,
        account_start_nonce: U256,
        with_existing: WithExisting,
        base: BaseState,
    ) -> Result<Self, StateError> {
        let db = StateDB::open(base_path, genesis_hash, with_existing)?;
        let db_utxo = StateDB::open(&base_path.join(UTXO_DB_SUFFIX), genesis_hash, with_existing)?;
        Ok(Self::new(account_start_nonce, db, db_utxo, base))
    }

    pub fn db(&self) -> &StateDB {
        &self.db
    }

    pub fn db_utxo(&self) -> &StateDB {
        &self.db_utxo
    }

    /// Flushes the account-side overlay to its backend.
    pub fn db_commit(&self) -> Result<(), StoreError> {
        self.db.commit()
    }

    /// Drops the account-side overlay's pending writes.
    pub fn db_rollback(&self) -> Result<(), StoreError> {
        self.db.rollback()
    }

    /// Current account-trie root over the in-memory state.
    pub fn root_hash(&self) -> H256 {
        self.trie.root()
    }

    /// Current UTXO-trie root over the in-memory state.
    pub fn root_hash_utxo(&self) -> H256 {
        self.trie_utxo.root()
    }

    /// Addresses flushed by commits since construction.
    pub fn touched(&self) -> &HashSet<Address> {
        &self.touched
    }

    /// Rewinds the account trie to a recorded root, dropping the cache.
    pub fn set_root(&mut self, root: H256) {
        self.cache.clear();
        self.trie.set_root(root);
        self.committed_roots.0 = root;
    }

    /// Rewinds the UTXO trie to a recorded root, dropping the cache.
    pub fn set_root_utxo(&mut self, root: H256) {
        self.cache_utxo.clear();
        self.trie_utxo.set_root(root);
        self.committed_roots.1 = root;
    }

    /// Drops both caches without touching the tries.
    pub fn clear_caches(&mut self) {
        self.cache.clear();
        self.cache_utxo.clear();
    }

    /// Structural verification of both tries from their current roots.
    pub fn is_trie_good(&self) -> bool {
        self.trie.is_trie_good() && self.trie_utxo.is_trie_good()
    }

    /// Flushes both caches and both overlays. The block is applied only
    /// when both flushes land: if the UTXO-side flush fails after the
    /// account side already persisted, both tries are rebased to the last
    /// committed pair before the error surfaces.
    pub fn commit_all(&mut self) -> Result<(H256, H256), StateError> {
        self.commit()?;
        self.commit_utxo()?;
        let state_root = self.trie.commit()?;
        let utxo_root = self.trie_utxo.commit()?;
        if let Err(err) = self.db_commit().and_then(|_| self.db_utxo.commit()) {
            let _ = self.db_rollback();
            let _ = self.db_utxo.rollback();
            let (prev_state, prev_utxo) = self.committed_roots;
            self.set_root(prev_state);
            self.set_root_utxo(prev_utxo);
            return Err(err.into());
        }
        self.committed_roots = (state_root, utxo_root);
        Ok((state_root, utxo_root))
    }

    pub(crate) fn require_account_start_nonce(&self) -> Result<U256, StateError> {
        self.account_start_nonce
            .ok_or(StateError::InvalidAccountStartNonce)
    }

    /// Records the chain's account start nonce; disagreement with an
    /// earlier value is fatal to the block.
    pub fn note_account_start_nonce(&mut self, actual: U256) -> Result<(), StateError> {
        match self.account_start_nonce {
            None => {
                self.account_start_nonce = Some(actual);
                Ok(())
            }
            Some(existing) if existing == actual => Ok(()),
            Some(_) => Err(StateError::InvalidAccountStartNonce),
        }
    }

    pub(crate) fn purge(&mut self, address: Address) {
        self.cache.remove(&address);
        self.cache_utxo.remove(&address);
    }
}
