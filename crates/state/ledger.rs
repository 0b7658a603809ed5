//! Account half of the state: lazy cache over the account trie.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use tracing::warn;

use quanta_common::constants::EMPTY_KECCAK_HASH;
use quanta_common::crypto::keccak;
use quanta_common::types::{Account, AccountStatus};
use quanta_rlp::decode::RLPDecode;
use quanta_rlp::encode::RLPEncode;
use quanta_trie::EMPTY_TRIE_HASH;

use crate::error::StateError;
use crate::secure::SecureTrie;
use crate::QuantaState;

impl QuantaState {
    /// Loads an account into the cache if it isn't there yet.
    /// When absent from the trie, `force_create` installs a zeroed record;
    /// `require_code` additionally resolves the code blob by hash.
    pub fn ensure_cached(
        &mut self,
        address: Address,
        require_code: bool,
        force_create: bool,
    ) -> Result<(), StateError> {
        if !self.cache.contains_key(&address) {
            match self.trie.get(address.as_bytes())? {
                Some(payload) => {
                    let account = Account::from_rlp(&payload)?;
                    self.cache.insert(address, account);
                }
                None if force_create => {
                    let nonce = self.require_account_start_nonce()?;
                    self.cache.insert(
                        address,
                        Account::new(nonce, U256::zero(), AccountStatus::NormalCreation),
                    );
                }
                None => return Ok(()),
            }
        }
        if require_code {
            let wants_blob = self
                .cache
                .get(&address)
                .is_some_and(|account| !account.is_fresh_code() && !account.code_cache_valid());
            if wants_blob {
                let code_hash = match self.cache.get(&address) {
                    Some(account) => account.code_hash(),
                    None => return Ok(()),
                };
                let code = if code_hash == EMPTY_KECCAK_HASH {
                    Bytes::new()
                } else {
                    Bytes::from(self.db.lookup(code_hash.as_bytes())?.unwrap_or_default())
                };
                if let Some(account) = self.cache.get_mut(&address) {
                    account.note_code(code);
                }
            }
        }
        Ok(())
    }

    pub fn address_in_use(&mut self, address: Address) -> Result<bool, StateError> {
        self.ensure_cached(address, false, false)?;
        Ok(self.cache.contains_key(&address))
    }

    pub fn address_has_code(&mut self, address: Address) -> Result<bool, StateError> {
        self.ensure_cached(address, false, false)?;
        Ok(self
            .cache
            .get(&address)
            .is_some_and(Account::code_bearing))
    }

    pub fn balance(&mut self, address: Address) -> Result<U256, StateError> {
        self.ensure_cached(address, false, false)?;
        Ok(self
            .cache
            .get(&address)
            .map(Account::balance)
            .unwrap_or_default())
    }

    /// The nonce the next message from this address must carry.
    pub fn transactions_from(&mut self, address: Address) -> Result<U256, StateError> {
        self.ensure_cached(address, false, false)?;
        match self.cache.get(&address) {
            Some(account) => Ok(account.nonce()),
            None => self.require_account_start_nonce(),
        }
    }

    pub fn add_balance(&mut self, address: Address, amount: U256) -> Result<(), StateError> {
        self.ensure_cached(address, false, false)?;
        match self.cache.get_mut(&address) {
            Some(account) => account.add_balance(amount),
            None => {
                let nonce = self.require_account_start_nonce()?;
                self.cache.insert(
                    address,
                    Account::new(nonce, amount, AccountStatus::NormalCreation),
                );
            }
        }
        Ok(())
    }

    pub fn sub_balance(&mut self, address: Address, amount: U256) -> Result<(), StateError> {
        self.ensure_cached(address, false, false)?;
        match self.cache.get_mut(&address) {
            Some(account) if account.balance() >= amount => {
                account.sub_balance(amount);
                Ok(())
            }
            _ => Err(StateError::NotEnoughCash),
        }
    }

    /// Bumps the nonce for an outgoing message.
    pub fn note_sending(&mut self, address: Address) -> Result<(), StateError> {
        self.ensure_cached(address, false, false)?;
        match self.cache.get_mut(&address) {
            Some(account) => account.inc_nonce(),
            None => {
                // this is impossible, but continue regardless
                warn!(%address, "sending from non-existent account, how did it pay?");
                let nonce = self.require_account_start_nonce()?.saturating_add(U256::one());
                self.cache
                    .insert(address, Account::new(nonce, U256::zero(), AccountStatus::Changed));
            }
        }
        Ok(())
    }

    /// Allocates a contract at a fresh random address and stages its code
    /// blob in the overlay.
    pub fn new_contract(&mut self, balance: U256, code: Bytes) -> Result<Address, StateError> {
        let code_hash = keccak(&code);
        self.db.insert(code_hash.as_bytes().to_vec(), code.to_vec())?;
        let start_nonce = self.require_account_start_nonce()?;
        loop {
            let address = Address::from(rand::random::<[u8; 20]>());
            self.ensure_cached(address, false, false)?;
            if !self.cache.contains_key(&address) {
                self.cache.insert(
                    address,
                    Account::new_contract(start_nonce, balance, code_hash, AccountStatus::Changed),
                );
                return Ok(address);
            }
        }
    }

    /// Installs a contract at a known (derived) address, crediting it and
    /// attaching freshly deployed code.
    pub fn init_contract(
        &mut self,
        address: Address,
        balance: U256,
        code: Bytes,
    ) -> Result<(), StateError> {
        self.ensure_cached(address, false, true)?;
        if let Some(account) = self.cache.get_mut(&address) {
            if !balance.is_zero() {
                account.add_balance(balance);
            }
            if !code.is_empty() {
                account.set_code(code);
            }
        }
        Ok(())
    }

    pub fn code(&mut self, address: Address) -> Result<Bytes, StateError> {
        if !self.address_has_code(address)? {
            return Ok(Bytes::new());
        }
        self.ensure_cached(address, true, false)?;
        Ok(self
            .cache
            .get(&address)
            .and_then(|account| account.code().cloned())
            .unwrap_or_default())
    }

    pub fn code_hash(&mut self, address: Address) -> Result<H256, StateError> {
        if !self.address_has_code(address)? {
            return Ok(EMPTY_KECCAK_HASH);
        }
        Ok(self
            .cache
            .get(&address)
            .map(Account::code_hash)
            .unwrap_or(EMPTY_KECCAK_HASH))
    }

    /// Storage root as recorded in the trie payload; the cache's pending
    /// overlay is not folded in.
    pub fn storage_root(&mut self, address: Address) -> Result<H256, StateError> {
        match self.trie.get(address.as_bytes())? {
            Some(payload) => Ok(Account::from_rlp(&payload)?.storage_root()),
            None => Ok(*EMPTY_TRIE_HASH),
        }
    }

    /// One storage slot: pending overlay first, then the storage trie at
    /// the account's recorded root. Loaded values are memoized.
    pub fn storage(&mut self, address: Address, key: H256) -> Result<U256, StateError> {
        self.ensure_cached(address, false, false)?;
        let Some(account) = self.cache.get(&address) else {
            return Ok(U256::zero());
        };
        if let Some(value) = account.storage_overlay().get(&key) {
            return Ok(*value);
        }
        let storage_trie = SecureTrie::open(self.db.clone(), account.storage_root());
        let value = match storage_trie.get(key.as_bytes())? {
            Some(payload) => U256::decode(&payload)?,
            None => U256::zero(),
        };
        if let Some(account) = self.cache.get_mut(&address) {
            account.set_storage(key, value);
        }
        Ok(value)
    }

    /// Records a storage write in the account's pending overlay.
    pub fn set_storage(
        &mut self,
        address: Address,
        key: H256,
        value: U256,
    ) -> Result<(), StateError> {
        self.ensure_cached(address, false, true)?;
        if let Some(account) = self.cache.get_mut(&address) {
            account.write_storage(key, value);
        }
        Ok(())
    }

    /// The full merged storage of an account: trie content with the
    /// pending overlay folded on top.
    pub fn storage_map(&mut self, address: Address) -> Result<HashMap<H256, U256>, StateError> {
        self.ensure_cached(address, false, false)?;
        let mut ret = HashMap::new();
        let Some(account) = self.cache.get(&address) else {
            return Ok(ret);
        };
        if account.storage_root() != *EMPTY_TRIE_HASH {
            let storage_trie = SecureTrie::open(self.db.clone(), account.storage_root());
            for (key, payload) in storage_trie.iterate()? {
                if key.len() != 32 {
                    return Err(StateError::InvalidTrie);
                }
                ret.insert(H256::from_slice(&key), U256::decode(&payload)?);
            }
        }
        for (key, value) in account.storage_overlay() {
            if value.is_zero() {
                ret.remove(key);
            } else {
                ret.insert(*key, *value);
            }
        }
        Ok(ret)
    }

    /// Marks an account for erasure; the flush removes its trie key.
    pub(crate) fn kill_account(&mut self, address: Address) -> Result<(), StateError> {
        self.ensure_cached(address, false, false)?;
        if let Some(account) = self.cache.get_mut(&address) {
            account.kill();
        }
        Ok(())
    }

    /// Every live account and its balance, merged over cache and trie.
    pub fn addresses(&mut self) -> Result<HashMap<Address, U256>, StateError> {
        let mut ret = HashMap::new();
        for (key, payload) in self.trie.iterate()? {
            if key.len() != 20 {
                return Err(StateError::InvalidTrie);
            }
            let address = Address::from_slice(&key);
            if !self.cache.contains_key(&address) {
                ret.insert(address, Account::from_rlp(&payload)?.balance());
            }
        }
        for (address, account) in &self.cache {
            if account.is_alive() {
                ret.insert(*address, account.balance());
            }
        }
        Ok(ret)
    }

    /// Installs a prebuilt account map (genesis allocation) and flushes it.
    pub fn populate_from(
        &mut self,
        accounts: HashMap<Address, Account>,
    ) -> Result<(), StateError> {
        self.cache.extend(accounts);
        self.commit()?;
        Ok(())
    }

    /// Flushes every dirty cache entry into the account trie: dead
    /// accounts are erased, live ones re-encoded after draining their
    /// storage overlay and persisting fresh code. Returns the flushed
    /// addresses. `Unchanged` entries are never flushed.
    pub fn commit(&mut self) -> Result<HashSet<Address>, StateError> {
        let mut flushed = HashSet::new();
        let cache = std::mem::take(&mut self.cache);
        for (address, mut account) in cache {
            if !account.is_dirty() {
                continue;
            }
            flushed.insert(address);
            if !account.is_alive() {
                self.trie.remove(address.as_bytes())?;
                continue;
            }
            let overlay = account.take_storage_overlay();
            let mut storage_root = account.storage_root();
            if !overlay.is_empty() {
                let mut storage_trie = SecureTrie::open(self.db.clone(), storage_root);
                for (key, value) in overlay {
                    if value.is_zero() {
                        storage_trie.remove(key.as_bytes())?;
                    } else {
                        storage_trie.insert(key.as_bytes(), value.encode_to_vec())?;
                    }
                }
                storage_root = storage_trie.commit()?;
            }
            if account.is_fresh_code() {
                if let Some(code) = account.code() {
                    self.db
                        .insert(account.code_hash().as_bytes().to_vec(), code.to_vec())?;
                }
            }
            self.trie
                .insert(address.as_bytes(), account.rlp(storage_root))?;
        }
        self.touched.extend(flushed.iter().copied());
        Ok(flushed)
    }
}
