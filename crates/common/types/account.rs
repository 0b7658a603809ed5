use std::collections::HashMap;

use bytes::Bytes;
use ethereum_types::{H256, U256};

use quanta_rlp::{error::RLPDecodeError, structs::{Decoder, Encoder}};
use quanta_trie::EMPTY_TRIE_HASH;

use crate::constants::EMPTY_KECCAK_HASH;
use crate::crypto::keccak;

/// Cache lifecycle of an account record. Only `Unchanged` records may skip
/// the flush; `Dead` records are erased from the trie instead of written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    /// Loaded from the trie and untouched since.
    Unchanged,
    /// Mutated in place; must be re-encoded on commit.
    Changed,
    /// Created this block by a deposit or forced load.
    NormalCreation,
    /// Holds code deployed this block whose blob is not yet persisted.
    FreshCode,
    /// Scheduled for erasure; never rematerialized after flush.
    Dead,
}

/// One account record of the state trie: balance/nonce pair, the root of
/// the account's own storage trie, and the hash of its code.
///
/// Pending storage writes accumulate in `storage_overlay` and only reach
/// the storage trie when the cache flushes; a zero value erases the slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    nonce: U256,
    balance: U256,
    storage_root: H256,
    code_hash: H256,
    code: Option<Bytes>,
    storage_overlay: HashMap<H256, U256>,
    status: AccountStatus,
}

impl Account {
    /// A plain account with no code and an empty storage trie.
    pub fn new(nonce: U256, balance: U256, status: AccountStatus) -> Self {
        Self {
            nonce,
            balance,
            storage_root: *EMPTY_TRIE_HASH,
            code_hash: EMPTY_KECCAK_HASH,
            code: None,
            storage_overlay: HashMap::new(),
            status,
        }
    }

    /// A contract account installed with pre-hashed code.
    pub fn new_contract(nonce: U256, balance: U256, code_hash: H256, status: AccountStatus) -> Self {
        Self {
            nonce,
            balance,
            storage_root: *EMPTY_TRIE_HASH,
            code_hash,
            code: None,
            storage_overlay: HashMap::new(),
            status,
        }
    }

    pub fn nonce(&self) -> U256 {
        self.nonce
    }

    pub fn balance(&self) -> U256 {
        self.balance
    }

    pub fn storage_root(&self) -> H256 {
        self.storage_root
    }

    pub fn code_hash(&self) -> H256 {
        if self.is_fresh_code() {
            match &self.code {
                Some(code) => keccak(code),
                None => EMPTY_KECCAK_HASH,
            }
        } else {
            self.code_hash
        }
    }

    pub fn status(&self) -> AccountStatus {
        self.status
    }

    pub fn is_alive(&self) -> bool {
        self.status != AccountStatus::Dead
    }

    /// Whether the record must be flushed on commit.
    pub fn is_dirty(&self) -> bool {
        self.status != AccountStatus::Unchanged
    }

    pub fn is_fresh_code(&self) -> bool {
        self.status == AccountStatus::FreshCode
    }

    pub fn code_bearing(&self) -> bool {
        self.is_fresh_code() || self.code_hash != EMPTY_KECCAK_HASH
    }

    pub fn code_cache_valid(&self) -> bool {
        self.code.is_some()
    }

    pub fn code(&self) -> Option<&Bytes> {
        self.code.as_ref()
    }

    /// Installs the lazily-loaded code blob for an existing code hash.
    pub fn note_code(&mut self, code: Bytes) {
        self.code = Some(code);
    }

    /// Installs freshly deployed code; the blob still has to be persisted
    /// under its hash on commit.
    pub fn set_code(&mut self, code: Bytes) {
        self.code_hash = keccak(&code);
        self.code = Some(code);
        self.status = AccountStatus::FreshCode;
    }

    pub fn inc_nonce(&mut self) {
        self.nonce = self.nonce.saturating_add(U256::one());
        self.touch();
    }

    pub fn add_balance(&mut self, amount: U256) {
        self.balance = self.balance.saturating_add(amount);
        self.touch();
    }

    /// Caller must have checked funds; underflow is a programming error.
    pub fn sub_balance(&mut self, amount: U256) {
        debug_assert!(self.balance >= amount);
        self.balance = self.balance.saturating_sub(amount);
        self.touch();
    }

    pub fn storage_overlay(&self) -> &HashMap<H256, U256> {
        &self.storage_overlay
    }

    /// Memoizes a loaded storage slot without dirtying the record.
    pub fn set_storage(&mut self, key: H256, value: U256) {
        self.storage_overlay.insert(key, value);
    }

    /// Records a pending storage write.
    pub fn write_storage(&mut self, key: H256, value: U256) {
        self.storage_overlay.insert(key, value);
        self.touch();
    }

    /// Drains the pending writes for flushing into the storage trie.
    pub fn take_storage_overlay(&mut self) -> HashMap<H256, U256> {
        std::mem::take(&mut self.storage_overlay)
    }

    pub fn set_storage_root(&mut self, root: H256) {
        self.storage_root = root;
    }

    pub fn kill(&mut self) {
        self.status = AccountStatus::Dead;
        self.balance = U256::zero();
        self.storage_overlay.clear();
        self.code = None;
    }

    fn touch(&mut self) {
        if self.status == AccountStatus::Unchanged {
            self.status = AccountStatus::Changed;
        }
    }

    /// Trie payload: the RLP 4-list `(nonce, balance, storage_root,
    /// code_hash)`, with the storage root resolved by the caller after
    /// draining the overlay.
    pub fn rlp(&self, storage_root: H256) -> Vec<u8> {
        let mut buf = Vec::new();
        Encoder::new(&mut buf)
            .encode_field(&self.nonce)
            .encode_field(&self.balance)
            .encode_field(&storage_root)
            .encode_field(&self.code_hash())
            .finish();
        buf
    }

    /// Decodes a trie payload into an `Unchanged` record.
    pub fn from_rlp(rlp: &[u8]) -> Result<Self, RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (nonce, decoder) = decoder.decode_field("nonce")?;
        let (balance, decoder) = decoder.decode_field("balance")?;
        let (storage_root, decoder) = decoder.decode_field("storage_root")?;
        let (code_hash, decoder) = decoder.decode_field("code_hash")?;
        decoder.finish()?;
        Ok(Self {
            nonce,
            balance,
            storage_root,
            code_hash,
            code: None,
            storage_overlay: HashMap::new(),
            status: AccountStatus::Unchanged,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rlp_roundtrip() {
        let account = Account::new(U256::from(3), U256::from(1000), AccountStatus::Changed);
        let encoded = account.rlp(account.storage_root());
        let decoded = Account::from_rlp(&encoded).unwrap();
        assert_eq!(decoded.nonce(), account.nonce());
        assert_eq!(decoded.balance(), account.balance());
        assert_eq!(decoded.storage_root(), account.storage_root());
        assert_eq!(decoded.code_hash(), account.code_hash());
        assert_eq!(decoded.status(), AccountStatus::Unchanged);
    }

    #[test]
    fn fresh_code_hash_tracks_cached_bytes() {
        let mut account = Account::new(U256::zero(), U256::zero(), AccountStatus::NormalCreation);
        assert_eq!(account.code_hash(), EMPTY_KECCAK_HASH);
        account.set_code(Bytes::from_static(b"\x60\x00\x60\x00"));
        assert_eq!(account.code_hash(), keccak(b"\x60\x00\x60\x00"));
        assert!(account.code_bearing());
        assert!(account.is_fresh_code());
    }

    #[test]
    fn read_does_not_dirty_but_write_does() {
        let mut account = Account::new(U256::zero(), U256::from(5), AccountStatus::Unchanged);
        assert!(!account.is_dirty());
        let _ = account.balance();
        assert!(!account.is_dirty());
        account.add_balance(U256::one());
        assert!(account.is_dirty());
    }

    #[test]
    fn killed_account_is_not_alive() {
        let mut account = Account::new(U256::one(), U256::from(9), AccountStatus::Changed);
        account.kill();
        assert!(!account.is_alive());
        assert!(account.is_dirty());
        assert_eq!(account.balance(), U256::zero());
    }
}
