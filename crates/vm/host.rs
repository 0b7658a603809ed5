use bytes::Bytes;
use ethereum_types::{Address, H256, U256};

use crate::error::VmError;
use crate::seal::SealEngine;

/// Read/write callbacks from the VM into the account and UTXO caches.
///
/// The executive hands the interpreter an implementation backed by the
/// live `State`; every mutation lands in the caches and only reaches the
/// tries when the executive commits.
pub trait Host {
    fn balance(&mut self, address: Address) -> Result<U256, VmError>;

    fn nonce(&mut self, address: Address) -> Result<U256, VmError>;

    fn code(&mut self, address: Address) -> Result<Bytes, VmError>;

    fn address_in_use(&mut self, address: Address) -> Result<bool, VmError>;

    fn address_has_code(&mut self, address: Address) -> Result<bool, VmError>;

    fn storage(&mut self, address: Address, key: H256) -> Result<U256, VmError>;

    fn set_storage(&mut self, address: Address, key: H256, value: U256) -> Result<(), VmError>;

    fn add_balance(&mut self, address: Address, amount: U256) -> Result<(), VmError>;

    fn sub_balance(&mut self, address: Address, amount: U256) -> Result<(), VmError>;

    /// Bumps the sender's nonce for an outgoing message.
    fn note_sending(&mut self, address: Address) -> Result<(), VmError>;

    /// Allocates a fresh contract account for a CREATE-style opcode and
    /// returns its address.
    fn new_contract(&mut self, balance: U256, code: Bytes) -> Result<Address, VmError>;

    /// Installs a contract account at a known (derived) address.
    fn init_contract(
        &mut self,
        address: Address,
        balance: U256,
        code: Bytes,
    ) -> Result<(), VmError>;

    /// Moves value between accounts and records the movement in the seal
    /// engine's pending-transfer list, in program order, for later
    /// materialization as a synthesized transaction.
    fn transfer(&mut self, from: Address, to: Address, value: U256) -> Result<(), VmError>;

    /// SELFDESTRUCT semantics: credit the beneficiary with the contract's
    /// whole balance and schedule the contract for erasure.
    fn suicide(&mut self, contract: Address, beneficiary: Address) -> Result<(), VmError>;

    /// The per-execution scratchpads.
    fn seal(&mut self) -> &mut SealEngine;
}
