//! The VM's window into the live state: `Host` callbacks backed by the
//! caches, with the seal engine's scratchpads riding along.

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};

use quanta_vm::{Host, SealEngine, Transfer, VmError};

use crate::QuantaState;
use crate::error::StateError;

pub struct StateHost<'a> {
    state: &'a mut QuantaState,
    seal: &'a mut SealEngine,
}

impl<'a> StateHost<'a> {
    pub fn new(state: &'a mut QuantaState, seal: &'a mut SealEngine) -> Self {
        Self { state, seal }
    }
}

fn host_err(err: StateError) -> VmError {
    VmError::Host(err.to_string())
}

impl Host for StateHost<'_> {
    fn balance(&mut self, address: Address) -> Result<U256, VmError> {
        self.state.balance(address).map_err(host_err)
    }

    fn nonce(&mut self, address: Address) -> Result<U256, VmError> {
        self.state.transactions_from(address).map_err(host_err)
    }

    fn code(&mut self, address: Address) -> Result<Bytes, VmError> {
        self.state.code(address).map_err(host_err)
    }

    fn address_in_use(&mut self, address: Address) -> Result<bool, VmError> {
        self.state.address_in_use(address).map_err(host_err)
    }

    fn address_has_code(&mut self, address: Address) -> Result<bool, VmError> {
        self.state.address_has_code(address).map_err(host_err)
    }

    fn storage(&mut self, address: Address, key: H256) -> Result<U256, VmError> {
        self.state.storage(address, key).map_err(host_err)
    }

    fn set_storage(&mut self, address: Address, key: H256, value: U256) -> Result<(), VmError> {
        self.state.set_storage(address, key, value).map_err(host_err)
    }

    fn add_balance(&mut self, address: Address, amount: U256) -> Result<(), VmError> {
        self.state.add_balance(address, amount).map_err(host_err)
    }

    fn sub_balance(&mut self, address: Address, amount: U256) -> Result<(), VmError> {
        self.state.sub_balance(address, amount).map_err(host_err)
    }

    fn note_sending(&mut self, address: Address) -> Result<(), VmError> {
        self.state.note_sending(address).map_err(host_err)
    }

    fn new_contract(&mut self, balance: U256, code: Bytes) -> Result<Address, VmError> {
        self.state.new_contract(balance, code).map_err(host_err)
    }

    fn init_contract(
        &mut self,
        address: Address,
        balance: U256,
        code: Bytes,
    ) -> Result<(), VmError> {
        self.state
            .init_contract(address, balance, code)
            .map_err(host_err)
    }

    fn transfer(&mut self, from: Address, to: Address, value: U256) -> Result<(), VmError> {
        self.state.sub_balance(from, value).map_err(host_err)?;
        self.state.add_balance(to, value).map_err(host_err)?;
        self.seal.pending_transfers.push(Transfer {
            sender: from,
            receiver: to,
            value,
        });
        Ok(())
    }

    fn suicide(&mut self, contract: Address, beneficiary: Address) -> Result<(), VmError> {
        let balance = self.state.balance(contract).map_err(host_err)?;
        if !balance.is_zero() {
            self.transfer(contract, beneficiary, balance)?;
        }
        // The Dead record makes the flush erase the trie key; the UTXO key
        // follows because a dead account is no longer in use at
        // commit time.
        self.state.kill_account(contract).map_err(host_err)?;
        Ok(())
    }

    fn seal(&mut self) -> &mut SealEngine {
        self.seal
    }
}
