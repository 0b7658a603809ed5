use ethereum_types::{Address, H256, U256};

use quanta_common::crypto::hash160;
use quanta_common::types::ChainParams;

/// One value movement emitted by the VM during execution, in program
/// order. The executive drains these after the VM returns and materializes
/// each as a synthesized transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub sender: Address,
    pub receiver: Address,
    pub value: U256,
}

/// Per-execution scratchpads riding on the seal-engine facade: the
/// pending transfer list, the addresses whose cache entries must be purged
/// after the VM returns, and the derived address of a created contract.
#[derive(Debug)]
pub struct SealEngine {
    params: ChainParams,
    pub pending_transfers: Vec<Transfer>,
    pub dead_addresses: Vec<Address>,
    pub contract_address: Address,
}

impl SealEngine {
    pub fn new(params: ChainParams) -> Self {
        Self {
            params,
            pending_transfers: Vec::new(),
            dead_addresses: Vec::new(),
            contract_address: Address::zero(),
        }
    }

    pub fn chain_params(&self) -> &ChainParams {
        &self.params
    }

    /// Derives the address of the contract created by an on-chain
    /// transaction: `RIPEMD160(SHA256(txid || vout))`.
    pub fn create_contract_address(&mut self, tx_hash: H256, vout_number: u32) -> Address {
        let mut preimage = tx_hash.as_bytes().to_vec();
        preimage.push(vout_number as u8);
        self.contract_address = hash160(preimage);
        self.contract_address
    }

    /// Resets the scratchpads for the next execution.
    pub fn clear(&mut self) {
        self.pending_transfers.clear();
        self.dead_addresses.clear();
        self.contract_address = Address::zero();
    }
}
