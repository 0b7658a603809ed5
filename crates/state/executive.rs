//! The transaction executive: version dispatch, VM drive, exception
//! handling and pending-transfer settlement for one transaction.

use ethereum_types::{Address, U256};
use tracing::warn;

use quanta_common::types::{
    ContractTransaction, OutPoint, Transaction, TransactionReceipt, Vin,
};
use quanta_vm::{ExecutionResult, SealEngine, Vm, VmException};

use crate::QuantaState;
use crate::error::StateError;
use crate::host::StateHost;
use crate::txgen::{amount_from_value, create_p2pkh_tx};

/// Whether an execution's cache mutations are flushed or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permanence {
    Committed,
    Reverted,
}

/// Block-level context of one execution.
#[derive(Debug, Clone, Default)]
pub struct EnvInfo {
    pub author: Address,
    pub number: u64,
    pub timestamp: u32,
    pub gas_limit: U256,
    /// Gas already burned by earlier transactions of the block.
    pub gas_used: U256,
}

/// Everything one execution produces: the VM result, the receipt anchored
/// at the post-execution state root, and the synthesized transactions
/// materializing contract value movements.
#[derive(Debug, Clone, Default)]
pub struct ResultExecute {
    pub exec: ExecutionResult,
    pub receipt: TransactionReceipt,
    pub txs: Vec<Transaction>,
}

impl QuantaState {
    /// Executes one transaction against the two caches.
    ///
    /// Version 0 is a pure deposit and never reaches the VM. Version 1
    /// with value deposits first and then runs the contract path; 2 and
    /// above go straight to it.
    pub fn execute(
        &mut self,
        env: &EnvInfo,
        seal: &mut SealEngine,
        vm: &mut dyn Vm,
        tx: &ContractTransaction,
        permanence: Permanence,
    ) -> Result<ResultExecute, StateError> {
        if self.process_deposit(tx, permanence)? {
            return Ok(ResultExecute {
                exec: ExecutionResult::default(),
                receipt: TransactionReceipt::new(self.root_hash(), U256::zero(), Vec::new()),
                txs: Vec::new(),
            });
        }

        let mut txs = Vec::new();

        // The caller already paid on-chain; re-credit the ledger view
        // before the VM debits gas and value.
        self.add_balance(tx.sender(), tx.gas() * tx.gas_price() + tx.endowment())?;
        seal.dead_addresses.extend([tx.sender(), env.author]);

        let init = {
            let mut host = StateHost::new(self, seal);
            vm.initialize(tx, &mut host)
        };
        if let Err(err) = init {
            warn!(%err, "transaction failed upfront validation");
            return self.exception_handling(tx, env);
        }

        if tx.is_creation() {
            let contract = seal.create_contract_address(tx.hash_with(), tx.vout_number());
            self.add_vin(
                contract,
                Vin::new(OutPoint::new(tx.hash_with(), tx.vout_number()), 0),
            )?;
        }

        let start_gas_used = env.gas_used;
        let drive = {
            let mut host = StateHost::new(self, seal);
            let mut run = || -> Result<(), quanta_vm::VmError> {
                if !vm.execute(&mut host)? {
                    vm.go(&mut host, None)?;
                }
                vm.finalize(&mut host)
            };
            run()
        };

        for address in seal.dead_addresses.clone() {
            self.purge(address);
        }

        if let Err(err) = drive {
            warn!(%err, "VM drive failed");
            return self.exception_handling(tx, env);
        }
        if vm.excepted() != VmException::None {
            warn!(excepted = ?vm.excepted(), "VMException");
            return self.exception_handling(tx, env);
        }

        // Materialize the value movements accumulated during execution,
        // in program order. For a version-1 transaction the first entry
        // duplicates the outer on-chain transfer and is skipped.
        let transfers = std::mem::take(&mut seal.pending_transfers);
        for (index, transfer) in transfers.iter().enumerate() {
            let outer_duplicate = tx.version() == 1 && !tx.value().is_zero() && index == 0;
            if transfer.value.is_zero() || outer_duplicate {
                continue;
            }
            if let Some((synthesized, consumed)) =
                self.generate_transaction(transfer, env, tx.sender())?
            {
                self.settle_synthesized(&synthesized, transfer, consumed)?;
                txs.push(synthesized);
            }
        }

        match permanence {
            Permanence::Reverted => self.clear_caches(),
            Permanence::Committed => {
                self.commit_all()?;
            }
        }

        let exec = ExecutionResult {
            gas_refunded: vm.gas(),
            gas_used: vm.gas_used(),
            excepted: VmException::None,
            output: bytes::Bytes::copy_from_slice(vm.output()),
        };
        Ok(ResultExecute {
            exec,
            receipt: TransactionReceipt::new(
                self.root_hash(),
                start_gas_used + vm.gas_used(),
                vm.logs().to_vec(),
            ),
            txs,
        })
    }

    /// Version-0 and version-1 deposit handling. Returns true when the
    /// transaction was fully processed (version 0).
    fn process_deposit(
        &mut self,
        tx: &ContractTransaction,
        permanence: Permanence,
    ) -> Result<bool, StateError> {
        if tx.version() == 0 {
            self.add_vin(
                tx.receive_address(),
                Vin::new(
                    OutPoint::new(tx.hash_with(), tx.vout_number()),
                    amount_from_value(tx.value()),
                ),
            )?;
            self.add_balance(tx.receive_address(), tx.value())?;
            match permanence {
                Permanence::Committed => {
                    self.commit_all()?;
                }
                Permanence::Reverted => self.clear_caches(),
            }
            return Ok(true);
        }
        if tx.version() == 1 && !tx.value().is_zero() {
            self.add_vin(
                tx.receive_address(),
                Vin::new(
                    OutPoint::new(tx.hash_with(), tx.vout_number()),
                    amount_from_value(tx.value()),
                ),
            )?;
        }
        Ok(false)
    }

    /// Failed execution: purge the residue, refund the on-chain value to
    /// the sender as a plain pay-to-pubkey-hash spend, burn the whole gas
    /// allowance. Nothing is committed.
    fn exception_handling(
        &mut self,
        tx: &ContractTransaction,
        env: &EnvInfo,
    ) -> Result<ResultExecute, StateError> {
        self.cache.remove(&tx.sender());
        self.cache.remove(&env.author);
        self.cache_utxo.remove(&tx.receive_address());

        let mut txs = Vec::new();
        if !tx.value().is_zero() {
            txs.push(create_p2pkh_tx(
                tx.hash_with(),
                tx.vout_number(),
                amount_from_value(tx.value()),
                tx.sender(),
            ));
        }
        let exec = ExecutionResult {
            gas_refunded: U256::zero(),
            gas_used: tx.gas(),
            ..Default::default()
        };
        Ok(ResultExecute {
            exec,
            receipt: TransactionReceipt::new(self.root_hash(), tx.gas(), Vec::new()),
            txs,
        })
    }
}
