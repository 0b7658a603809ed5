//! A scripted interpreter for exercising the executive without a real
//! opcode loop: each instance carries a fixed program of host actions and
//! a predetermined gas outcome.

use bytes::Bytes;
use ethereum_types::{Address, H256, U256};

use quanta_common::types::{ContractTransaction, LogEntry};

use crate::error::VmError;
use crate::exec::{OpStep, Vm, VmException};
use crate::host::Host;

/// Gas charged by any transaction before a single opcode runs.
pub const BASE_TX_GAS: u64 = 21_000;

/// One host action replayed during `go`.
#[derive(Debug, Clone)]
pub enum ScriptedOp {
    Transfer {
        from: Address,
        to: Address,
        value: U256,
    },
    SetStorage {
        address: Address,
        key: H256,
        value: U256,
    },
    Suicide {
        contract: Address,
        beneficiary: Address,
    },
    NewContract {
        balance: U256,
        code: Bytes,
    },
    Log(LogEntry),
}

/// The programmed outcome of one execution.
#[derive(Debug, Clone, Default)]
pub struct ScriptedOutcome {
    /// Fail `initialize` outright (bad signature/nonce/intrinsic gas).
    pub fail_initialize: bool,
    /// Skip the interpreter loop entirely (plain value call).
    pub short_circuit: bool,
    /// Exception to report after execution; ops are not applied when set,
    /// mirroring an interpreter reverting its own frame.
    pub excepted: VmException,
    /// Gas consumed on success (clamped to the gas limit).
    pub gas_used: U256,
    pub ops: Vec<ScriptedOp>,
    pub output: Bytes,
    pub logs: Vec<LogEntry>,
}

impl ScriptedOutcome {
    pub fn success(gas_used: u64) -> Self {
        Self {
            gas_used: U256::from(gas_used),
            ..Default::default()
        }
    }

    pub fn out_of_gas() -> Self {
        Self {
            excepted: VmException::OutOfGas,
            ..Default::default()
        }
    }

    pub fn with_ops(mut self, ops: Vec<ScriptedOp>) -> Self {
        self.ops = ops;
        self
    }
}

/// Scripted [`Vm`]: performs the standard message mechanics (gas purchase,
/// nonce bump, endowment transfer, contract installation) and then replays
/// its programmed ops.
pub struct ScriptedVm {
    outcome: ScriptedOutcome,
    // captured at initialize
    sender: Address,
    value: U256,
    gas_limit: U256,
    gas_price: U256,
    is_creation: bool,
    receiver: Address,
    code: Bytes,
    new_address: Address,
    steps: u64,
}

impl ScriptedVm {
    pub fn new(outcome: ScriptedOutcome) -> Self {
        Self {
            outcome,
            sender: Address::zero(),
            value: U256::zero(),
            gas_limit: U256::zero(),
            gas_price: U256::zero(),
            is_creation: false,
            receiver: Address::zero(),
            code: Bytes::new(),
            new_address: Address::zero(),
            steps: 0,
        }
    }

    fn excepted_upfront(&self) -> bool {
        self.outcome.excepted != VmException::None
    }
}

impl Vm for ScriptedVm {
    fn initialize(
        &mut self,
        tx: &ContractTransaction,
        _host: &mut dyn Host,
    ) -> Result<(), VmError> {
        if self.outcome.fail_initialize {
            return Err(VmError::InvalidTransaction(
                "upfront validation failed".into(),
            ));
        }
        if tx.gas() < U256::from(BASE_TX_GAS) {
            return Err(VmError::InvalidTransaction(format!(
                "gas limit below intrinsic cost: {} < {BASE_TX_GAS}",
                tx.gas()
            )));
        }
        self.sender = tx.sender();
        self.value = tx.value();
        self.gas_limit = tx.gas();
        self.gas_price = tx.gas_price();
        self.is_creation = tx.is_creation();
        self.receiver = tx.receive_address();
        self.code = tx.data().clone();
        Ok(())
    }

    fn execute(&mut self, host: &mut dyn Host) -> Result<bool, VmError> {
        // Gas purchase and nonce bump always happen; the exception path
        // purges the sender's cache entry afterwards anyway.
        host.sub_balance(self.sender, self.gas_limit * self.gas_price)?;
        host.note_sending(self.sender)?;

        if self.excepted_upfront() {
            // A real interpreter reverts its own frame: no endowment
            // movement or contract installation survives.
            return Ok(true);
        }

        if self.is_creation {
            let contract = host.seal().contract_address;
            self.new_address = contract;
            host.init_contract(contract, U256::zero(), self.code.clone())?;
            if !self.value.is_zero() {
                host.transfer(self.sender, contract, self.value)?;
            }
        } else if !self.value.is_zero() {
            // the outer value movement of a call is the first pending
            // transfer; version-1 settlement skips it during synthesis
            host.transfer(self.sender, self.receiver, self.value)?;
        }

        Ok(self.outcome.short_circuit)
    }

    fn go(
        &mut self,
        host: &mut dyn Host,
        mut on_op: Option<&mut dyn FnMut(&OpStep)>,
    ) -> Result<(), VmError> {
        if self.excepted_upfront() {
            return Ok(());
        }
        let ops = self.outcome.ops.clone();
        for op in &ops {
            self.steps += 1;
            if let Some(on_op) = on_op.as_mut() {
                on_op(&OpStep {
                    steps: self.steps,
                    pc: self.steps,
                    instruction: 0,
                    gas_cost: U256::zero(),
                    gas: self.gas(),
                });
            }
            match op {
                ScriptedOp::Transfer { from, to, value } => {
                    host.transfer(*from, *to, *value)?;
                }
                ScriptedOp::SetStorage {
                    address,
                    key,
                    value,
                } => {
                    host.set_storage(*address, *key, *value)?;
                }
                ScriptedOp::Suicide {
                    contract,
                    beneficiary,
                } => {
                    host.suicide(*contract, *beneficiary)?;
                }
                ScriptedOp::NewContract { balance, code } => {
                    let address = host.new_contract(*balance, code.clone())?;
                    self.new_address = address;
                }
                ScriptedOp::Log(_) => {}
            }
        }
        Ok(())
    }

    fn finalize(&mut self, host: &mut dyn Host) -> Result<(), VmError> {
        if self.excepted_upfront() {
            return Ok(());
        }
        // refund the unused gas money
        host.add_balance(self.sender, self.gas() * self.gas_price)?;
        Ok(())
    }

    fn gas(&self) -> U256 {
        if self.excepted_upfront() {
            U256::zero()
        } else {
            self.gas_limit.saturating_sub(self.gas_used())
        }
    }

    fn gas_used(&self) -> U256 {
        if self.excepted_upfront() {
            self.gas_limit
        } else {
            self.outcome.gas_used.min(self.gas_limit)
        }
    }

    fn logs(&self) -> &[LogEntry] {
        &self.outcome.logs
    }

    fn new_address(&self) -> Address {
        self.new_address
    }

    fn excepted(&self) -> VmException {
        self.outcome.excepted
    }

    fn output(&self) -> &[u8] {
        &self.outcome.output
    }
}
