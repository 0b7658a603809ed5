use bytes::Bytes;
use ethereum_types::{Address, U256};

use quanta_common::types::{ContractTransaction, LogEntry};

use crate::error::VmError;
use crate::host::Host;

/// Exception reported by the VM for one execution. Anything but `None`
/// sends the transaction through the executive's exception path; the block
/// proceeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VmException {
    #[default]
    None,
    OutOfGas,
    BadInstruction,
    BadJumpDestination,
    StackUnderflow,
    OutOfStack,
    Reverted,
    Internal,
}

/// Outcome of driving the VM over one transaction.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    /// Gas left after execution, refunded to the caller.
    pub gas_refunded: U256,
    pub gas_used: U256,
    pub excepted: VmException,
    pub output: Bytes,
}

/// One interpreter step, reported through the tracing callback.
#[derive(Debug, Clone, Copy)]
pub struct OpStep {
    pub steps: u64,
    pub pc: u64,
    pub instruction: u8,
    pub gas_cost: U256,
    pub gas: U256,
}

/// The drive sequence the executive expects from an interpreter:
/// `initialize` (validation), `execute` (message setup; `true` short
/// circuits the interpreter loop), `go` (the loop itself), `finalize`
/// (gas refunds), then the observers.
pub trait Vm {
    fn initialize(
        &mut self,
        tx: &ContractTransaction,
        host: &mut dyn Host,
    ) -> Result<(), VmError>;

    fn execute(&mut self, host: &mut dyn Host) -> Result<bool, VmError>;

    fn go(
        &mut self,
        host: &mut dyn Host,
        on_op: Option<&mut dyn FnMut(&OpStep)>,
    ) -> Result<(), VmError>;

    fn finalize(&mut self, host: &mut dyn Host) -> Result<(), VmError>;

    /// Remaining gas after execution.
    fn gas(&self) -> U256;

    fn gas_used(&self) -> U256;

    fn logs(&self) -> &[LogEntry];

    /// Address of the contract created by this execution, if any.
    fn new_address(&self) -> Address;

    fn excepted(&self) -> VmException;

    fn output(&self) -> &[u8];
}
