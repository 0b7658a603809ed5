//! VM-facing interfaces of the state engine.
//!
//! The opcode interpreter itself is a collaborator supplied by the outer
//! node; this crate pins down the contract between it and the executive:
//! the [`Vm`] drive sequence, the [`Host`] callbacks into the account and
//! UTXO caches, and the [`SealEngine`] scratchpads accumulated during one
//! execution.

pub mod error;
pub mod exec;
pub mod host;
pub mod seal;

#[cfg(any(test, feature = "test-utils"))]
pub mod scripted;

pub use error::VmError;
pub use exec::{ExecutionResult, OpStep, Vm, VmException};
pub use host::Host;
pub use seal::{SealEngine, Transfer};
