use bytes::Bytes;
use ethereum_types::{Address, H256, U256};

/// A log record emitted by the VM, bubbled verbatim into the receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Bytes,
}

/// Per-transaction receipt: the post-execution state root, the cumulative
/// gas of the block so far, and the VM's logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub state_root: H256,
    pub cumulative_gas_used: U256,
    pub logs: Vec<LogEntry>,
}

impl TransactionReceipt {
    pub fn new(state_root: H256, cumulative_gas_used: U256, logs: Vec<LogEntry>) -> Self {
        Self {
            state_root,
            cumulative_gas_used,
            logs,
        }
    }
}
