use bytes::Bytes;
use ethereum_types::{Address, H256, U256};

use crate::Amount;
use crate::crypto::sha256d;

use super::script::Script;
use super::wire::WireEncode;

/// Reference to one transaction output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct OutPoint {
    pub txid: H256,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: H256, vout: u32) -> Self {
        Self { txid, vout }
    }

    /// Coinbase inputs spend the null outpoint.
    pub fn null() -> Self {
        Self {
            txid: H256::zero(),
            vout: u32::MAX,
        }
    }
}

impl WireEncode for OutPoint {
    fn wire_encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.txid.as_bytes());
        buf.extend_from_slice(&self.vout.to_le_bytes());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxIn {
    pub prevout: OutPoint,
    pub script_sig: Script,
    pub sequence: u32,
}

impl TxIn {
    pub fn new(prevout: OutPoint, script_sig: Script) -> Self {
        Self {
            prevout,
            script_sig,
            sequence: u32::MAX,
        }
    }
}

impl WireEncode for TxIn {
    fn wire_encode(&self, buf: &mut Vec<u8>) {
        self.prevout.wire_encode(buf);
        self.script_sig.wire_encode(buf);
        buf.extend_from_slice(&self.sequence.to_le_bytes());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxOut {
    pub value: Amount,
    pub script_pubkey: Script,
}

impl TxOut {
    pub fn new(value: Amount, script_pubkey: Script) -> Self {
        Self {
            value,
            script_pubkey,
        }
    }
}

impl WireEncode for TxOut {
    fn wire_encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.value.to_le_bytes());
        self.script_pubkey.wire_encode(buf);
    }
}

/// A Bitcoin-shaped transaction. Synthesized transactions emitted by the
/// executive take this form, as does the genesis coinbase.
/// The chain timestamps every transaction (`time`), a proof-of-stake
/// inheritance of the original chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub time: u32,
    pub vin: Vec<TxIn>,
    pub vout: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    /// Transaction id: double SHA-256 of the wire encoding.
    pub fn hash(&self) -> H256 {
        sha256d(self.wire_encode_to_vec())
    }

    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1 && self.vin[0].prevout == OutPoint::null()
    }
}

impl WireEncode for Transaction {
    fn wire_encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.time.to_le_bytes());
        self.vin.wire_encode(buf);
        self.vout.wire_encode(buf);
        buf.extend_from_slice(&self.lock_time.to_le_bytes());
    }
}

/// The contract-side view of a transaction handed to the executive: value,
/// gas, payload and the backing on-chain outpoint it settles against.
///
/// The `version` selects the processing path: 0 is a pure deposit, 1 a
/// deposit combined with a call, 2 and above plain contract calls/creates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractTransaction {
    version: u32,
    value: U256,
    gas_price: U256,
    gas: U256,
    receive_address: Option<Address>,
    data: Bytes,
    nonce: U256,
    sender: Address,
    hash_with: H256,
    vout_number: u32,
}

impl ContractTransaction {
    /// Contract-creation message: no receiver, `data` is the init code.
    pub fn create(value: U256, gas_price: U256, gas: U256, code: Bytes, nonce: U256) -> Self {
        Self {
            version: 2,
            value,
            gas_price,
            gas,
            receive_address: None,
            data: code,
            nonce,
            ..Default::default()
        }
    }

    /// Message call to an existing account.
    pub fn call(
        value: U256,
        gas_price: U256,
        gas: U256,
        to: Address,
        data: Bytes,
        nonce: U256,
    ) -> Self {
        Self {
            version: 2,
            value,
            gas_price,
            gas,
            receive_address: Some(to),
            data,
            nonce,
            ..Default::default()
        }
    }

    /// Installs the already-recovered sender. Signature recovery belongs to
    /// the outer node; the engine only consumes its result.
    pub fn force_sender(&mut self, sender: Address) {
        self.sender = sender;
    }

    pub fn set_version(&mut self, version: u32) {
        self.version = version;
    }

    /// Records the on-chain transaction and output this message settles
    /// against.
    pub fn set_hash_with(&mut self, hash: H256) {
        self.hash_with = hash;
    }

    pub fn set_vout_number(&mut self, vout: u32) {
        self.vout_number = vout;
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn value(&self) -> U256 {
        self.value
    }

    /// The value passed along with the message, distinct from gas funds.
    pub fn endowment(&self) -> U256 {
        self.value
    }

    pub fn gas_price(&self) -> U256 {
        self.gas_price
    }

    pub fn gas(&self) -> U256 {
        self.gas
    }

    pub fn is_creation(&self) -> bool {
        self.receive_address.is_none()
    }

    /// Receiver address; zero for creations.
    pub fn receive_address(&self) -> Address {
        self.receive_address.unwrap_or_default()
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn nonce(&self) -> U256 {
        self.nonce
    }

    pub fn sender(&self) -> Address {
        self.sender
    }

    pub fn hash_with(&self) -> H256 {
        self.hash_with
    }

    pub fn vout_number(&self) -> u32 {
        self.vout_number
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::constants::COIN;

    #[test]
    fn wire_encoding_layout() {
        let tx = Transaction {
            version: 1,
            time: 0x5f5e100,
            vin: vec![TxIn::new(
                OutPoint::new(H256::repeat_byte(0x11), 7),
                Script::tx_hash_marker(),
            )],
            vout: vec![TxOut::new(50 * COIN, Script::new())],
            lock_time: 0,
        };
        let encoded = tx.wire_encode_to_vec();
        // version
        assert_eq!(&encoded[0..4], &1i32.to_le_bytes());
        // time
        assert_eq!(&encoded[4..8], &0x5f5e100u32.to_le_bytes());
        // one input
        assert_eq!(encoded[8], 1);
        // outpoint txid + vout
        assert_eq!(&encoded[9..41], H256::repeat_byte(0x11).as_bytes());
        assert_eq!(&encoded[41..45], &7u32.to_le_bytes());
        // script length + script + sequence
        assert_eq!(encoded[45], 1);
        assert_eq!(&encoded[47..51], &u32::MAX.to_le_bytes());
        // one output: value LE
        assert_eq!(encoded[51], 1);
        assert_eq!(&encoded[52..60], &(50 * COIN).to_le_bytes());
    }

    #[test]
    fn hash_is_stable() {
        let tx = Transaction {
            version: 1,
            ..Default::default()
        };
        assert_eq!(tx.hash(), tx.hash());
        let other = Transaction {
            version: 2,
            ..Default::default()
        };
        assert_ne!(tx.hash(), other.hash());
    }

    #[test]
    fn coinbase_detection() {
        let mut tx = Transaction::default();
        tx.vin.push(TxIn::new(OutPoint::null(), Script::new()));
        assert!(tx.is_coinbase());
        tx.vin[0].prevout = OutPoint::new(H256::repeat_byte(1), 0);
        assert!(!tx.is_coinbase());
    }
}
