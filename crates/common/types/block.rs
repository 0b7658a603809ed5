use ethereum_types::H256;

use crate::crypto::sha256d;

use super::transaction::{OutPoint, Transaction};
use super::wire::{WireEncode, write_bytes};

/// Block header carrying, besides the usual proof-of-work fields, the
/// engine's two authenticated roots and the proof-of-stake block fields of
/// the original chain.
///
/// Wire order: `version | prev_hash | merkle_root | time | bits | nonce |
/// [when not hashing: block_sig, is_stake, prev_stake_outpoint, stake_time]
/// | state_root | utxo_root`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_hash: H256,
    pub merkle_root: H256,
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
    // proof-of-stake fields, excluded from the hashing form
    pub block_sig: Vec<u8>,
    pub is_stake: bool,
    pub prev_stake_outpoint: OutPoint,
    pub stake_time: u32,
    // outputs of the state engine
    pub state_root: H256,
    pub utxo_root: H256,
}

impl BlockHeader {
    fn encode(&self, buf: &mut Vec<u8>, for_hashing: bool) {
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(self.prev_hash.as_bytes());
        buf.extend_from_slice(self.merkle_root.as_bytes());
        buf.extend_from_slice(&self.time.to_le_bytes());
        buf.extend_from_slice(&self.bits.to_le_bytes());
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        if !for_hashing {
            write_bytes(&self.block_sig, buf);
            buf.push(self.is_stake as u8);
            self.prev_stake_outpoint.wire_encode(buf);
            buf.extend_from_slice(&self.stake_time.to_le_bytes());
        }
        buf.extend_from_slice(self.state_root.as_bytes());
        buf.extend_from_slice(self.utxo_root.as_bytes());
    }

    /// Block hash: double SHA-256 over the hashing form (signature and
    /// stake fields excluded, both roots included).
    pub fn hash(&self) -> H256 {
        let mut buf = Vec::with_capacity(144);
        self.encode(&mut buf, true);
        sha256d(buf)
    }
}

impl WireEncode for BlockHeader {
    fn wire_encode(&self, buf: &mut Vec<u8>) {
        self.encode(buf, false);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Recomputes the header's merkle root from the body.
    pub fn update_merkle_root(&mut self) {
        self.header.merkle_root = merkle_root(&self.transactions);
    }
}

impl WireEncode for Block {
    fn wire_encode(&self, buf: &mut Vec<u8>) {
        self.header.wire_encode(buf);
        self.transactions.wire_encode(buf);
    }
}

/// Bitcoin-style merkle root over the transaction ids: pairwise double
/// SHA-256, duplicating the last node of odd levels.
pub fn merkle_root(transactions: &[Transaction]) -> H256 {
    if transactions.is_empty() {
        return H256::zero();
    }
    let mut level: Vec<H256> = transactions.iter().map(Transaction::hash).collect();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let (left, right) = (pair[0], *pair.last().unwrap_or(&pair[0]));
            let mut concat = [0u8; 64];
            concat[..32].copy_from_slice(left.as_bytes());
            concat[32..].copy_from_slice(right.as_bytes());
            next.push(sha256d(concat));
        }
        level = next;
    }
    level[0]
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::script::Script;
    use crate::types::transaction::{TxIn, TxOut};

    fn sample_tx(version: i32) -> Transaction {
        Transaction {
            version,
            time: 0,
            vin: vec![TxIn::new(OutPoint::null(), Script::new())],
            vout: vec![TxOut::new(1, Script::new())],
            lock_time: 0,
        }
    }

    #[test]
    fn merkle_root_of_single_tx_is_its_hash() {
        let tx = sample_tx(1);
        assert_eq!(merkle_root(std::slice::from_ref(&tx)), tx.hash());
    }

    #[test]
    fn merkle_root_duplicates_odd_level() {
        let txs = vec![sample_tx(1), sample_tx(2), sample_tx(3)];
        // three leaves: root over [h01, h22]
        let h0 = txs[0].hash();
        let h1 = txs[1].hash();
        let h2 = txs[2].hash();
        let pair = |a: H256, b: H256| {
            let mut buf = [0u8; 64];
            buf[..32].copy_from_slice(a.as_bytes());
            buf[32..].copy_from_slice(b.as_bytes());
            sha256d(buf)
        };
        let expected = pair(pair(h0, h1), pair(h2, h2));
        assert_eq!(merkle_root(&txs), expected);
    }

    #[test]
    fn header_hash_skips_stake_fields() {
        let mut header = BlockHeader {
            version: 1,
            time: 1000,
            bits: 0x207fffff,
            nonce: 7,
            state_root: H256::repeat_byte(0xaa),
            utxo_root: H256::repeat_byte(0xbb),
            ..Default::default()
        };
        let hash = header.hash();
        header.block_sig = vec![1, 2, 3];
        header.is_stake = true;
        header.stake_time = 99;
        assert_eq!(header.hash(), hash);
        // but the roots are part of the hash
        header.state_root = H256::repeat_byte(0xcc);
        assert_ne!(header.hash(), hash);
    }

    #[test]
    fn full_encoding_includes_stake_fields() {
        let header = BlockHeader {
            version: 1,
            block_sig: vec![9; 5],
            ..Default::default()
        };
        let hashing_len = 4 + 32 + 32 + 4 + 4 + 4 + 32 + 32;
        let full = header.wire_encode_to_vec();
        // sig (1 + 5) + is_stake (1) + outpoint (36) + stake_time (4)
        assert_eq!(full.len(), hashing_len + 6 + 1 + 36 + 4);
    }
}
