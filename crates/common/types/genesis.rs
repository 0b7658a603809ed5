use ethereum_types::{H256, U256};
use serde::{Deserialize, Serialize};
use tracing::debug;

use quanta_trie::EMPTY_TRIE_HASH;

use crate::Amount;
use crate::constants::COIN;

use super::block::{Block, BlockHeader};
use super::script::{OP_CHECKSIG, Script};
use super::transaction::{OutPoint, Transaction, TxIn, TxOut};

/// Timestamp literal embedded in the genesis coinbase scriptSig.
pub const GENESIS_TIMESTAMP: &str =
    "The Times 03/Jan/2009 Chancellor on brink of second bailout for banks";

/// Public key paid by the genesis coinbase output.
pub const GENESIS_OUTPUT_KEY: [u8; 65] = hex_literal::hex!(
    "04678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f61deb649f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5f"
);

/// Per-network proof-of-work seed of the genesis header.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GenesisSeed {
    pub time: u32,
    pub nonce: u32,
    pub bits: u32,
}

/// Assembles the genesis block: a lone coinbase carrying the timestamp
/// literal, the 50-coin output, and both engine roots set to the empty
/// trie hash.
pub fn create_genesis_block(seed: GenesisSeed, version: i32, reward: Amount) -> Block {
    let script_sig = Script::new()
        .push_num(486604799)
        .push_num(4)
        .push_data(GENESIS_TIMESTAMP.as_bytes());
    let output_script = Script::new()
        .push_data(&GENESIS_OUTPUT_KEY)
        .push_opcode(OP_CHECKSIG);

    let coinbase = Transaction {
        version: 1,
        time: seed.time,
        vin: vec![TxIn::new(OutPoint::null(), script_sig)],
        vout: vec![TxOut::new(reward, output_script)],
        lock_time: 0,
    };

    let mut genesis = Block {
        header: BlockHeader {
            version,
            prev_hash: H256::zero(),
            time: seed.time,
            bits: seed.bits,
            nonce: seed.nonce,
            state_root: *EMPTY_TRIE_HASH,
            utxo_root: *EMPTY_TRIE_HASH,
            ..Default::default()
        },
        transactions: vec![coinbase],
    };
    genesis.update_merkle_root();
    genesis
}

/// Default genesis: 50 coins, header version 1.
pub fn default_genesis_block(seed: GenesisSeed) -> Block {
    create_genesis_block(seed, 1, 50 * COIN)
}

/// Decodes a compact-bits difficulty target.
/// Returns None when the encoding is negative, zero, or overflows 256 bits.
pub fn target_from_compact(bits: u32) -> Option<U256> {
    let exponent = (bits >> 24) as usize;
    let mantissa = bits & 0x007f_ffff;
    let negative = bits & 0x0080_0000 != 0 && mantissa != 0;
    if negative || mantissa == 0 {
        return None;
    }
    let overflow = exponent > 34
        || (mantissa > 0xff && exponent > 33)
        || (mantissa > 0xffff && exponent > 32);
    if overflow {
        return None;
    }
    let target = if exponent <= 3 {
        U256::from(mantissa >> (8 * (3 - exponent)))
    } else {
        U256::from(mantissa) << (8 * (exponent - 3))
    };
    (!target.is_zero()).then_some(target)
}

/// The block-hash ordering used for proof of work: the 32 hash bytes read
/// as a little-endian 256-bit integer.
pub fn hash_as_target(hash: H256) -> U256 {
    U256::from_little_endian(hash.as_bytes())
}

/// Checks a header hash against its claimed difficulty.
pub fn check_proof_of_work(hash: H256, bits: u32, pow_limit: U256) -> bool {
    match target_from_compact(bits) {
        Some(target) if target <= pow_limit => hash_as_target(hash) <= target,
        _ => false,
    }
}

/// Grinds `nonce` (and `time` on nonce wrap) until the block header
/// satisfies its own `bits` target. Used to re-seed genesis constants when
/// they change; returns false when the target is unusable.
pub fn make_it_genesis(block: &mut Block, pow_limit: U256) -> bool {
    let Some(target) = target_from_compact(block.header.bits) else {
        return false;
    };
    if target > pow_limit {
        return false;
    }

    loop {
        let hash = block.header.hash();
        if hash_as_target(hash) <= target {
            break;
        }
        if block.header.nonce & 0xfff == 0 {
            debug!(nonce = block.header.nonce, hash = %hash, "still grinding genesis nonce");
        }
        block.header.nonce = block.header.nonce.wrapping_add(1);
        if block.header.nonce == 0 {
            debug!("nonce wrapped, incrementing time");
            block.header.time += 1;
        }
    }
    true
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn genesis_roots_are_the_empty_trie_hash() {
        let genesis = default_genesis_block(GenesisSeed {
            time: 1467160981,
            nonce: 13,
            bits: 0x207fffff,
        });
        assert_eq!(genesis.header.state_root, *EMPTY_TRIE_HASH);
        assert_eq!(genesis.header.utxo_root, *EMPTY_TRIE_HASH);
        assert_eq!(genesis.header.prev_hash, H256::zero());
    }

    #[test]
    fn genesis_merkle_root_is_coinbase_txid() {
        let genesis = default_genesis_block(GenesisSeed {
            time: 1467160981,
            nonce: 13,
            bits: 0x207fffff,
        });
        assert_eq!(genesis.transactions.len(), 1);
        assert!(genesis.transactions[0].is_coinbase());
        assert_eq!(
            genesis.header.merkle_root,
            genesis.transactions[0].hash()
        );
        // coinbase output pays the fixed reward
        assert_eq!(genesis.transactions[0].vout[0].value, 50 * COIN);
    }

    #[test]
    fn target_from_compact_rejects_bad_encodings() {
        // negative
        assert_eq!(target_from_compact(0x0180_0001), None);
        // zero mantissa
        assert_eq!(target_from_compact(0x0500_0000), None);
        // overflow
        assert_eq!(target_from_compact(0xff00_ffff), None);
        // plain values decode
        assert_eq!(
            target_from_compact(0x0404_5678),
            Some(U256::from(0x0456_7800u64))
        );
        assert!(target_from_compact(0x207f_ffff).is_some());
    }

    #[test]
    fn grind_regtest_genesis() {
        // the regtest target accepts roughly half of all hashes, so the
        // grind ends after a couple of iterations
        let mut genesis = default_genesis_block(GenesisSeed {
            time: 1467160981,
            nonce: 0,
            bits: 0x207fffff,
        });
        let pow_limit = U256::MAX >> 1;
        assert!(make_it_genesis(&mut genesis, pow_limit));
        assert!(check_proof_of_work(
            genesis.header.hash(),
            genesis.header.bits,
            pow_limit
        ));
    }

    #[test]
    fn grind_rejects_unusable_target() {
        let mut genesis = default_genesis_block(GenesisSeed {
            time: 0,
            nonce: 0,
            bits: 0x0500_0000,
        });
        assert!(!make_it_genesis(&mut genesis, U256::MAX >> 1));
    }
}
