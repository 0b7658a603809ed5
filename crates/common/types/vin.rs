use bytes::BufMut;
use ethereum_types::{H256, U256};

use quanta_rlp::{
    decode::RLPDecode,
    encode::RLPEncode,
    error::RLPDecodeError,
    structs::{Decoder, Encoder},
};

use crate::Amount;

use super::transaction::OutPoint;

/// One unspent output backing a contract account's balance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vin {
    pub prevout: OutPoint,
    pub amount: Amount,
}

impl Vin {
    pub fn new(prevout: OutPoint, amount: Amount) -> Self {
        Self { prevout, amount }
    }

    /// Numeric txid+vout key used to break amount ties deterministically.
    pub fn tiebreak_key(&self) -> U256 {
        U256::from_little_endian(self.prevout.txid.as_bytes())
            .overflowing_add(U256::from(self.prevout.vout))
            .0
    }
}

// Trie payload shape: ((txid, vout), amount), amounts as unsigned words.
impl RLPEncode for Vin {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&(self.prevout.txid, self.prevout.vout))
            .encode_field(&(self.amount as u64))
            .finish();
    }
}

impl RLPDecode for Vin {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let ((txid, vout), decoder) = decoder.decode_field::<(H256, u32)>("outpoint")?;
        let (amount, decoder) = decoder.decode_field::<u64>("amount")?;
        Ok((
            Self {
                prevout: OutPoint::new(txid, vout),
                amount: amount as Amount,
            },
            decoder.finish()?,
        ))
    }
}

/// Ordered sequence of UTXO references backing a contract account.
/// Index 0 of a contract's set is the zero-value identity sentinel inserted
/// at creation; coin selection never consumes it.
pub type VinSet = Vec<Vin>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rlp_roundtrip() {
        let vin = Vin::new(OutPoint::new(H256::repeat_byte(0xcd), 3), 1500);
        let encoded = vin.encode_to_vec();
        assert_eq!(Vin::decode(&encoded).unwrap(), vin);

        let set: VinSet = vec![vin, Vin::new(OutPoint::new(H256::zero(), 0), 0)];
        let encoded = set.encode_to_vec();
        assert_eq!(VinSet::decode(&encoded).unwrap(), set);
    }

    #[test]
    fn tiebreak_key_orders_by_txid_then_vout() {
        let low = Vin::new(OutPoint::new(H256::zero(), 1), 5);
        let high = Vin::new(OutPoint::new(H256::zero(), 2), 5);
        assert!(low.tiebreak_key() < high.tiebreak_key());
    }
}
