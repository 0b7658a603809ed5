//! UTXO half of the state: per-address ordered vin sets, cached over the
//! second authenticated trie.

use std::collections::HashSet;

use ethereum_types::Address;

use quanta_common::types::{Vin, VinSet};
use quanta_rlp::structs::{Decoder, Encoder};

use crate::QuantaState;
use crate::error::StateError;

// Trie payload: a 1-list wrapping the vin list.
fn encode_vins(vins: &VinSet) -> Vec<u8> {
    let mut buf = Vec::new();
    Encoder::new(&mut buf).encode_field(vins).finish();
    buf
}

fn decode_vins(payload: &[u8]) -> Result<VinSet, StateError> {
    let decoder = Decoder::new(payload)?;
    let (vins, decoder) = decoder.decode_field::<VinSet>("vins")?;
    decoder.finish()?;
    Ok(vins)
}

/// Imposes the deterministic selection order on a vin set: amount
/// descending, ties broken by the numeric txid+vout key ascending. Applied
/// only where out-of-order UTXOs are introduced; the day-to-day discipline
/// is append-only.
pub fn sort_outpoints(vins: &mut VinSet) {
    vins.sort_by(|a, b| {
        b.amount
            .cmp(&a.amount)
            .then_with(|| a.tiebreak_key().cmp(&b.tiebreak_key()))
    });
}

impl QuantaState {
    /// Loads an address' vin set into the cache if the trie holds one.
    pub fn ensure_cached_utxo(&mut self, address: Address) -> Result<(), StateError> {
        if self.cache_utxo.contains_key(&address) {
            return Ok(());
        }
        if let Some(payload) = self.trie_utxo.get(address.as_bytes())? {
            let vins = decode_vins(&payload)?;
            self.cache_utxo.insert(address, vins);
        }
        Ok(())
    }

    pub fn vins_in_use(&mut self, address: Address) -> Result<bool, StateError> {
        self.ensure_cached_utxo(address)?;
        Ok(self.cache_utxo.contains_key(&address))
    }

    pub fn get_vins(&mut self, address: Address) -> Result<VinSet, StateError> {
        self.ensure_cached_utxo(address)?;
        Ok(self.cache_utxo.get(&address).cloned().unwrap_or_default())
    }

    pub fn set_vins(&mut self, address: Address, vins: VinSet) -> Result<(), StateError> {
        self.ensure_cached_utxo(address)?;
        self.cache_utxo.insert(address, vins);
        Ok(())
    }

    /// Appends one entry, creating the set if the address has none.
    pub fn add_vin(&mut self, address: Address, vin: Vin) -> Result<(), StateError> {
        self.ensure_cached_utxo(address)?;
        self.cache_utxo.entry(address).or_default().push(vin);
        Ok(())
    }

    pub fn add_vins(&mut self, address: Address, vins: VinSet) -> Result<(), StateError> {
        self.ensure_cached_utxo(address)?;
        self.cache_utxo.entry(address).or_default().extend(vins);
        Ok(())
    }

    /// Consumes `count` entries from the front, starting at index 1: the
    /// identity sentinel at index 0 is never spent. Fails when fewer than
    /// `count` consumable entries exist.
    pub fn sub_vins(&mut self, address: Address, count: usize) -> Result<(), StateError> {
        self.ensure_cached_utxo(address)?;
        match self.cache_utxo.get_mut(&address) {
            Some(vins) if vins.len().saturating_sub(1) >= count => {
                vins.drain(1..1 + count);
                Ok(())
            }
            _ => Err(StateError::NotEnoughCash),
        }
    }

    /// Flushes the vin cache into the UTXO trie: sets whose account died
    /// lose their key, the rest are re-encoded. Returns the touched
    /// addresses.
    pub fn commit_utxo(&mut self) -> Result<HashSet<Address>, StateError> {
        let mut flushed = HashSet::new();
        let cache = std::mem::take(&mut self.cache_utxo);
        for (address, vins) in cache {
            if !self.address_in_use(address)? {
                self.trie_utxo.remove(address.as_bytes())?;
            } else {
                self.trie_utxo.insert(address.as_bytes(), encode_vins(&vins))?;
            }
            flushed.insert(address);
        }
        Ok(flushed)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ethereum_types::H256;
    use quanta_common::types::OutPoint;

    fn vin(txid_byte: u8, vout: u32, amount: i64) -> Vin {
        Vin::new(OutPoint::new(H256::repeat_byte(txid_byte), vout), amount)
    }

    #[test]
    fn vins_payload_roundtrip() {
        let vins = vec![vin(0, 0, 0), vin(0xab, 2, 700)];
        let payload = encode_vins(&vins);
        assert_eq!(decode_vins(&payload).unwrap(), vins);
    }

    #[test]
    fn sort_orders_amount_descending() {
        let mut vins = vec![vin(1, 0, 10), vin(2, 0, 30), vin(3, 0, 20)];
        sort_outpoints(&mut vins);
        let amounts: Vec<i64> = vins.iter().map(|v| v.amount).collect();
        assert_eq!(amounts, vec![30, 20, 10]);
    }

    #[test]
    fn sort_breaks_ties_by_outpoint_key_ascending() {
        let mut vins = vec![vin(9, 1, 5), vin(3, 0, 5), vin(3, 1, 5)];
        sort_outpoints(&mut vins);
        assert_eq!(
            vins,
            vec![vin(3, 0, 5), vin(3, 1, 5), vin(9, 1, 5)]
        );
    }

    fn new_state() -> crate::QuantaState {
        use ethereum_types::U256;
        crate::QuantaState::new(
            U256::zero(),
            crate::StateDB::in_memory(),
            crate::StateDB::in_memory(),
            crate::BaseState::Empty,
        )
    }

    #[test]
    fn add_vins_appends_in_order() {
        let mut state = new_state();
        let address = Address::repeat_byte(1);
        state.add_vin(address, vin(0, 0, 0)).unwrap();
        state
            .add_vins(address, vec![vin(1, 0, 10), vin(2, 0, 20)])
            .unwrap();
        assert_eq!(
            state.get_vins(address).unwrap(),
            vec![vin(0, 0, 0), vin(1, 0, 10), vin(2, 0, 20)]
        );
        assert!(state.vins_in_use(address).unwrap());
    }

    #[test]
    fn set_vins_replaces_the_sequence() {
        let mut state = new_state();
        let address = Address::repeat_byte(2);
        state.add_vin(address, vin(1, 0, 10)).unwrap();
        state.set_vins(address, vec![vin(9, 9, 90)]).unwrap();
        assert_eq!(state.get_vins(address).unwrap(), vec![vin(9, 9, 90)]);
    }

    #[test]
    fn sub_vins_on_unknown_address_fails() {
        let mut state = new_state();
        assert!(matches!(
            state.sub_vins(Address::repeat_byte(3), 1),
            Err(StateError::NotEnoughCash)
        ));
    }

    #[test]
    fn commit_utxo_round_trips_through_the_trie() {
        let mut state = new_state();
        let address = Address::repeat_byte(4);
        // the account must exist or the flush drops the vin set
        state
            .add_balance(address, ethereum_types::U256::from(30))
            .unwrap();
        state
            .add_vins(address, vec![vin(0, 0, 0), vin(1, 0, 30)])
            .unwrap();
        state.commit().unwrap();
        let flushed = state.commit_utxo().unwrap();
        assert!(flushed.contains(&address));

        // cache is gone; the next read reloads from the trie
        assert_eq!(
            state.get_vins(address).unwrap(),
            vec![vin(0, 0, 0), vin(1, 0, 30)]
        );
    }

    #[test]
    fn commit_utxo_drops_sets_of_dead_accounts() {
        let mut state = new_state();
        let address = Address::repeat_byte(5);
        state.add_vin(address, vin(0, 0, 0)).unwrap();
        // no account backs this address
        state.commit_utxo().unwrap();
        assert!(!state.vins_in_use(address).unwrap());
    }
}
