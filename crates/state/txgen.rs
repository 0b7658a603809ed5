//! Synthesized-transaction construction: deterministic coin selection
//! over a sender's vin set and the two output templates.

use ethereum_types::{Address, H256, U256};

use quanta_common::Amount;
use quanta_common::types::{OutPoint, Script, Transaction, TxIn, TxOut, Vin, VinSet};
use quanta_vm::Transfer;

use crate::QuantaState;
use crate::error::StateError;
use crate::executive::EnvInfo;

/// How a synthesized output locks its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransferType {
    ContractToContract,
    ContractToPubkeyhash,
}

/// Clamps a 256-bit ledger value into the on-chain amount domain.
pub(crate) fn amount_from_value(value: U256) -> Amount {
    value.min(U256::from(Amount::MAX as u64)).as_u64() as Amount
}

/// Spend refunding an on-chain output straight back to the sender's key.
pub(crate) fn create_p2pkh_tx(
    hash_with: H256,
    vout_number: u32,
    value: Amount,
    sender: Address,
) -> Transaction {
    Transaction {
        version: 1,
        time: 0,
        vin: vec![TxIn::new(
            OutPoint::new(hash_with, vout_number),
            Script::tx_hash_marker(),
        )],
        vout: vec![TxOut::new(value, Script::pay_to_pubkey_hash(&sender))],
        lock_time: 0,
    }
}

/// Walks the vin set from index 1, accumulating into `sum` until the
/// value is covered. Index 0 is the identity sentinel and never selected.
fn select_outputs(vins: &VinSet, value: Amount, sum: &mut Amount) -> VinSet {
    let mut selected = VinSet::new();
    for vin in vins.iter().skip(1) {
        *sum += vin.amount;
        selected.push(*vin);
        if value <= *sum {
            break;
        }
    }
    selected
}

fn create_inputs(selected: &VinSet) -> Vec<TxIn> {
    selected
        .iter()
        .map(|vin| TxIn::new(vin.prevout, Script::tx_hash_marker()))
        .collect()
}

fn create_outputs(
    from: Address,
    to: Address,
    value: Amount,
    sum: Amount,
    transfer_type: TransferType,
) -> Vec<TxOut> {
    let script = match transfer_type {
        TransferType::ContractToContract => Script::exec_assign(&to),
        TransferType::ContractToPubkeyhash => Script::pay_to_pubkey_hash(&to),
    };
    let mut outputs = vec![TxOut::new(value, script)];
    if value < sum {
        outputs.push(TxOut::new(sum - value, Script::exec_assign(&from)));
    }
    outputs
}

impl QuantaState {
    /// Materializes one pending transfer as a Bitcoin-shaped transaction.
    /// Returns the transaction and the number of vins it consumes, or
    /// None when the sender has no selectable vins (the transfer then
    /// stands in the ledger with no on-chain counterpart).
    pub(crate) fn generate_transaction(
        &mut self,
        transfer: &Transfer,
        env: &EnvInfo,
        tx_sender: Address,
    ) -> Result<Option<(Transaction, usize)>, StateError> {
        let sender_vins = self.get_vins(transfer.sender)?;
        let value = amount_from_value(transfer.value);
        let mut sum: Amount = 0;
        let selected = select_outputs(&sender_vins, value, &mut sum);
        if selected.is_empty() {
            return Ok(None);
        }

        let not_sender_nor_author =
            transfer.receiver != tx_sender && transfer.receiver != env.author;
        let transfer_type = if self.address_in_use(transfer.receiver)? && not_sender_nor_author {
            TransferType::ContractToContract
        } else {
            TransferType::ContractToPubkeyhash
        };

        let consumed = selected.len();
        let synthesized = Transaction {
            version: 1,
            time: 0,
            vin: create_inputs(&selected),
            vout: create_outputs(transfer.sender, transfer.receiver, value, sum, transfer_type),
            lock_time: 0,
        };
        Ok(Some((synthesized, consumed)))
    }

    /// Books a synthesized transaction against the vin caches: the
    /// consumed prefix leaves the sender, the receiver output lands in the
    /// receiver's set when it is a contract, and the change comes back to
    /// the sender.
    pub(crate) fn settle_synthesized(
        &mut self,
        synthesized: &Transaction,
        transfer: &Transfer,
        consumed: usize,
    ) -> Result<(), StateError> {
        self.sub_vins(transfer.sender, consumed)?;
        let txid = synthesized.hash();
        if !synthesized.vout[0].script_pubkey.is_pay_to_pubkey_hash() {
            self.add_vin(
                transfer.receiver,
                Vin::new(OutPoint::new(txid, 0), synthesized.vout[0].value),
            )?;
        }
        if synthesized.vout.len() > 1 {
            self.add_vin(
                transfer.sender,
                Vin::new(OutPoint::new(txid, 1), synthesized.vout[1].value),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn vin(byte: u8, amount: Amount) -> Vin {
        Vin::new(OutPoint::new(H256::repeat_byte(byte), 0), amount)
    }

    #[test]
    fn selection_skips_the_sentinel() {
        let vins = vec![vin(0, 0), vin(1, 40), vin(2, 60)];
        let mut sum = 0;
        let selected = select_outputs(&vins, 30, &mut sum);
        assert_eq!(selected, vec![vin(1, 40)]);
        assert_eq!(sum, 40);
    }

    #[test]
    fn selection_takes_the_first_sufficient_prefix() {
        let vins = vec![vin(0, 0), vin(1, 10), vin(2, 20), vin(3, 99)];
        let mut sum = 0;
        let selected = select_outputs(&vins, 25, &mut sum);
        assert_eq!(selected, vec![vin(1, 10), vin(2, 20)]);
        assert_eq!(sum, 30);
    }

    #[test]
    fn selection_on_empty_set_yields_nothing() {
        let vins = vec![vin(0, 0)];
        let mut sum = 0;
        assert!(select_outputs(&vins, 5, &mut sum).is_empty());
        assert_eq!(sum, 0);
    }

    #[test]
    fn outputs_carry_change_back_to_sender() {
        let from = Address::repeat_byte(1);
        let to = Address::repeat_byte(2);
        let outputs = create_outputs(from, to, 30, 100, TransferType::ContractToContract);
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].value, 30);
        assert_eq!(outputs[0].script_pubkey, Script::exec_assign(&to));
        assert_eq!(outputs[1].value, 70);
        assert_eq!(outputs[1].script_pubkey, Script::exec_assign(&from));
    }

    #[test]
    fn exact_sum_emits_no_change() {
        let from = Address::repeat_byte(1);
        let to = Address::repeat_byte(2);
        let outputs = create_outputs(from, to, 50, 50, TransferType::ContractToPubkeyhash);
        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].script_pubkey.is_pay_to_pubkey_hash());
    }

    #[test]
    fn refund_spend_shape() {
        let sender = Address::repeat_byte(7);
        let refund = create_p2pkh_tx(H256::repeat_byte(0xaa), 3, 900, sender);
        assert_eq!(refund.vin.len(), 1);
        assert_eq!(refund.vin[0].prevout, OutPoint::new(H256::repeat_byte(0xaa), 3));
        assert_eq!(refund.vout.len(), 1);
        assert_eq!(refund.vout[0].value, 900);
        assert!(refund.vout[0].script_pubkey.is_pay_to_pubkey_hash());
    }

    #[test]
    fn amount_clamps_oversized_values() {
        assert_eq!(amount_from_value(U256::from(1234u64)), 1234);
        assert_eq!(amount_from_value(U256::MAX), Amount::MAX);
    }
}
