use ethereum_types::Address;

use super::wire::{WireEncode, write_bytes};

// Script opcodes used by the engine. Only the handful the executive emits
// are defined; the interpreter living in the outer node knows the rest.
pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_1: u8 = 0x51;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;
// Contract-chain extensions
pub const OP_EXEC: u8 = 0xc1;
pub const OP_EXEC_ASSIGN: u8 = 0xc2;
pub const OP_TXHASH: u8 = 0xc3;

/// A Bitcoin-style script: a plain byte program assembled from opcodes and
/// data pushes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script(Vec<u8>);

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn push_opcode(mut self, opcode: u8) -> Self {
        self.0.push(opcode);
        self
    }

    /// Pushes raw data with the appropriate push prefix.
    pub fn push_data(mut self, data: &[u8]) -> Self {
        match data.len() {
            0 => self.0.push(OP_0),
            len @ 1..=0x4b => {
                self.0.push(len as u8);
                self.0.extend_from_slice(data);
            }
            len @ 0x4c..=0xff => {
                self.0.push(OP_PUSHDATA1);
                self.0.push(len as u8);
                self.0.extend_from_slice(data);
            }
            len => {
                self.0.push(OP_PUSHDATA2);
                self.0.extend_from_slice(&(len as u16).to_le_bytes());
                self.0.extend_from_slice(data);
            }
        }
        self
    }

    /// Pushes a number in minimal CScriptNum encoding
    /// (little-endian, sign bit in the top bit of the last byte).
    pub fn push_num(self, value: i64) -> Self {
        if value == 0 {
            return self.push_data(&[]);
        }
        let negative = value < 0;
        let mut abs = value.unsigned_abs();
        let mut bytes = Vec::new();
        while abs > 0 {
            bytes.push((abs & 0xff) as u8);
            abs >>= 8;
        }
        if bytes.last().is_some_and(|b| b & 0x80 != 0) {
            bytes.push(if negative { 0x80 } else { 0x00 });
        } else if negative {
            if let Some(last) = bytes.last_mut() {
                *last |= 0x80;
            }
        }
        self.push_data(&bytes)
    }

    /// Standard pay-to-pubkey-hash locking script.
    pub fn pay_to_pubkey_hash(address: &Address) -> Self {
        Script::new()
            .push_opcode(OP_DUP)
            .push_opcode(OP_HASH160)
            .push_data(address.as_bytes())
            .push_opcode(OP_EQUALVERIFY)
            .push_opcode(OP_CHECKSIG)
    }

    /// Contract-to-contract value assignment script.
    pub fn exec_assign(address: &Address) -> Self {
        Script::new()
            .push_opcode(OP_0)
            .push_opcode(OP_0)
            .push_opcode(OP_0)
            .push_opcode(OP_1)
            .push_data(address.as_bytes())
            .push_opcode(OP_EXEC_ASSIGN)
    }

    /// Input script marking a synthesized contract spend.
    pub fn tx_hash_marker() -> Self {
        Script::new().push_opcode(OP_TXHASH)
    }

    pub fn is_pay_to_pubkey_hash(&self) -> bool {
        let s = &self.0;
        s.len() == 25
            && s[0] == OP_DUP
            && s[1] == OP_HASH160
            && s[2] == 20
            && s[23] == OP_EQUALVERIFY
            && s[24] == OP_CHECKSIG
    }
}

impl WireEncode for Script {
    fn wire_encode(&self, buf: &mut Vec<u8>) {
        write_bytes(&self.0, buf);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ethereum_types::Address;

    #[test]
    fn p2pkh_shape() {
        let script = Script::pay_to_pubkey_hash(&Address::repeat_byte(0xaa));
        assert!(script.is_pay_to_pubkey_hash());
        assert_eq!(script.as_bytes().len(), 25);
    }

    #[test]
    fn exec_assign_is_not_p2pkh() {
        let script = Script::exec_assign(&Address::repeat_byte(0xaa));
        assert!(!script.is_pay_to_pubkey_hash());
        assert_eq!(script.as_bytes().last(), Some(&OP_EXEC_ASSIGN));
    }

    #[test]
    fn push_num_minimal_encoding() {
        // the historical genesis scriptSig constants
        let script = Script::new().push_num(486604799).push_num(4);
        assert_eq!(
            script.as_bytes(),
            &[0x04, 0xff, 0xff, 0x00, 0x1d, 0x01, 0x04]
        );
    }

    #[test]
    fn push_num_sign_handling() {
        let script = Script::new().push_num(-5);
        assert_eq!(script.as_bytes(), &[0x01, 0x85]);

        let script = Script::new().push_num(0x80);
        assert_eq!(script.as_bytes(), &[0x02, 0x80, 0x00]);

        let script = Script::new().push_num(0);
        assert_eq!(script.as_bytes(), &[OP_0]);
    }
}
