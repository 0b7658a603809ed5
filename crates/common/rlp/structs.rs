use bytes::BufMut;

use super::{
    decode::{RLPDecode, decode_rlp_item, get_item_with_prefix},
    encode::{RLPEncode, encode_length},
    error::RLPDecodeError,
};

/// # Struct decoding helper
///
/// Decodes a struct from an RLP list, field by field, in the order the
/// fields are passed to [`Decoder::decode_field`].
#[derive(Debug)]
#[must_use = "`Decoder` must be consumed with `finish` to perform decoding checks"]
pub struct Decoder<'a> {
    payload: &'a [u8],
    remaining: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Result<Self, RLPDecodeError> {
        match decode_rlp_item(buf)? {
            (true, payload, remaining) => Ok(Self { payload, remaining }),
            (false, _, _) => Err(RLPDecodeError::UnexpectedString),
        }
    }

    pub fn decode_field<T: RLPDecode>(self, name: &str) -> Result<(T, Self), RLPDecodeError> {
        let (field, rest) = <T as RLPDecode>::decode_unfinished(self.payload)
            .map_err(|err| field_decode_error::<T>(name, err))?;
        Ok((
            field,
            Self {
                payload: rest,
                ..self
            },
        ))
    }

    /// Returns the next field without decoding it, prefix included.
    pub fn get_encoded_item(self) -> Result<(Vec<u8>, Self), RLPDecodeError> {
        let (field, rest) = get_item_with_prefix(self.payload)?;
        Ok((
            field.to_vec(),
            Self {
                payload: rest,
                ..self
            },
        ))
    }

    /// Finishes decoding and returns the bytes after the list.
    /// Errors if the list payload was not fully consumed.
    pub const fn finish(self) -> Result<&'a [u8], RLPDecodeError> {
        if self.payload.is_empty() {
            Ok(self.remaining)
        } else {
            Err(RLPDecodeError::MalformedData)
        }
    }

    /// Returns true once the list payload has been fully consumed.
    pub const fn is_done(&self) -> bool {
        self.payload.is_empty()
    }
}

fn field_decode_error<T>(field_name: &str, err: RLPDecodeError) -> RLPDecodeError {
    let typ = std::any::type_name::<T>();
    RLPDecodeError::Custom(format!(
        "Error decoding field '{field_name}' of type {typ}: {err}"
    ))
}

/// # Struct encoding helper
///
/// Encodes a struct as an RLP list, field by field, in the order the fields
/// are passed to [`Encoder::encode_field`].
#[must_use = "`Encoder` must be consumed with `finish` to perform the encoding"]
pub struct Encoder<'a> {
    buf: &'a mut dyn BufMut,
    temp_buf: Vec<u8>,
}

impl<'a> Encoder<'a> {
    pub fn new(buf: &'a mut dyn BufMut) -> Self {
        Self {
            buf,
            temp_buf: Default::default(),
        }
    }

    /// Stores a field to be encoded.
    pub fn encode_field<T: RLPEncode>(mut self, value: &T) -> Self {
        <T as RLPEncode>::encode(value, &mut self.temp_buf);
        self
    }

    /// Stores a field to be encoded as a byte string.
    /// Bypasses the list interpretation of `Vec<u8>`.
    pub fn encode_bytes(mut self, value: &[u8]) -> Self {
        <[u8] as RLPEncode>::encode(value, &mut self.temp_buf);
        self
    }

    /// Adds an already-encoded item to the list without re-encoding it.
    pub fn encode_raw(mut self, value: &[u8]) -> Self {
        self.temp_buf.put_slice(value);
        self
    }

    /// Finishes encoding the struct and writes the result to the buffer.
    pub fn finish(self) {
        encode_length(self.temp_buf.len(), self.buf);
        self.buf.put_slice(&self.temp_buf);
    }
}

#[cfg(test)]
mod tests {
    use super::{Decoder, Encoder};
    use crate::encode::RLPEncode;
    use ethereum_types::H256;

    // The shape of one serialized UTXO reference.
    #[derive(Debug, PartialEq, Eq)]
    struct Reference {
        txid: H256,
        vout: u32,
        amount: u64,
    }

    fn sample() -> Reference {
        Reference {
            txid: H256::repeat_byte(0x42),
            vout: 1,
            amount: 5_000,
        }
    }

    #[test]
    fn encoder_agrees_with_the_tuple_form() {
        let reference = sample();
        let mut buf = Vec::new();
        Encoder::new(&mut buf)
            .encode_field(&reference.txid)
            .encode_field(&reference.vout)
            .encode_field(&reference.amount)
            .finish();

        let tuple_encoded =
            (reference.txid, reference.vout, reference.amount).encode_to_vec();
        assert_eq!(buf, tuple_encoded);
    }

    #[test]
    fn decoder_walks_fields_in_order_and_checks_exhaustion() {
        let reference = sample();
        let encoded =
            (reference.txid, reference.vout, reference.amount).encode_to_vec();

        let decoder = Decoder::new(&encoded).unwrap();
        let (txid, decoder) = decoder.decode_field("txid").unwrap();
        let (vout, decoder) = decoder.decode_field("vout").unwrap();
        assert!(!decoder.is_done());
        let (amount, decoder) = decoder.decode_field("amount").unwrap();
        assert!(decoder.is_done());
        let rest = decoder.finish().unwrap();

        assert!(rest.is_empty());
        assert_eq!(Reference { txid, vout, amount }, reference);
    }

    #[test]
    fn finish_rejects_unconsumed_fields() {
        let reference = sample();
        let encoded =
            (reference.txid, reference.vout, reference.amount).encode_to_vec();
        let decoder = Decoder::new(&encoded).unwrap();
        let (_txid, decoder) = decoder.decode_field::<H256>("txid").unwrap();
        assert!(decoder.finish().is_err());
    }
}
