use bytes::Bytes;
use ethereum_types::{Address, H160, H256, U256};

use super::{
    constants::{RLP_EMPTY_LIST, RLP_NULL},
    error::RLPDecodeError,
};

/// Max payload size accepted when decoding. Any larger well-formed payload
/// is either a bug or malicious input.
const MAX_RLP_BYTES: usize = 1024 * 1024 * 1024;

/// Trait for decoding RLP encoded slices of data.
/// Implementors provide [`decode_unfinished`](RLPDecode::decode_unfinished),
/// which returns the decoded value along with the remaining bytes;
/// consumers usually call [`decode`](RLPDecode::decode).
pub trait RLPDecode: Sized {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError>;

    fn decode(rlp: &[u8]) -> Result<Self, RLPDecodeError> {
        let (decoded, remaining) = Self::decode_unfinished(rlp)?;
        if !remaining.is_empty() {
            return Err(RLPDecodeError::InvalidLength);
        }
        Ok(decoded)
    }
}

// One parsed item header: whether the item is a list, how many bytes the
// header itself takes, and how long the payload is.
struct ItemHeader {
    is_list: bool,
    header_len: usize,
    payload_len: usize,
}

fn parse_header(data: &[u8]) -> Result<ItemHeader, RLPDecodeError> {
    let first = *data.first().ok_or(RLPDecodeError::InvalidLength)?;
    let header = match first {
        // a bare byte is its own payload
        0x00..=0x7f => ItemHeader {
            is_list: false,
            header_len: 0,
            payload_len: 1,
        },
        0x80..=0xb7 => ItemHeader {
            is_list: false,
            header_len: 1,
            payload_len: (first - RLP_NULL) as usize,
        },
        0xb8..=0xbf => parse_long_header(data, false, first - 0xb7)?,
        0xc0..=0xf7 => ItemHeader {
            is_list: true,
            header_len: 1,
            payload_len: (first - RLP_EMPTY_LIST) as usize,
        },
        0xf8..=0xff => parse_long_header(data, true, first - 0xf7)?,
    };
    if data.len() < header.header_len + header.payload_len {
        return Err(RLPDecodeError::InvalidLength);
    }
    Ok(header)
}

fn parse_long_header(
    data: &[u8],
    is_list: bool,
    length_width: u8,
) -> Result<ItemHeader, RLPDecodeError> {
    let length_width = length_width as usize;
    let length_bytes = data
        .get(1..1 + length_width)
        .ok_or(RLPDecodeError::InvalidLength)?;
    let payload_len = usize::from_be_bytes(left_pad(length_bytes)?);
    if payload_len > MAX_RLP_BYTES {
        return Err(RLPDecodeError::InvalidLength);
    }
    Ok(ItemHeader {
        is_list,
        header_len: 1 + length_width,
        payload_len,
    })
}

/// Decodes one RLP item, returning whether it is a list, its payload
/// without the header, and the remaining bytes after it.
pub fn decode_rlp_item(data: &[u8]) -> Result<(bool, &[u8], &[u8]), RLPDecodeError> {
    let header = parse_header(data)?;
    let end = header.header_len + header.payload_len;
    Ok((
        header.is_list,
        &data[header.header_len..end],
        &data[end..],
    ))
}

/// Splits off the first RLP item, header included, returning it and the
/// remaining bytes after it.
pub fn get_item_with_prefix(data: &[u8]) -> Result<(&[u8], &[u8]), RLPDecodeError> {
    let header = parse_header(data)?;
    let end = header.header_len + header.payload_len;
    Ok((&data[..end], &data[end..]))
}

/// Decodes the payload of an RLP string item, rejecting lists.
pub fn decode_bytes(data: &[u8]) -> Result<(&[u8], &[u8]), RLPDecodeError> {
    match decode_rlp_item(data)? {
        (false, payload, rest) => Ok((payload, rest)),
        (true, _, _) => Err(RLPDecodeError::UnexpectedList),
    }
}

/// Pads a big-endian byte string with zeros on the left into a fixed-size
/// array, rejecting non-canonical leading zeros.
#[inline]
pub fn left_pad<const N: usize>(data: &[u8]) -> Result<[u8; N], RLPDecodeError> {
    if data.len() > N {
        return Err(RLPDecodeError::InvalidLength);
    }
    if data.first() == Some(&0) {
        return Err(RLPDecodeError::MalformedData);
    }
    let mut padded = [0; N];
    padded[N - data.len()..].copy_from_slice(data);
    Ok(padded)
}

impl RLPDecode for bool {
    #[inline(always)]
    fn decode_unfinished(buf: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let first = buf.first().ok_or(RLPDecodeError::InvalidLength)?;
        let value = match first {
            &RLP_NULL => false,
            0x01 => true,
            other => return Err(RLPDecodeError::MalformedBoolean(*other)),
        };
        Ok((value, &buf[1..]))
    }
}

impl RLPDecode for u8 {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (bytes, rest) = decode_bytes(rlp)?;
        let padded = left_pad::<1>(bytes)?;
        Ok((padded[0], rest))
    }
}

macro_rules! impl_uint_decode {
    ($($t:ty),+) => {
        $(impl RLPDecode for $t {
            fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
                let (bytes, rest) = decode_bytes(rlp)?;
                let padded = left_pad(bytes)?;
                Ok((<$t>::from_be_bytes(padded), rest))
            }
        })+
    };
}

impl_uint_decode!(u16, u32, u64, u128, usize);

impl<const N: usize> RLPDecode for [u8; N] {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (bytes, rest) = decode_bytes(rlp)?;
        let value = bytes.try_into().map_err(|_| RLPDecodeError::InvalidLength)?;
        Ok((value, rest))
    }
}

impl RLPDecode for Bytes {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (bytes, rest) = decode_bytes(rlp)?;
        Ok((Bytes::copy_from_slice(bytes), rest))
    }
}

impl RLPDecode for H256 {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (value, rest) = RLPDecode::decode_unfinished(rlp)?;
        Ok((H256(value), rest))
    }
}

impl RLPDecode for Address {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (value, rest) = RLPDecode::decode_unfinished(rlp)?;
        Ok((H160(value), rest))
    }
}

impl RLPDecode for U256 {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (bytes, rest) = decode_bytes(rlp)?;
        let padded: [u8; 32] = left_pad(bytes)?;
        Ok((U256::from_big_endian(&padded), rest))
    }
}

impl RLPDecode for String {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (bytes, rest) = decode_bytes(rlp)?;
        let value = String::from_utf8(bytes.to_vec()).map_err(|_| RLPDecodeError::MalformedData)?;
        Ok((value, rest))
    }
}

// A Vec<T> is decoded as a list of same-typed elements.
impl<T: RLPDecode> RLPDecode for Vec<T> {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (is_list, payload, input_rest) = decode_rlp_item(rlp)?;
        if !is_list {
            return Err(RLPDecodeError::MalformedData);
        }
        let mut result = Vec::new();
        let mut current = payload;
        while !current.is_empty() {
            let (item, rest) = T::decode_unfinished(current)?;
            result.push(item);
            current = rest;
        }
        Ok((result, input_rest))
    }
}

impl<T1: RLPDecode, T2: RLPDecode> RLPDecode for (T1, T2) {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (is_list, payload, input_rest) = decode_rlp_item(rlp)?;
        if !is_list {
            return Err(RLPDecodeError::MalformedData);
        }
        let (first, rest) = T1::decode_unfinished(payload)?;
        let (second, rest) = T2::decode_unfinished(rest)?;
        if !rest.is_empty() {
            return Err(RLPDecodeError::MalformedData);
        }
        Ok(((first, second), input_rest))
    }
}

impl<T1: RLPDecode, T2: RLPDecode, T3: RLPDecode> RLPDecode for (T1, T2, T3) {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (is_list, payload, input_rest) = decode_rlp_item(rlp)?;
        if !is_list {
            return Err(RLPDecodeError::MalformedData);
        }
        let (first, rest) = T1::decode_unfinished(payload)?;
        let (second, rest) = T2::decode_unfinished(rest)?;
        let (third, rest) = T3::decode_unfinished(rest)?;
        if !rest.is_empty() {
            return Err(RLPDecodeError::MalformedData);
        }
        Ok(((first, second, third), input_rest))
    }
}

impl<T1: RLPDecode, T2: RLPDecode, T3: RLPDecode, T4: RLPDecode> RLPDecode for (T1, T2, T3, T4) {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (is_list, payload, input_rest) = decode_rlp_item(rlp)?;
        if !is_list {
            return Err(RLPDecodeError::MalformedData);
        }
        let (first, rest) = T1::decode_unfinished(payload)?;
        let (second, rest) = T2::decode_unfinished(rest)?;
        let (third, rest) = T3::decode_unfinished(rest)?;
        let (fourth, rest) = T4::decode_unfinished(rest)?;
        if !rest.is_empty() {
            return Err(RLPDecodeError::MalformedData);
        }
        Ok(((first, second, third, fourth), input_rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::RLPEncode;

    #[test]
    fn scalars_roundtrip_across_the_byte_boundaries() {
        for value in [0u64, 1, 0x7f, 0x80, 0xff, 0x100, 1_467_160_981, u64::MAX] {
            let encoded = value.encode_to_vec();
            assert_eq!(u64::decode(&encoded).unwrap(), value);
        }
        for value in [U256::zero(), U256::from(0x80u64), U256::MAX] {
            let encoded = value.encode_to_vec();
            assert_eq!(U256::decode(&encoded).unwrap(), value);
        }
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut encoded = 5u8.encode_to_vec();
        encoded.push(0x00);
        assert!(u8::decode(&encoded).is_err());
    }

    #[test]
    fn non_canonical_leading_zeros_are_rejected() {
        // 0x82 00 01 would be a two-byte encoding of 1
        assert!(u64::decode(&[0x82, 0x00, 0x01]).is_err());
    }

    #[test]
    fn truncated_input_is_rejected() {
        // header promises 32 bytes, payload carries 2
        assert!(H256::decode(&[RLP_NULL + 32, 0xaa, 0xbb]).is_err());
        assert!(u64::decode(&[]).is_err());
    }

    #[test]
    fn oversized_scalars_do_not_fit_narrow_types() {
        let encoded = 0x1_0000u64.encode_to_vec();
        assert!(u16::decode(&encoded).is_err());
    }

    #[test]
    fn vin_shaped_nested_lists_roundtrip() {
        let vins: Vec<((H256, u32), u64)> = vec![
            ((H256::zero(), 0), 0),
            ((H256::repeat_byte(0xab), 1), 3_000),
        ];
        let encoded = vins.encode_to_vec();
        assert_eq!(Vec::<((H256, u32), u64)>::decode(&encoded).unwrap(), vins);
    }

    #[test]
    fn empty_list_decodes_to_an_empty_vec() {
        assert_eq!(
            Vec::<u64>::decode(&[RLP_EMPTY_LIST]).unwrap(),
            Vec::<u64>::new()
        );
    }

    #[test]
    fn account_shaped_fixed_width_fields_roundtrip() {
        let address = Address::repeat_byte(0xd7);
        assert_eq!(
            Address::decode(&address.encode_to_vec()).unwrap(),
            address
        );
        let root = H256::repeat_byte(0x56);
        assert_eq!(H256::decode(&root.encode_to_vec()).unwrap(), root);
    }
}
