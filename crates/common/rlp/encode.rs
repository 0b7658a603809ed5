use bytes::{BufMut, Bytes};
use ethereum_types::{Address, H256, U256};

use super::constants::{RLP_EMPTY_LIST, RLP_NULL};

pub trait RLPEncode {
    fn encode(&self, buf: &mut dyn BufMut);

    fn length(&self) -> usize {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf.len()
    }

    fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }
}

/// Encodes a value into a fresh buffer.
/// For encoding into an existing one, use [`RLPEncode::encode`].
pub fn encode<T: RLPEncode>(value: T) -> Vec<u8> {
    value.encode_to_vec()
}

/// Writes the header of a list whose payload occupies `payload_len` bytes.
#[inline]
pub fn encode_length(payload_len: usize, buf: &mut dyn BufMut) {
    if payload_len < 56 {
        buf.put_u8(RLP_EMPTY_LIST + payload_len as u8);
    } else {
        put_long_header(0xf7, payload_len, buf);
    }
}

// Header of a byte string. Single bytes below RLP_NULL are their own
// encoding and take none.
#[inline]
fn put_string_header(len: usize, buf: &mut dyn BufMut) {
    if len < 56 {
        buf.put_u8(RLP_NULL + len as u8);
    } else {
        put_long_header(0xb7, len, buf);
    }
}

// Long form shared by strings and lists: the length's own width is added
// to the base marker, followed by the length in big-endian.
fn put_long_header(base: u8, len: usize, buf: &mut dyn BufMut) {
    let be = len.to_be_bytes();
    let skip = be.iter().take_while(|byte| **byte == 0).count();
    buf.put_u8(base + (be.len() - skip) as u8);
    buf.put_slice(&be[skip..]);
}

impl RLPEncode for [u8] {
    #[inline(always)]
    fn encode(&self, buf: &mut dyn BufMut) {
        match self {
            [single] if *single < RLP_NULL => buf.put_u8(*single),
            _ => {
                put_string_header(self.len(), buf);
                buf.put_slice(self);
            }
        }
    }
}

// Scalars encode as the shortest big-endian byte string; zero is the
// empty string.
macro_rules! impl_uint_encode {
    ($($t:ty),+) => {
        $(impl RLPEncode for $t {
            fn encode(&self, buf: &mut dyn BufMut) {
                let be = self.to_be_bytes();
                let skip = be.iter().take_while(|byte| **byte == 0).count();
                be[skip..].encode(buf);
            }
        })+
    };
}

impl_uint_encode!(u8, u16, u32, u64, u128, usize);

impl RLPEncode for bool {
    #[inline(always)]
    fn encode(&self, buf: &mut dyn BufMut) {
        buf.put_u8(if *self { 0x01 } else { RLP_NULL });
    }

    #[inline(always)]
    fn length(&self) -> usize {
        1
    }
}

impl RLPEncode for U256 {
    fn encode(&self, buf: &mut dyn BufMut) {
        let skip = (self.leading_zeros() / 8) as usize;
        self.to_big_endian()[skip..].encode(buf)
    }
}

impl<const N: usize> RLPEncode for [u8; N] {
    #[inline]
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_slice().encode(buf)
    }
}

impl RLPEncode for Bytes {
    #[inline]
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_ref().encode(buf)
    }
}

impl RLPEncode for str {
    #[inline]
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_bytes().encode(buf)
    }
}

impl RLPEncode for &str {
    #[inline]
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_bytes().encode(buf)
    }
}

impl RLPEncode for String {
    #[inline]
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_bytes().encode(buf)
    }
}

impl RLPEncode for H256 {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_bytes().encode(buf)
    }
}

impl RLPEncode for Address {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_bytes().encode(buf)
    }
}

// A Vec<T> is a list of same-typed items. Byte strings go through
// `[u8]`/`Bytes` or `Encoder::encode_bytes` instead.
impl<T: RLPEncode> RLPEncode for Vec<T> {
    fn encode(&self, buf: &mut dyn BufMut) {
        let payload_len: usize = self.iter().map(RLPEncode::length).sum();
        encode_length(payload_len, buf);
        for item in self {
            item.encode(buf);
        }
    }
}

// Tuples are fixed-shape lists of mixed types.
macro_rules! impl_tuple_encode {
    ($($field:ident : $index:tt),+) => {
        impl<$($field: RLPEncode),+> RLPEncode for ($($field,)+) {
            fn encode(&self, buf: &mut dyn BufMut) {
                let payload_len = 0usize $(+ self.$index.length())+;
                encode_length(payload_len, buf);
                $(self.$index.encode(buf);)+
            }
        }
    };
}

impl_tuple_encode!(A: 0, B: 1);
impl_tuple_encode!(A: 0, B: 1, C: 2);
impl_tuple_encode!(A: 0, B: 1, C: 2, D: 3);
