//! Embedding vector <-> bytes

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// Bytes per encoded component
const F64_WIDTH: usize = 8;

/// Byte order used for encoded vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ByteOrder {
    #[default]
    BigEndian = 0,
    LittleEndian = 1,
}

impl ByteOrder {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ByteOrder::BigEndian),
            1 => Some(ByteOrder::LittleEndian),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ByteOrder::BigEndian => "big-endian",
            ByteOrder::LittleEndian => "little-endian",
        }
    }
}

/// Encoded size of a vector with `dim` components
#[inline]
pub fn encoded_len(dim: usize) -> usize {
    dim * F64_WIDTH
}

/// Encode a vector, one 8-byte float after another in vector order
pub fn encode_vector(vector: &[f64], order: ByteOrder) -> Bytes {
    let mut buf = BytesMut::with_capacity(encoded_len(vector.len()));
    match order {
        ByteOrder::BigEndian => vector.iter().for_each(|&x| buf.put_f64(x)),
        ByteOrder::LittleEndian => vector.iter().for_each(|&x| buf.put_f64_le(x)),
    }
    buf.freeze()
}

/// Decode a vector; the component count is `bytes.len() / 8`
pub fn decode_vector(mut bytes: &[u8], order: ByteOrder) -> Result<Vec<f64>> {
    if bytes.len() % F64_WIDTH != 0 {
        return Err(Error::MalformedEncoding { len: bytes.len() });
    }

    let mut vector = Vec::with_capacity(bytes.len() / F64_WIDTH);
    while bytes.has_remaining() {
        let x = match order {
            ByteOrder::BigEndian => bytes.get_f64(),
            ByteOrder::LittleEndian => bytes.get_f64_le(),
        };
        vector.push(x);
    }
    Ok(vector)
}

/// Decode a vector and require exactly `dim` components
pub fn decode_vector_checked(bytes: &[u8], order: ByteOrder, dim: usize) -> Result<Vec<f64>> {
    let vector = decode_vector(bytes, order)?;
    if vector.len() != dim {
        return Err(Error::VectorLength {
            expected: dim,
            actual: vector.len(),
        });
    }
    Ok(vector)
}
