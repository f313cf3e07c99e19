//! Vector Codec
//!
//! Fixed-width binary encoding of embedding vectors. Each component is
//! written as its 64-bit IEEE-754 pattern; there is no length prefix.

mod vector;

pub use vector::{decode_vector, decode_vector_checked, encode_vector, encoded_len, ByteOrder};
