//! Storage Engine
//!
//! Word -> encoded vector persistence. A store is prepared once with the
//! dimension and byte order of its vectors, filled append-only during a
//! build, then queried by exact word or full scan.

mod disk;
mod memory;

pub use disk::DiskStore;
pub use memory::MemoryStore;

use bytes::Bytes;

use crate::codec::ByteOrder;
use crate::error::Result;

/// Key -> blob store holding encoded embedding vectors
///
/// Keys are unique: `put` with a word that is already present fails with
/// [`Error::DuplicateWord`](crate::Error::DuplicateWord).
pub trait EmbeddingStore {
    /// One-time setup fixing the vector dimension and enabling the
    /// unique-word index
    fn prepare(&mut self, dimension: usize) -> Result<()>;

    /// Whether `prepare` has run (or the store was opened with data)
    fn is_prepared(&self) -> bool;

    /// Vector dimension, 0 until prepared
    fn dimension(&self) -> usize;

    /// Byte order of stored blobs
    fn byte_order(&self) -> ByteOrder;

    /// Insert a new word
    fn put(&mut self, word: &str, blob: Bytes) -> Result<()>;

    /// Exact-key lookup; `None` when the word is absent
    fn get(&self, word: &str) -> Result<Option<Bytes>>;

    /// Every `(word, blob)` pair in insertion order
    fn scan_all(&self) -> Result<Vec<(String, Bytes)>>;

    /// Number of stored words
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push buffered writes to the backing medium
    fn flush(&mut self) -> Result<()>;
}
