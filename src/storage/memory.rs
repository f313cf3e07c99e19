//! In-Memory Embedding Store
//!
//! Insertion-ordered entries with a hash index on the word.

use bytes::Bytes;
use hashbrown::HashMap;

use super::EmbeddingStore;
use crate::codec::{encoded_len, ByteOrder};
use crate::error::{Error, Result};

/// Embedding store held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Vec<(String, Bytes)>,
    index: HashMap<String, usize>,
    dimension: usize,
    byte_order: ByteOrder,
    prepared: bool,
}

impl MemoryStore {
    /// Create an empty, unprepared store
    pub fn new(byte_order: ByteOrder) -> Self {
        Self {
            byte_order,
            ..Default::default()
        }
    }

    /// Build a prepared store from existing entries
    pub fn from_entries(
        dimension: usize,
        byte_order: ByteOrder,
        entries: Vec<(String, Bytes)>,
    ) -> Result<Self> {
        let mut store = Self::new(byte_order);
        store.prepare(dimension)?;
        store.entries.reserve(entries.len());
        for (word, blob) in entries {
            store.put(&word, blob)?;
        }
        Ok(store)
    }
}

impl EmbeddingStore for MemoryStore {
    fn prepare(&mut self, dimension: usize) -> Result<()> {
        if self.prepared {
            return Err(Error::AlreadyBuilt);
        }
        self.dimension = dimension;
        self.prepared = true;
        Ok(())
    }

    fn is_prepared(&self) -> bool {
        self.prepared
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    fn put(&mut self, word: &str, blob: Bytes) -> Result<()> {
        if !self.prepared {
            return Err(Error::NotBuilt);
        }
        if blob.len() != encoded_len(self.dimension) {
            return Err(Error::VectorLength {
                expected: self.dimension,
                actual: blob.len() / 8,
            });
        }
        if self.index.contains_key(word) {
            return Err(Error::DuplicateWord {
                word: word.to_string(),
            });
        }

        self.index.insert(word.to_string(), self.entries.len());
        self.entries.push((word.to_string(), blob));
        Ok(())
    }

    fn get(&self, word: &str) -> Result<Option<Bytes>> {
        Ok(self
            .index
            .get(word)
            .map(|&i| self.entries[i].1.clone()))
    }

    fn scan_all(&self) -> Result<Vec<(String, Bytes)>> {
        Ok(self.entries.clone())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
