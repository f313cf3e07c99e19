//! EMBDB - Persistent Word-Embedding Store
//!
//! Builds a key -> vector store from a fastText `.vec` file and answers
//! word lookups, phrase averages and nearest-neighbor queries over it.
//! Vectors are stored as fixed-width big-endian `f64` blobs, either in
//! memory or in a single append-only file.

pub mod codec;
pub mod config;
pub mod error;
pub mod parser;
pub mod session;
pub mod storage;
pub mod vector;

pub use codec::{decode_vector, encode_vector, ByteOrder};
pub use config::StoreConfig;
pub use error::{Error, Result};
pub use parser::{spawn_producer, RecordStream, VecFileReader, WordRecord};
pub use session::{DiskSession, IngestStats, MemorySession, Session};
pub use storage::{DiskStore, EmbeddingStore, MemoryStore};
pub use vector::{average_words, most_similar, SimilarityResult, WordResolver};
