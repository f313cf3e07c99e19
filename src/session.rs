//! Embedding Session
//!
//! A session owns one store and its configuration. It is `Send` but meant
//! for a single caller at a time; concurrent readers open their own session
//! over the same path.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::codec::{decode_vector_checked, encode_vector};
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::parser::{spawn_producer, VecFileReader, WordRecord};
use crate::storage::{DiskStore, EmbeddingStore, MemoryStore};
use crate::vector::{self, Neighbor, SimilarityResult, WordResolver};

/// Summary of a completed build
#[derive(Debug, Clone)]
pub struct IngestStats {
    pub records: u64,
    pub dimension: usize,
    pub elapsed: Duration,
}

/// Session over an embedding store
pub struct Session<S: EmbeddingStore> {
    store: S,
    config: StoreConfig,
    closed: bool,
}

pub type MemorySession = Session<MemoryStore>;
pub type DiskSession = Session<DiskStore>;

impl Session<MemoryStore> {
    /// Empty session held in memory
    pub fn in_memory(config: StoreConfig) -> Self {
        let store = MemoryStore::new(config.byte_order);
        Self::with_store(store, config)
    }

    /// Copy an on-disk store into memory for faster queries
    pub fn load_in_memory<P: AsRef<Path>>(path: P, config: StoreConfig) -> Result<Self> {
        let start = Instant::now();
        let disk = DiskStore::open(path, config.byte_order)?;
        let store = disk.load_into_memory()?;
        info!(
            words = store.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded store into memory"
        );
        Ok(Self::with_store(store, config))
    }
}

impl Session<DiskStore> {
    /// New on-disk store; fails if `path` exists
    pub fn create<P: AsRef<Path>>(path: P, config: StoreConfig) -> Result<Self> {
        let store = DiskStore::create(path, config.byte_order)?;
        Ok(Self::with_store(store, config))
    }

    /// Existing on-disk store
    pub fn open<P: AsRef<Path>>(path: P, config: StoreConfig) -> Result<Self> {
        let store = DiskStore::open(path, config.byte_order)?;
        Ok(Self::with_store(store, config))
    }
}

impl<S: EmbeddingStore> Session<S> {
    pub fn with_store(store: S, config: StoreConfig) -> Self {
        Self {
            store,
            config,
            closed: false,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Vector dimension, 0 before a build
    pub fn dimension(&self) -> usize {
        self.store.dimension()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Populate the store from a `.vec` stream
    ///
    /// Stops at the first malformed line or write error. Records stored
    /// before the failure are kept.
    pub fn build<R>(&mut self, reader: R) -> Result<IngestStats>
    where
        R: BufRead + Send + 'static,
    {
        if self.store.is_prepared() {
            return Err(Error::AlreadyBuilt);
        }

        let start = Instant::now();
        let reader = VecFileReader::new(reader)?;
        let dimension = reader.dimension();
        if let Some(expected) = self.config.expected_dimension {
            if expected != dimension {
                return Err(Error::DimensionMismatch {
                    line: 1,
                    word: String::new(),
                    expected,
                    actual: dimension,
                });
            }
        }

        self.store.prepare(dimension)?;
        info!(
            dimension,
            declared_words = ?reader.declared_words(),
            pipelined = self.config.pipelined,
            "Building embedding store"
        );

        let result = if self.config.pipelined {
            let mut stream = spawn_producer(reader, self.config.channel_capacity)?;
            let result = self.ingest(stream.by_ref());
            // Joins the producer on every path
            let produced = stream.finish();
            result.and_then(|records| produced.map(|_| records))
        } else {
            self.ingest(reader)
        };

        let records = match result {
            Ok(records) => records,
            Err(e) => {
                if e.is_format_error() {
                    warn!(stored = self.store.len(), error = %e, "Build aborted on malformed input");
                } else {
                    warn!(stored = self.store.len(), error = %e, "Build aborted");
                }
                return Err(e);
            }
        };
        self.store.flush()?;

        let stats = IngestStats {
            records,
            dimension,
            elapsed: start.elapsed(),
        };
        info!(
            records,
            dimension,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "Build complete"
        );
        Ok(stats)
    }

    /// Populate the store from a `.vec` file on disk
    pub fn build_file<P: AsRef<Path>>(&mut self, path: P) -> Result<IngestStats> {
        let file = File::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "Reading vector file");
        self.build(BufReader::new(file))
    }

    fn ingest<I>(&mut self, records: I) -> Result<u64>
    where
        I: IntoIterator<Item = Result<WordRecord>>,
    {
        let order = self.store.byte_order();
        let mut count = 0u64;

        for record in records {
            let record = record?;
            let blob = encode_vector(&record.vector, order);
            self.store.put(&record.word, blob)?;

            count += 1;
            if self.config.log_every > 0 && count % self.config.log_every == 0 {
                info!(records = count, "Ingestion progress");
            }
        }
        Ok(count)
    }

    fn ensure_built(&self) -> Result<()> {
        if self.store.is_prepared() {
            Ok(())
        } else {
            Err(Error::NotBuilt)
        }
    }

    fn decode(&self, blob: &[u8]) -> Result<Vec<f64>> {
        decode_vector_checked(blob, self.store.byte_order(), self.store.dimension())
    }

    /// Vector for `word`, `None` when absent
    pub fn find(&self, word: &str) -> Result<Option<Vec<f64>>> {
        self.ensure_built()?;
        match self.store.get(word)? {
            Some(blob) => self.decode(&blob).map(Some),
            None => Ok(None),
        }
    }

    /// Vector for `word`, [`Error::NoEmbeddingFound`] when absent
    pub fn embedding_vector(&self, word: &str) -> Result<Vec<f64>> {
        self.find(word)?.ok_or_else(|| Error::NoEmbeddingFound {
            word: word.to_string(),
        })
    }

    /// Batch lookup; absent words map to `None`
    pub fn embedding_vectors<W: AsRef<str>>(&self, words: &[W]) -> Result<Vec<Option<Vec<f64>>>> {
        words.iter().map(|w| self.find(w.as_ref())).collect()
    }

    /// Every stored vector in insertion order
    pub fn all_embedding_vectors(&self) -> Result<Vec<Vec<f64>>> {
        self.ensure_built()?;
        self.store
            .scan_all()?
            .iter()
            .map(|(_, blob)| self.decode(blob))
            .collect()
    }

    /// Every stored `(word, vector)` pair in insertion order
    pub fn all_embeddings(&self) -> Result<Vec<(String, Vec<f64>)>> {
        self.ensure_built()?;
        self.store
            .scan_all()?
            .into_iter()
            .map(|(word, blob)| Ok((word, self.decode(&blob)?)))
            .collect()
    }

    fn check_query(&self, query: &[f64]) -> Result<()> {
        self.ensure_built()?;
        if query.len() != self.dimension() {
            return Err(Error::VectorLength {
                expected: self.dimension(),
                actual: query.len(),
            });
        }
        Ok(())
    }

    /// Closest stored vector to `query`, excluding identical vectors
    ///
    /// Full scan of the store on every call.
    pub fn most_similar(&self, query: &[f64]) -> Result<SimilarityResult> {
        self.check_query(query)?;
        vector::most_similar_words(query, self.all_embeddings()?)
    }

    /// Closest stored vector to the vector of `word`
    pub fn most_similar_to_word(&self, word: &str) -> Result<SimilarityResult> {
        let query = self.embedding_vector(word)?;
        self.most_similar(&query)
    }

    /// Up to `k` nearest stored vectors to `query`
    pub fn top_k_similar(&self, query: &[f64], k: usize) -> Result<Vec<Neighbor>> {
        self.check_query(query)?;
        vector::top_k_similar(query, self.all_embeddings()?, k)
    }

    /// Phrase vector: mean of the vectors of `words`
    pub fn multi_word_embedding<W: AsRef<str>>(&self, words: &[W]) -> Result<Vec<f64>> {
        vector::average_words(words, self)
    }

    /// Flush and release the store
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.store.flush()
    }
}

impl<S: EmbeddingStore> WordResolver for Session<S> {
    fn resolve(&self, word: &str) -> Result<Vec<f64>> {
        self.embedding_vector(word)
    }
}

impl<S: EmbeddingStore> Drop for Session<S> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.store.flush() {
            warn!(error = %e, "Failed to flush store on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    const CAT_DOG: &str = "2 3\ncat 1.0 0.0 0.0\ndog 0.0 1.0 0.0\n";

    fn source(input: &str) -> Cursor<Vec<u8>> {
        Cursor::new(input.as_bytes().to_vec())
    }

    fn built(input: &str) -> MemorySession {
        let mut session = Session::in_memory(StoreConfig::default());
        session.build(source(input)).unwrap();
        session
    }

    #[test]
    fn test_end_to_end() {
        let session = built(CAT_DOG);
        assert_eq!(session.len(), 2);
        assert_eq!(session.dimension(), 3);
        assert_eq!(session.embedding_vector("cat").unwrap(), vec![1.0, 0.0, 0.0]);

        let result = session.most_similar(&[0.9, 0.1, 0.0]).unwrap();
        assert_eq!(result.word.as_deref(), Some("cat"));
        assert_eq!(result.vector, Some(vec![1.0, 0.0, 0.0]));
    }

    #[test]
    fn test_lookup_miss() {
        let session = built(CAT_DOG);
        for word in ["NotExist1", "Happiness"] {
            let err = session.embedding_vector(word).unwrap_err();
            assert!(err.is_not_found());
            assert_eq!(session.find(word).unwrap(), None);
        }
    }

    #[test]
    fn test_batch_lookup() {
        let session = built(CAT_DOG);
        let found = session.embedding_vectors(&["dog", "cow", "cat"]).unwrap();
        assert_eq!(found[0], Some(vec![0.0, 1.0, 0.0]));
        assert_eq!(found[1], None);
        assert_eq!(found[2], Some(vec![1.0, 0.0, 0.0]));
    }

    #[test]
    fn test_multi_word_embedding() {
        let session = built("2 3\na 1 2 3\nb 3 4 5\n");
        assert_eq!(
            session.multi_word_embedding(&["a", "b"]).unwrap(),
            vec![2.0, 3.0, 4.0]
        );

        let none: [&str; 0] = [];
        assert!(matches!(
            session.multi_word_embedding(&none),
            Err(Error::EmptyInput)
        ));
        assert!(session
            .multi_word_embedding(&["unknownWord"])
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_most_similar_to_word_skips_itself() {
        let session = built("3 2\nking 1.0 0.1\nqueen 0.9 0.2\napple 0.0 1.0\n");
        let result = session.most_similar_to_word("king").unwrap();
        assert_eq!(result.word.as_deref(), Some("queen"));

        let top = session.top_k_similar(&[1.0, 0.1], 5).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].word, "queen");
    }

    #[test]
    fn test_query_dimension_checked() {
        let session = built(CAT_DOG);
        assert!(matches!(
            session.most_similar(&[1.0, 0.0]),
            Err(Error::VectorLength { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_all_embeddings() {
        let session = built(CAT_DOG);
        let all = session.all_embedding_vectors().unwrap();
        assert_eq!(all, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
        let words: Vec<String> = session.all_embeddings().unwrap().into_iter().map(|(w, _)| w).collect();
        assert_eq!(words, vec!["cat", "dog"]);
    }

    #[test]
    fn test_inline_and_pipelined_agree() {
        let mut input = String::from("200 4\n");
        for i in 0..200 {
            input.push_str(&format!("w{} {} {} {} {}\n", i, i, -i, i * 2, 0.5));
        }

        let mut inline = Session::in_memory(StoreConfig::default().with_pipelined(false));
        let mut piped = Session::in_memory(StoreConfig::default().with_channel_capacity(2));
        let a = inline.build(source(&input)).unwrap();
        let b = piped.build(source(&input)).unwrap();

        assert_eq!(a.records, 200);
        assert_eq!(b.records, 200);
        assert_eq!(
            inline.all_embeddings().unwrap(),
            piped.all_embeddings().unwrap()
        );
    }

    #[test]
    fn test_malformed_line_aborts_build() {
        for pipelined in [true, false] {
            let mut session = Session::in_memory(StoreConfig::default().with_pipelined(pipelined));
            let err = session
                .build(source("3 2\na 1 2\nb 1\nc 3 4\n"))
                .unwrap_err();
            assert!(matches!(err, Error::DimensionMismatch { line: 3, .. }));
            assert!(err.is_format_error());
            // records before the failure are not rolled back
            assert_eq!(session.len(), 1);
            assert_eq!(session.find("c").unwrap(), None);
        }
    }

    #[test]
    fn test_nan_component_does_not_win_search() {
        for pipelined in [true, false] {
            let mut session = Session::in_memory(StoreConfig::default().with_pipelined(pipelined));
            session
                .build(source("3 2\nbad nan 1.0\ncat 1.0 0.0\ndog 0.0 1.0\n"))
                .unwrap();

            let best = session.most_similar(&[0.9, 0.1]).unwrap();
            assert_eq!(best.word.as_deref(), Some("cat"));
            assert!(best.similarity.is_finite());

            let top = session.top_k_similar(&[0.9, 0.1], 3).unwrap();
            let words: Vec<&str> = top.iter().map(|n| n.word.as_str()).collect();
            assert_eq!(words, vec!["cat", "dog"]);
        }
    }

    #[test]
    fn test_duplicate_word_aborts_build() {
        let mut session = Session::in_memory(StoreConfig::default().with_channel_capacity(1));
        let mut input = String::from("100 1\ndup 1.0\ndup 2.0\n");
        for i in 0..100 {
            input.push_str(&format!("w{} {}\n", i, i));
        }

        let err = session.build(source(&input)).unwrap_err();
        assert!(matches!(err, Error::DuplicateWord { ref word } if word == "dup"));
        assert_eq!(session.embedding_vector("dup").unwrap(), vec![1.0]);
    }

    #[test]
    fn test_build_twice_rejected() {
        let mut session = built(CAT_DOG);
        assert!(matches!(
            session.build(source(CAT_DOG)),
            Err(Error::AlreadyBuilt)
        ));
    }

    #[test]
    fn test_queries_before_build() {
        let session = Session::in_memory(StoreConfig::default());
        assert!(matches!(session.find("cat"), Err(Error::NotBuilt)));
        assert!(matches!(session.most_similar(&[1.0]), Err(Error::NotBuilt)));
    }

    #[test]
    fn test_expected_dimension() {
        let mut session = Session::in_memory(StoreConfig::default().with_dimension(300));
        let err = session.build(source(CAT_DOG)).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 300,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_disk_session_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vectors.embdb");
        let vec_path = dir.path().join("wiki.vec");
        std::fs::write(&vec_path, "4 2\nhas 0.5 0.5\nbut -0.25 1e-2\npage 3 4\n# 0 1\n").unwrap();

        {
            let mut session = Session::create(&path, StoreConfig::default()).unwrap();
            let stats = session.build_file(&vec_path).unwrap();
            assert_eq!(stats.records, 4);
            session.close().unwrap();
        }

        let session = Session::open(&path, StoreConfig::default()).unwrap();
        for word in ["has", "but", "page", "#"] {
            assert_eq!(session.embedding_vector(word).unwrap().len(), 2);
        }
        assert_eq!(session.embedding_vector("but").unwrap(), vec![-0.25, 0.01]);
        assert!(session.embedding_vector("Happiness").unwrap_err().is_not_found());

        let mem = Session::load_in_memory(&path, StoreConfig::default()).unwrap();
        assert_eq!(mem.all_embeddings().unwrap(), session.all_embeddings().unwrap());
        assert_eq!(
            mem.most_similar(&[1.0, 1.0]).unwrap(),
            session.most_similar(&[1.0, 1.0]).unwrap()
        );
    }

    #[test]
    fn test_disk_session_keeps_byte_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("le.embdb");
        let config = StoreConfig::default().with_byte_order(crate::codec::ByteOrder::LittleEndian);
        {
            let mut session = Session::create(&path, config).unwrap();
            session.build(source(CAT_DOG)).unwrap();
        }

        // opened with the default big-endian config
        let session = Session::open(&path, StoreConfig::default()).unwrap();
        assert_eq!(session.embedding_vector("dog").unwrap(), vec![0.0, 1.0, 0.0]);
    }
}
