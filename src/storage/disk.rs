//! On-Disk Embedding Store
//!
//! Single append-only file with an in-memory word index.

use bytes::Bytes;
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{EmbeddingStore, MemoryStore};
use crate::codec::{encoded_len, ByteOrder};
use crate::error::{Error, Result};

/// File format:
/// - Magic: 4 bytes "EMBD"
/// - Version: 1 byte
/// - Byte order: 1 byte (0 = big-endian, 1 = little-endian)
/// - Dimension: 4 bytes
/// - Records: [word_len (4) + word + blob_len (4) + blob]*
///
/// Integer fields are little-endian; blobs use the declared byte order.
const STORE_MAGIC: &[u8; 4] = b"EMBD";
const STORE_VERSION: u8 = 1;
const HEADER_SIZE: u64 = 10;

struct DiskFile {
    file: BufWriter<File>,
    /// Cursor sits at end of file, ready to append
    at_end: bool,
}

/// Embedding store backed by a single file
pub struct DiskStore {
    path: PathBuf,
    inner: Mutex<DiskFile>,
    /// Word -> offset of its blob
    index: HashMap<String, u64>,
    /// Offset one past the last record
    end: u64,
    dimension: usize,
    byte_order: ByteOrder,
    prepared: bool,
}

impl DiskStore {
    /// Create a new store file; fails if `path` already exists
    pub fn create<P: AsRef<Path>>(path: P, byte_order: ByteOrder) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;
        info!(path = %path.display(), byte_order = byte_order.as_str(), "Created embedding store");

        Ok(Self {
            path,
            inner: Mutex::new(DiskFile {
                file: BufWriter::new(file),
                at_end: true,
            }),
            index: HashMap::new(),
            end: 0,
            dimension: 0,
            byte_order,
            prepared: false,
        })
    }

    /// Open an existing store file and rebuild its word index
    ///
    /// An empty file opens as an unprepared store using `default_order`.
    pub fn open<P: AsRef<Path>>(path: P, default_order: ByteOrder) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        let file_len = file.metadata()?.len();

        let mut store = Self {
            path,
            inner: Mutex::new(DiskFile {
                file: BufWriter::new(file.try_clone()?),
                at_end: false,
            }),
            index: HashMap::new(),
            end: 0,
            dimension: 0,
            byte_order: default_order,
            prepared: false,
        };
        if file_len == 0 {
            return Ok(store);
        }

        let mut reader = BufReader::new(&mut file);
        let (byte_order, dimension) = read_header(&mut reader)?;
        store.byte_order = byte_order;
        store.dimension = dimension;
        store.prepared = true;

        let mut pos = HEADER_SIZE;
        while pos < file_len {
            let (word, blob, blob_offset) = read_record(&mut reader, pos, dimension)?;
            pos = blob_offset + blob.len() as u64;
            if store.index.insert(word.clone(), blob_offset).is_some() {
                return Err(Error::corrupt(format!("duplicate word {:?} in store", word)));
            }
        }
        store.end = pos;

        info!(
            path = %store.path.display(),
            words = store.index.len(),
            dimension,
            "Opened embedding store"
        );
        Ok(store)
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy every entry into a [`MemoryStore`]
    pub fn load_into_memory(&self) -> Result<MemoryStore> {
        if !self.prepared {
            return Err(Error::NotBuilt);
        }
        let entries = self.scan_all()?;
        debug!(words = entries.len(), "Loading store into memory");
        MemoryStore::from_entries(self.dimension, self.byte_order, entries)
    }

    fn append(&self, buf: &[u8]) -> io::Result<()> {
        let mut inner = self.inner.lock();
        if !inner.at_end {
            inner.file.seek(SeekFrom::Start(self.end))?;
            inner.at_end = true;
        }
        inner.file.write_all(buf)
    }
}

impl EmbeddingStore for DiskStore {
    fn prepare(&mut self, dimension: usize) -> Result<()> {
        if self.prepared {
            return Err(Error::AlreadyBuilt);
        }
        let dim = u32::try_from(dimension)
            .map_err(|_| Error::corrupt(format!("dimension {} does not fit the header", dimension)))?;

        let mut header = Vec::with_capacity(HEADER_SIZE as usize);
        header.extend_from_slice(STORE_MAGIC);
        header.push(STORE_VERSION);
        header.push(self.byte_order as u8);
        header.extend_from_slice(&dim.to_le_bytes());
        self.append(&header)?;

        self.end = HEADER_SIZE;
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

        let mut record = Vec::with_capacity(8 + word.len() + blob.len());
        record.extend_from_slice(&(word.len() as u32).to_le_bytes());
        record.extend_from_slice(word.as_bytes());
        record.extend_from_slice(&(blob.len() as u32).to_le_bytes());
        record.extend_from_slice(&blob);
        self.append(&record)?;

        let blob_offset = self.end + 8 + word.len() as u64;
        self.index.insert(word.to_string(), blob_offset);
        self.end += record.len() as u64;
        Ok(())
    }

    fn get(&self, word: &str) -> Result<Option<Bytes>> {
        let Some(&offset) = self.index.get(word) else {
            return Ok(None);
        };

        let mut blob = vec![0u8; encoded_len(self.dimension)];
        let mut inner = self.inner.lock();
        // Seeking the BufWriter flushes pending appends first.
        inner.file.seek(SeekFrom::Start(offset))?;
        inner.at_end = false;
        inner.file.get_mut().read_exact(&mut blob)?;
        Ok(Some(Bytes::from(blob)))
    }

    fn scan_all(&self) -> Result<Vec<(String, Bytes)>> {
        if !self.prepared {
            return Ok(Vec::new());
        }

        let mut inner = self.inner.lock();
        inner.file.seek(SeekFrom::Start(HEADER_SIZE))?;
        inner.at_end = false;

        let mut reader = BufReader::new(inner.file.get_mut());
        let mut entries = Vec::with_capacity(self.index.len());
        let mut pos = HEADER_SIZE;
        while pos < self.end {
            let (word, blob, blob_offset) = read_record(&mut reader, pos, self.dimension)?;
            pos = blob_offset + blob.len() as u64;
            entries.push((word, blob));
        }
        Ok(entries)
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn flush(&mut self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.file.flush()?;
        inner.file.get_ref().sync_data()?;
        Ok(())
    }
}

fn read_header<R: Read>(reader: &mut R) -> Result<(ByteOrder, usize)> {
    let mut header = [0u8; HEADER_SIZE as usize];
    reader
        .read_exact(&mut header)
        .map_err(|_| Error::corrupt("truncated header"))?;

    if &header[0..4] != STORE_MAGIC {
        return Err(Error::corrupt("invalid store magic"));
    }
    if header[4] != STORE_VERSION {
        return Err(Error::corrupt(format!("unsupported store version: {}", header[4])));
    }
    let byte_order = ByteOrder::from_u8(header[5])
        .ok_or_else(|| Error::corrupt(format!("unknown byte order tag: {}", header[5])))?;
    let dimension = u32::from_le_bytes([header[6], header[7], header[8], header[9]]) as usize;
    if dimension == 0 {
        return Err(Error::corrupt("dimension is zero"));
    }

    Ok((byte_order, dimension))
}

/// Read the record starting at `pos`; returns word, blob and blob offset
fn read_record<R: Read>(reader: &mut R, pos: u64, dimension: usize) -> Result<(String, Bytes, u64)> {
    let truncated = |_| Error::corrupt(format!("truncated record at offset {}", pos));

    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).map_err(truncated)?;
    let word_len = u32::from_le_bytes(len_buf) as usize;
    let mut word_buf = vec![0u8; word_len];
    reader.read_exact(&mut word_buf).map_err(truncated)?;
    let word = String::from_utf8(word_buf)
        .map_err(|_| Error::corrupt(format!("word at offset {} is not UTF-8", pos)))?;

    reader.read_exact(&mut len_buf).map_err(truncated)?;
    let blob_len = u32::from_le_bytes(len_buf) as usize;
    if blob_len != encoded_len(dimension) {
        return Err(Error::corrupt(format!(
            "blob for {:?} is {} bytes, expected {}",
            word,
            blob_len,
            encoded_len(dimension)
        )));
    }
    let mut blob = vec![0u8; blob_len];
    reader.read_exact(&mut blob).map_err(truncated)?;

    let blob_offset = pos + 8 + word_len as u64;
    Ok((word, Bytes::from(blob), blob_offset))
}
