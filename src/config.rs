//! Store Configuration

use crate::codec::ByteOrder;

/// Configuration carried by a session
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Byte order for new stores (existing disk stores keep their own)
    pub byte_order: ByteOrder,

    /// Reject vector files whose header declares another dimension
    pub expected_dimension: Option<usize>,

    /// Parse on a producer thread while the caller stores records
    pub pipelined: bool,

    /// Producer -> consumer channel capacity (0 = rendezvous)
    pub channel_capacity: usize,

    /// Log ingestion progress every N records (0 = off)
    pub log_every: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::BigEndian,
            expected_dimension: None,
            pipelined: true,
            channel_capacity: 1024,
            log_every: 100_000,
        }
    }
}

impl StoreConfig {
    pub fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    /// Require a fixed dimension, e.g. 300 for the published fastText vectors
    pub fn with_dimension(mut self, dim: usize) -> Self {
        self.expected_dimension = Some(dim);
        self
    }

    pub fn with_pipelined(mut self, pipelined: bool) -> Self {
        self.pipelined = pipelined;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_log_every(mut self, n: u64) -> Self {
        self.log_every = n;
        self
    }
}
