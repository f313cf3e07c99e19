//! Producer Thread
//!
//! Runs a [`VecFileReader`] on its own thread and hands records to the
//! consumer through a bounded crossbeam channel. A full channel blocks the
//! producer; a dropped consumer makes the next send fail and the producer
//! exits.

use crossbeam::channel::{self, Receiver};
use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

use super::reader::{VecFileReader, WordRecord};
use crate::error::{Error, Result};

/// Consumer end of a producer thread
pub struct RecordStream {
    receiver: Option<Receiver<Result<WordRecord>>>,
    handle: Option<JoinHandle<u64>>,
    dimension: usize,
}

/// Move `reader` onto a producer thread feeding a channel of `capacity` slots
///
/// A capacity of 0 gives a rendezvous channel.
pub fn spawn_producer<R>(mut reader: VecFileReader<R>, capacity: usize) -> Result<RecordStream>
where
    R: BufRead + Send + 'static,
{
    let dimension = reader.dimension();
    let (sender, receiver) = channel::bounded(capacity);

    let handle = thread::Builder::new()
        .name("vec-producer".to_string())
        .spawn(move || {
            info!(dimension, capacity, "Producer started");
            let mut sent = 0u64;

            for item in reader.by_ref() {
                let failed = item.is_err();
                if sender.send(item).is_err() {
                    debug!(sent, "Consumer disconnected, stopping producer");
                    return sent;
                }
                if failed {
                    break;
                }
                sent += 1;
            }

            info!(sent, lines = reader.line_no(), "Producer stopped");
            sent
        })?;

    Ok(RecordStream {
        receiver: Some(receiver),
        handle: Some(handle),
        dimension,
    })
}

impl RecordStream {
    /// Dimensionality declared by the source header
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Disconnect and join the producer, returning how many records it sent
    pub fn finish(mut self) -> Result<u64> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<u64> {
        // Dropping the receiver unblocks a producer waiting on a full channel.
        self.receiver.take();
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| Error::Io(io::Error::other("producer thread panicked"))),
            None => Ok(0),
        }
    }
}

impl Iterator for RecordStream {
    type Item = Result<WordRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.as_ref()?.recv().ok()
    }
}

impl Drop for RecordStream {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
