//! Vector File Parser
//!
//! Streams `(word, vector)` records out of a fastText-style `.vec` text file.
//! The first line declares `<vocab_size> <dim>`; every following line is a
//! word and exactly `dim` space-separated floats.

mod producer;
mod reader;

pub use producer::{spawn_producer, RecordStream};
pub use reader::{VecFileReader, WordRecord};
