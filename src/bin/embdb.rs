//! EMBDB CLI
//!
//! Build an embedding store from a `.vec` file and query it.

use clap::{Parser, Subcommand};
use embdb::{DiskSession, EmbeddingStore, MemorySession, StoreConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// EMBDB - Persistent Word-Embedding Store
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Store file
    #[arg(short, long, global = true, default_value = "embeddings.embdb")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a .vec file into a new store
    Build {
        /// Path to the .vec file
        vec_file: PathBuf,

        /// Parse on the calling thread instead of a producer thread
        #[arg(long)]
        inline: bool,

        /// Producer channel capacity
        #[arg(long, default_value_t = 1024)]
        capacity: usize,

        /// Require this dimension in the file header
        #[arg(long)]
        dim: Option<usize>,

        /// Write blobs little-endian
        #[arg(long)]
        little_endian: bool,
    },

    /// Print the vectors of one or more words
    Lookup {
        #[arg(required = true)]
        words: Vec<String>,
    },

    /// Find the nearest neighbors of a word
    Similar {
        word: String,

        /// Number of neighbors
        #[arg(short, long, default_value_t = 1)]
        top: usize,

        /// Copy the store into memory before querying
        #[arg(long)]
        in_memory: bool,
    },

    /// Print the averaged vector of a phrase
    Average {
        #[arg(required = true)]
        words: Vec<String>,
    },

    /// Show store metadata
    Info,
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("embdb=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Build {
            vec_file,
            inline,
            capacity,
            dim,
            little_endian,
        } => {
            let mut config = StoreConfig::default()
                .with_pipelined(!inline)
                .with_channel_capacity(capacity);
            if let Some(dim) = dim {
                config = config.with_dimension(dim);
            }
            if little_endian {
                config = config.with_byte_order(embdb::ByteOrder::LittleEndian);
            }

            info!("Building {} from {}", args.db.display(), vec_file.display());
            let mut session = DiskSession::create(&args.db, config)?;
            let stats = session.build_file(&vec_file)?;
            session.close()?;

            println!(
                "Imported {} words ({} dimensions) in {:.2?}",
                stats.records, stats.dimension, stats.elapsed
            );
        }

        Command::Lookup { words } => {
            let session = DiskSession::open(&args.db, StoreConfig::default())?;
            for (word, vector) in words.iter().zip(session.embedding_vectors(words.as_slice())?) {
                match vector {
                    Some(v) => println!("{} {}", word, format_vector(&v)),
                    None => println!("{} (not found)", word),
                }
            }
        }

        Command::Similar {
            word,
            top,
            in_memory,
        } => {
            if top == 0 {
                anyhow::bail!("--top must be at least 1");
            }

            let neighbors = if in_memory {
                let session = MemorySession::load_in_memory(&args.db, StoreConfig::default())?;
                let query = session.embedding_vector(&word)?;
                session.top_k_similar(&query, top)?
            } else {
                let session = DiskSession::open(&args.db, StoreConfig::default())?;
                let query = session.embedding_vector(&word)?;
                session.top_k_similar(&query, top)?
            };

            if neighbors.is_empty() {
                println!("No similar words found");
            }
            for n in neighbors {
                println!("{:.6} {}", n.similarity, n.word);
            }
        }

        Command::Average { words } => {
            let session = DiskSession::open(&args.db, StoreConfig::default())?;
            let vector = session.multi_word_embedding(words.as_slice())?;
            println!("{}", format_vector(&vector));
        }

        Command::Info => {
            let session = DiskSession::open(&args.db, StoreConfig::default())?;
            let store = session.store();
            println!("path:       {}", store.path().display());
            println!("words:      {}", store.len());
            println!("dimension:  {}", store.dimension());
            println!("byte order: {}", store.byte_order().as_str());
        }
    }

    Ok(())
}

fn format_vector(v: &[f64]) -> String {
    v.iter()
        .map(|x| x.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
