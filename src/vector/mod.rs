//! Vector Module
//!
//! Similarity search and phrase aggregation over decoded embeddings.

mod aggregate;
mod similarity;

pub use aggregate::{average_vectors, average_words, WordResolver};
pub use similarity::{
    cosine_similarity, dot_product, magnitude, most_similar, most_similar_words, top_k_similar,
    Neighbor, SimilarityResult,
};
