//! Vector Similarity Functions
//!
//! Cosine similarity and the linear nearest-neighbor scan.

use tracing::trace;

use crate::error::{Error, Result};

/// Compute dot product of two vectors
///
/// Uses unrolled loop for better CPU performance.
#[inline]
pub fn dot_product(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let len = a.len().min(b.len());
    let mut sum = 0.0f64;

    // Process 4 elements at a time (manual unrolling)
    let chunks = len / 4;
    let remainder = len % 4;

    for i in 0..chunks {
        let idx = i * 4;
        sum += a[idx] * b[idx];
        sum += a[idx + 1] * b[idx + 1];
        sum += a[idx + 2] * b[idx + 2];
        sum += a[idx + 3] * b[idx + 3];
    }

    for i in (len - remainder)..len {
        sum += a[i] * b[i];
    }

    sum
}

/// Euclidean norm
#[inline]
pub fn magnitude(v: &[f64]) -> f64 {
    dot_product(v, v).sqrt()
}

/// Compute cosine similarity between two vectors
///
/// Returns `None` when either vector has zero magnitude or the result is
/// not finite (NaN or infinite components).
#[inline]
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Option<f64> {
    cosine_with_magnitude(a, magnitude(a), b)
}

/// Cosine similarity with the magnitude of `a` already known
fn cosine_with_magnitude(a: &[f64], mag_a: f64, b: &[f64]) -> Option<f64> {
    let denom = mag_a * magnitude(b);
    if denom == 0.0 {
        return None;
    }
    let sim = dot_product(a, b) / denom;
    sim.is_finite().then_some(sim)
}

/// Outcome of a nearest-neighbor scan
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityResult {
    /// Word of the best match, when the corpus carries words
    pub word: Option<String>,
    /// Best matching vector; `None` if no candidate qualified
    pub vector: Option<Vec<f64>>,
    /// Cosine similarity of the best match, 0.0 when not found
    pub similarity: f64,
}

impl SimilarityResult {
    pub fn not_found() -> Self {
        Self {
            word: None,
            vector: None,
            similarity: 0.0,
        }
    }

    pub fn is_found(&self) -> bool {
        self.vector.is_some()
    }
}

/// A scored neighbor returned by [`top_k_similar`]
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub word: String,
    pub vector: Vec<f64>,
    pub similarity: f64,
}

/// Scan `corpus` for the vector closest to `query` by cosine similarity
///
/// Candidates identical to the query are skipped, as are candidates whose
/// similarity is undefined (zero magnitude or non-finite components). Ties
/// keep the first candidate in corpus order.
pub fn most_similar<I, V>(query: &[f64], corpus: I) -> Result<SimilarityResult>
where
    I: IntoIterator<Item = V>,
    V: Into<Vec<f64>>,
{
    let best = scan(query, corpus.into_iter().map(|v| (None, v.into())))?;
    Ok(best.unwrap_or_else(SimilarityResult::not_found))
}

/// Like [`most_similar`] over `(word, vector)` pairs, reporting the word
pub fn most_similar_words<I>(query: &[f64], corpus: I) -> Result<SimilarityResult>
where
    I: IntoIterator<Item = (String, Vec<f64>)>,
{
    let best = scan(query, corpus.into_iter().map(|(w, v)| (Some(w), v)))?;
    Ok(best.unwrap_or_else(SimilarityResult::not_found))
}

/// Up to `k` neighbors of `query`, by descending similarity
///
/// Same exclusion rules as [`most_similar`]; equal scores keep corpus order.
pub fn top_k_similar<I>(query: &[f64], corpus: I, k: usize) -> Result<Vec<Neighbor>>
where
    I: IntoIterator<Item = (String, Vec<f64>)>,
{
    let query_mag = checked_magnitude(query)?;
    let mut results = Vec::new();

    for (word, candidate) in corpus {
        if let Some(similarity) = score(query, query_mag, &candidate)? {
            results.push(Neighbor {
                word,
                vector: candidate,
                similarity,
            });
        }
    }

    // Stable sort keeps corpus order among ties
    results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    results.truncate(k);
    Ok(results)
}

fn scan<I>(query: &[f64], corpus: I) -> Result<Option<SimilarityResult>>
where
    I: Iterator<Item = (Option<String>, Vec<f64>)>,
{
    let query_mag = checked_magnitude(query)?;
    let mut best: Option<SimilarityResult> = None;

    for (word, candidate) in corpus {
        let Some(similarity) = score(query, query_mag, &candidate)? else {
            continue;
        };

        let better = best
            .as_ref()
            .map(|b| similarity > b.similarity)
            .unwrap_or(true);
        if better {
            best = Some(SimilarityResult {
                word,
                vector: Some(candidate),
                similarity,
            });
        }
    }

    Ok(best)
}

fn checked_magnitude(query: &[f64]) -> Result<f64> {
    let mag = magnitude(query);
    if mag.is_finite() && mag > 0.0 {
        Ok(mag)
    } else {
        Err(Error::DegenerateVector)
    }
}

/// Cosine score of one candidate, or `None` if it does not qualify
fn score(query: &[f64], query_mag: f64, candidate: &[f64]) -> Result<Option<f64>> {
    if candidate.len() != query.len() {
        return Err(Error::VectorLength {
            expected: query.len(),
            actual: candidate.len(),
        });
    }
    if candidate == query {
        return Ok(None);
    }

    let similarity = cosine_with_magnitude(query, query_mag, candidate);
    if similarity.is_none() {
        trace!("Skipping candidate with undefined similarity");
    }
    Ok(similarity)
}
