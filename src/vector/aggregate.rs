//! Multi-word Aggregation
//!
//! Phrase vectors as the element-wise mean of word vectors.

use crate::error::{Error, Result};

/// Resolves a word to its embedding vector
pub trait WordResolver {
    /// Vector for `word`, or [`Error::NoEmbeddingFound`] when absent
    fn resolve(&self, word: &str) -> Result<Vec<f64>>;
}

impl<F> WordResolver for F
where
    F: Fn(&str) -> Result<Vec<f64>>,
{
    fn resolve(&self, word: &str) -> Result<Vec<f64>> {
        self(word)
    }
}

/// Average the vectors of `words`
///
/// Fails on the first unresolved word; duplicates weight the mean.
pub fn average_words<S, R>(words: &[S], resolver: &R) -> Result<Vec<f64>>
where
    S: AsRef<str>,
    R: WordResolver + ?Sized,
{
    if words.is_empty() {
        return Err(Error::EmptyInput);
    }

    let vectors = words
        .iter()
        .map(|w| resolver.resolve(w.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    average_vectors(&vectors)
}

/// Element-wise mean of equally sized vectors
pub fn average_vectors<V: AsRef<[f64]>>(vectors: &[V]) -> Result<Vec<f64>> {
    let Some(first) = vectors.first() else {
        return Err(Error::EmptyInput);
    };

    let mut sum = first.as_ref().to_vec();
    for v in &vectors[1..] {
        let v = v.as_ref();
        if v.len() != sum.len() {
            return Err(Error::VectorLength {
                expected: sum.len(),
                actual: v.len(),
            });
        }
        sum.iter_mut().zip(v).for_each(|(s, x)| *s += x);
    }

    let scale = 1.0 / vectors.len() as f64;
    sum.iter_mut().for_each(|s| *s *= scale);
    Ok(sum)
}
