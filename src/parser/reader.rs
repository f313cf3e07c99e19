//! Pull-based `.vec` reader

use std::io::BufRead;
use tracing::trace;

use crate::error::{Error, Result};

/// Placeholder key for lines whose word token is empty
const EMPTY_WORD: &str = " ";

/// One parsed line of a vector file
#[derive(Debug, Clone, PartialEq)]
pub struct WordRecord {
    pub word: String,
    pub vector: Vec<f64>,
}

/// Lazy record reader over a buffered text source
///
/// The header is consumed by [`VecFileReader::new`], so the dimension is
/// known before the first record is pulled. After the first error the
/// iterator is exhausted.
pub struct VecFileReader<R> {
    reader: R,
    dimension: usize,
    declared_words: Option<u64>,
    line_no: usize,
    buf: String,
    done: bool,
}

impl<R: BufRead> VecFileReader<R> {
    /// Read and validate the header line
    pub fn new(mut reader: R) -> Result<Self> {
        let mut buf = String::new();
        if reader.read_line(&mut buf)? == 0 {
            return Err(Error::MalformedHeader {
                line: 1,
                reason: "input is empty".to_string(),
            });
        }

        let header = strip_newline(&buf);
        let mut parts = header.split(' ');
        let words_tok = parts.next().unwrap_or_default();
        let dim_tok = parts.next().ok_or_else(|| Error::MalformedHeader {
            line: 1,
            reason: format!("expected `<vocab_size> <dim>`, got {:?}", header),
        })?;

        let dimension: usize = dim_tok.trim().parse().map_err(|_| Error::MalformedHeader {
            line: 1,
            reason: format!("dimension {:?} is not an integer", dim_tok),
        })?;
        if dimension == 0 {
            return Err(Error::MalformedHeader {
                line: 1,
                reason: "dimension must be positive".to_string(),
            });
        }

        let declared_words = words_tok.trim().parse().ok();

        Ok(Self {
            reader,
            dimension,
            declared_words,
            line_no: 1,
            buf,
            done: false,
        })
    }

    /// Dimensionality declared by the header
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Vocabulary size declared by the header, if it parsed
    pub fn declared_words(&self) -> Option<u64> {
        self.declared_words
    }

    /// Number of the last line read (the header is line 1)
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    fn read_record(&mut self) -> Result<Option<WordRecord>> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let line = strip_newline(&self.buf);
            if line.trim().is_empty() {
                trace!(line = self.line_no, "Skipping blank line");
                continue;
            }
            return parse_line(line, self.line_no, self.dimension).map(Some);
        }
    }
}

impl<R: BufRead> Iterator for VecFileReader<R> {
    type Item = Result<WordRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn strip_newline(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Parse `<word> <f64> ... <f64>` with exactly `dimension` components
fn parse_line(line: &str, line_no: usize, dimension: usize) -> Result<WordRecord> {
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let word = if word.is_empty() { EMPTY_WORD } else { word };

    let rest = rest.trim();
    let tokens: Vec<&str> = if rest.is_empty() {
        Vec::new()
    } else {
        rest.split(' ').collect()
    };

    if tokens.len() != dimension {
        return Err(Error::DimensionMismatch {
            line: line_no,
            word: word.to_string(),
            expected: dimension,
            actual: tokens.len(),
        });
    }

    let vector = tokens
        .iter()
        .map(|tok| {
            tok.parse::<f64>().map_err(|_| Error::InvalidFloat {
                line: line_no,
                word: word.to_string(),
                token: tok.to_string(),
            })
        })
        .collect::<Result<Vec<f64>>>()?;

    Ok(WordRecord {
        word: word.to_string(),
        vector,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(input: &str) -> VecFileReader<Cursor<Vec<u8>>> {
        VecFileReader::new(Cursor::new(input.as_bytes().to_vec())).unwrap()
    }

    #[test]
    fn test_parse_records() {
        let mut r = reader("2 3\ncat 1.0 0.0 0.0\ndog 0.0 1.0 0.0\n");
        assert_eq!(r.dimension(), 3);
        assert_eq!(r.declared_words(), Some(2));

        let cat = r.next().unwrap().unwrap();
        assert_eq!(cat.word, "cat");
        assert_eq!(cat.vector, vec![1.0, 0.0, 0.0]);

        let dog = r.next().unwrap().unwrap();
        assert_eq!(dog.word, "dog");
        assert_eq!(r.line_no(), 3);
        assert!(r.next().is_none());
    }

    #[test]
    fn test_every_record_has_declared_dimension() {
        let mut input = String::from("50 300\n");
        for i in 0..50 {
            input.push_str(&format!("w{}", i));
            for j in 0..300 {
                input.push_str(&format!(" {}", (i * j) as f64 * 0.001));
            }
            input.push('\n');
        }

        let records: Vec<WordRecord> = reader(&input).map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 50);
        assert!(records.iter().all(|r| r.vector.len() == 300));
    }

    #[test]
    fn test_short_line_is_fatal() {
        let mut input = String::from("3 300\n");
        let full: Vec<String> = (0..300).map(|_| "0.5".to_string()).collect();
        let short: Vec<String> = (0..299).map(|_| "0.5".to_string()).collect();
        input.push_str(&format!("good {}\n", full.join(" ")));
        input.push_str(&format!("bad {}\n", short.join(" ")));
        input.push_str(&format!("after {}\n", full.join(" ")));

        let mut r = reader(&input);
        assert!(r.next().unwrap().is_ok());

        match r.next().unwrap().unwrap_err() {
            Error::DimensionMismatch {
                line,
                word,
                expected,
                actual,
            } => {
                assert_eq!(line, 3);
                assert_eq!(word, "bad");
                assert_eq!(expected, 300);
                assert_eq!(actual, 299);
            }
            other => panic!("unexpected error: {other}"),
        }

        // no records after the failure
        assert!(r.next().is_none());
    }

    #[test]
    fn test_empty_word_becomes_space() {
        let mut r = reader("1 2\n 0.25 0.75\n");
        let rec = r.next().unwrap().unwrap();
        assert_eq!(rec.word, " ");
        assert_eq!(rec.vector, vec![0.25, 0.75]);
    }

    #[test]
    fn test_punctuation_and_exponent_forms() {
        let mut r = reader("2 3\n# -1.5e-3 +2E2 0\n, .5 -0.0 1e+1\n");
        let hash = r.next().unwrap().unwrap();
        assert_eq!(hash.word, "#");
        assert_eq!(hash.vector, vec![-1.5e-3, 200.0, 0.0]);

        let comma = r.next().unwrap().unwrap();
        assert_eq!(comma.word, ",");
        assert_eq!(comma.vector, vec![0.5, -0.0, 10.0]);
    }

    #[test]
    fn test_trailing_whitespace_and_crlf() {
        let mut r = reader("1 2\r\nhas 0.1 0.2 \r\n");
        let rec = r.next().unwrap().unwrap();
        assert_eq!(rec.word, "has");
        assert_eq!(rec.vector, vec![0.1, 0.2]);
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let records: Vec<_> = reader("2 1\n\na 1.0\n   \nb 2.0\n\n\n")
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].word, "b");
    }

    #[test]
    fn test_word_without_vector() {
        let err = reader("1 3\nlonely\n").next().unwrap().unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { actual: 0, .. }));
    }

    #[test]
    fn test_invalid_float() {
        let err = reader("1 2\nbut 0.1 abc\n").next().unwrap().unwrap_err();
        match err {
            Error::InvalidFloat { line, word, token } => {
                assert_eq!(line, 2);
                assert_eq!(word, "but");
                assert_eq!(token, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_headers() {
        for input in ["", "300\n", "10 abc\n", "10 0\n"] {
            let err = VecFileReader::new(Cursor::new(input.as_bytes().to_vec()))
                .err()
                .unwrap();
            assert!(matches!(err, Error::MalformedHeader { line: 1, .. }), "{input:?}");
        }
    }
}
