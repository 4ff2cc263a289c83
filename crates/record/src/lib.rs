//! # Record - the `(key, target, score)` triple and its line format
//!
//! Every artifact RecoStore produces (input, run files, the sorted file) is a
//! sequence of records serialized one per line:
//!
//! ```text
//! key,target,score\n
//! ```
//!
//! `key` and `target` may not contain the delimiter or a line break, so record
//! boundaries are unambiguous and byte offsets captured while reading can be
//! used to seek straight back to a record. `score` is written with the shortest
//! representation that parses back to the same `f64`.
//!
//! ## Example
//!
//! ```rust
//! use record::Record;
//!
//! let r = Record::new("A", "T1", 0.5).unwrap();
//! let mut buf = Vec::new();
//! r.write_to(&mut buf).unwrap();
//! assert_eq!(buf, b"A,T1,0.5\n");
//! ```

use std::cmp::Ordering;
use std::io::{self, BufRead, Write};

use thiserror::Error;

/// Field separator inside a serialized record.
pub const DELIMITER: char = ',';

/// A single store entry: `key` maps to `target` with a relevance `score`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: String,
    pub target: String,
    pub score: f64,
}

/// Errors produced while parsing or validating records.
#[derive(Debug, Error)]
pub enum RecordError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A line could not be parsed into a record.
    #[error("line {line}: {reason}")]
    Parse { line: u64, reason: String },

    /// A field value cannot be represented in the line format.
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

fn check_text_field(field: &'static str, value: &str) -> Result<(), RecordError> {
    if let Some(c) = value.chars().find(|c| matches!(c, ',' | '\n' | '\r')) {
        return Err(RecordError::InvalidField {
            field,
            reason: format!("contains reserved character {:?}", c),
        });
    }
    Ok(())
}

impl Record {
    /// Builds a record, rejecting values the line format cannot carry.
    pub fn new(
        key: impl Into<String>,
        target: impl Into<String>,
        score: f64,
    ) -> Result<Self, RecordError> {
        let key = key.into();
        let target = target.into();
        if key.is_empty() {
            return Err(RecordError::InvalidField {
                field: "key",
                reason: "empty".to_string(),
            });
        }
        check_text_field("key", &key)?;
        check_text_field("target", &target)?;
        if score.is_nan() {
            return Err(RecordError::InvalidField {
                field: "score",
                reason: "NaN".to_string(),
            });
        }
        Ok(Self { key, target, score })
    }

    /// Parses one line (with or without its trailing line break).
    ///
    /// Returns `Ok(None)` for a blank line. `line` is only used for error
    /// messages.
    pub fn parse(text: &str, line: u64) -> Result<Option<Self>, RecordError> {
        let text = text
            .strip_suffix('\n')
            .map(|t| t.strip_suffix('\r').unwrap_or(t))
            .unwrap_or(text);
        if text.trim().is_empty() {
            return Ok(None);
        }

        let mut fields = text.split(DELIMITER);
        let (key, target, score) = match (fields.next(), fields.next(), fields.next(), fields.next())
        {
            (Some(k), Some(t), Some(s), None) => (k, t, s),
            _ => {
                return Err(RecordError::Parse {
                    line,
                    reason: format!(
                        "expected 3 fields separated by '{}', got {}",
                        DELIMITER,
                        text.split(DELIMITER).count()
                    ),
                })
            }
        };

        if key.is_empty() {
            return Err(RecordError::Parse {
                line,
                reason: "empty key".to_string(),
            });
        }
        if key.contains('\r') || target.contains('\r') {
            return Err(RecordError::Parse {
                line,
                reason: "stray carriage return".to_string(),
            });
        }
        let score: f64 = score.trim().parse().map_err(|_| RecordError::Parse {
            line,
            reason: format!("invalid score {:?}", score),
        })?;
        if score.is_nan() {
            return Err(RecordError::Parse {
                line,
                reason: "score is NaN".to_string(),
            });
        }

        Ok(Some(Self {
            key: key.to_string(),
            target: target.to_string(),
            score,
        }))
    }

    /// Writes the record as one line and returns the number of bytes written.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<u64> {
        let line = self.to_line();
        w.write_all(line.as_bytes())?;
        Ok(line.len() as u64)
    }

    /// The serialized form of this record, line break included.
    #[must_use]
    pub fn to_line(&self) -> String {
        format!(
            "{}{d}{}{d}{}\n",
            self.key,
            self.target,
            self.score,
            d = DELIMITER
        )
    }

    /// Total order used everywhere records are sorted: by key only.
    #[must_use]
    pub fn cmp_key(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

/// Sequential record reader over any [`BufRead`].
///
/// Tracks the byte offset of every record it returns, relative to where the
/// reader started, so callers can build position indexes. Blank lines are
/// skipped but still counted in offsets and line numbers.
pub struct RecordReader<R: BufRead> {
    rdr: R,
    /// Reusable line buffer.
    buf: String,
    /// Bytes consumed so far.
    offset: u64,
    /// Number of the last line read (1-based).
    line: u64,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(rdr: R) -> Self {
        Self::with_position(rdr, 0, 0)
    }

    /// Starts counting from `offset` and `line` instead of zero, for readers
    /// positioned past a header.
    pub fn with_position(rdr: R, offset: u64, line: u64) -> Self {
        Self {
            rdr,
            buf: String::with_capacity(128),
            offset,
            line,
        }
    }

    /// Byte offset of the next unread line.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Consumes the reader, returning the underlying source.
    pub fn into_inner(self) -> R {
        self.rdr
    }

    /// Returns the next record together with the offset it starts at.
    pub fn next_with_offset(&mut self) -> Result<Option<(u64, Record)>, RecordError> {
        loop {
            self.buf.clear();
            let start = self.offset;
            let n = self.rdr.read_line(&mut self.buf).map_err(|e| {
                if e.kind() == io::ErrorKind::InvalidData {
                    RecordError::Parse {
                        line: self.line + 1,
                        reason: "not valid UTF-8".to_string(),
                    }
                } else {
                    RecordError::Io(e)
                }
            })?;
            if n == 0 {
                return Ok(None);
            }
            self.offset += n as u64;
            self.line += 1;
            if let Some(rec) = Record::parse(&self.buf, self.line)? {
                return Ok(Some((start, rec)));
            }
        }
    }

    /// Returns the next record, or `None` at end of input.
    pub fn next_record(&mut self) -> Result<Option<Record>, RecordError> {
        Ok(self.next_with_offset()?.map(|(_, r)| r))
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<Record, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
