/// Query path: `query()` and `handle_lookup()`.
///
/// A query resolves the key in the in-memory index, then reads exactly that
/// key's byte range from the sorted file with a fresh file handle. Keys not in
/// the index are answered without touching the disk.
use record::RecordReader;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use crate::{Store, StoreError};

/// Threshold used when the caller supplies none (or an unusable one).
pub const DEFAULT_MIN_SCORE: f64 = 0.0;

/// One query result: a target and its score.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub target: String,
    pub score: f64,
}

/// Parses a raw threshold string the way the HTTP and REPL surfaces accept it.
///
/// Missing, empty, unparsable and NaN values all become
/// [`DEFAULT_MIN_SCORE`]. Infinities are kept as given.
pub fn parse_min_score(raw: Option<&str>) -> f64 {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| !v.is_nan())
        .unwrap_or(DEFAULT_MIN_SCORE)
}

impl Store {
    /// Returns every record of `key` whose score is strictly greater than
    /// `min_score`, ordered by score ascending.
    ///
    /// Records with equal scores keep their order in the sorted file. A NaN
    /// threshold is treated as [`DEFAULT_MIN_SCORE`].
    ///
    /// # Errors
    ///
    /// - [`StoreError::Io`] if the sorted file cannot be read.
    /// - [`StoreError::Corrupt`] if the key's range holds an unparsable record,
    ///   a record of another key, or ends mid-record.
    pub fn query(&self, key: &str, min_score: f64) -> Result<Vec<Match>, StoreError> {
        let min_score = if min_score.is_nan() {
            DEFAULT_MIN_SCORE
        } else {
            min_score
        };

        let range = match self.index.get(key) {
            Some(r) => r,
            None => return Ok(Vec::new()),
        };

        let mut file = File::open(&self.sorted_path)?;
        file.seek(SeekFrom::Start(range.start))?;
        let mut reader =
            RecordReader::with_position(BufReader::new(file.take(range.len())), range.start, 0);

        let mut matches = Vec::new();
        loop {
            let (offset, rec) = match reader.next_with_offset() {
                Ok(Some(item)) => item,
                Ok(None) => break,
                Err(e) => {
                    return Err(StoreError::Corrupt {
                        offset: reader.offset(),
                        reason: e.to_string(),
                    })
                }
            };
            if rec.key != key {
                return Err(StoreError::Corrupt {
                    offset,
                    reason: format!("expected key {:?}, found {:?}", key, rec.key),
                });
            }
            if rec.score > min_score {
                matches.push(Match {
                    target: rec.target,
                    score: rec.score,
                });
            }
        }

        if reader.offset() != range.end {
            return Err(StoreError::Corrupt {
                offset: reader.offset(),
                reason: format!("range for {:?} ends at {} (file truncated?)", key, range.end),
            });
        }

        // Stable sort: equal scores stay in file order.
        matches.sort_by(|a, b| a.score.total_cmp(&b.score));

        log::debug!(
            "query {:?} min_score={} -> {} of range {}..{}",
            key,
            min_score,
            matches.len(),
            range.start,
            range.end
        );
        Ok(matches)
    }
}

/// Entry point for the network and REPL surfaces: applies the threshold
/// policy of [`parse_min_score`] and runs [`Store::query`].
pub fn handle_lookup(
    store: &Store,
    key: &str,
    raw_min_score: Option<&str>,
) -> Result<Vec<Match>, StoreError> {
    store.query(key, parse_min_score(raw_min_score))
}
