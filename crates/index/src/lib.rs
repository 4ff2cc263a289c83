//! # Index - byte-range index over the sorted file
//!
//! The sorted file keeps every key's records contiguous. The index maps each
//! distinct key to the exact byte range `[start, end)` its records occupy, so
//! a lookup is one seek plus a bounded read, whatever the record lengths.
//!
//! ## Index file format
//!
//! ```text
//! #recostore-index v1 build=<id> data_start=<n> data_end=<n> records=<n> crc32=<hex>\n
//! key,start,end\n
//! ... one line per distinct key, ascending key order ...
//! ```
//!
//! The header is always (and only) the first line, so keys that happen to
//! start with `#` need no escaping. Ranges are end-exclusive and, taken in
//! key order, tile `[data_start, data_end)` without gaps or overlaps.
//!
//! ## Lifecycle
//!
//! - [`build_index`] scans a finished sorted file once.
//! - [`write_index`] persists the result atomically.
//! - [`load_index`] parses it back into a [`KeyIndex`] at startup.

mod builder;
mod file;

use std::collections::BTreeMap;
use std::io;
use std::ops::Bound;

use thiserror::Error;

pub use builder::build_index;
pub use file::{load_index, write_index, INDEX_MAGIC};

/// Errors raised while building, writing or loading an index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("sorted file header: {0}")]
    Header(#[from] extsort::HeaderError),

    #[error("sorted file record: {0}")]
    Record(#[from] record::RecordError),

    #[error("sorted file is not sorted at offset {offset}: {key:?} follows {previous:?}")]
    Unsorted {
        offset: u64,
        key: String,
        previous: String,
    },

    #[error("index line {line}: {reason}")]
    Format { line: u64, reason: String },
}

/// Byte range `[start, end)` of one key's records in the sorted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRange {
    pub start: u64,
    pub end: u64,
}

impl KeyRange {
    /// Length of the range in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Metadata tying an index to the sorted file it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHeader {
    pub build_id: String,
    pub data_start: u64,
    pub data_end: u64,
    pub records: u64,
    pub crc32: u32,
}

/// Index entries in sorted-file order, as produced by [`build_index`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntries {
    pub header: IndexHeader,
    pub entries: Vec<(String, KeyRange)>,
}

impl IndexEntries {
    /// Converts into the lookup structure used at query time.
    pub fn into_key_index(self) -> KeyIndex {
        KeyIndex {
            header: self.header,
            ranges: self.entries.into_iter().collect(),
        }
    }
}

/// In-memory index: key to byte range, plus the header it was loaded with.
///
/// Immutable after construction; share it freely across threads.
#[derive(Debug, Clone)]
pub struct KeyIndex {
    header: IndexHeader,
    ranges: BTreeMap<String, KeyRange>,
}

impl KeyIndex {
    /// Byte range for `key`, if the key is present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<KeyRange> {
        self.ranges.get(key).copied()
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.ranges.contains_key(key)
    }

    #[must_use]
    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// All `(key, range)` pairs in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, KeyRange)> {
        self.ranges.iter().map(|(k, r)| (k.as_str(), *r))
    }

    /// Keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.ranges.keys().map(|k| k.as_str())
    }

    /// Keys starting with `prefix`, in ascending order.
    pub fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.ranges
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .map(|(k, _)| k.as_str())
            .take_while(move |k| k.starts_with(prefix))
    }
}
