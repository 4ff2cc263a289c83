//! # Engine - RecoStore build pipeline and query engine
//!
//! Ties the [`extsort`] and [`index`] crates together into a read-only,
//! disk-resident store of `(key, target, score)` records.
//!
//! ## Architecture
//!
//! ```text
//!  BUILD (once, sequential)                 QUERY (many, concurrent)
//!
//!  input.csv                                 key, min_score
//!     |                                          |
//!     v                                          v
//!  partition() -> runs                        Store::query
//!     |                                          |  index miss -> []
//!     v                                          v
//!  merge()     -> sorted file  <-----------  seek(start), read end-start bytes
//!     |                                          |
//!     v                                          v
//!  build_index() + write_index() -> index    filter score > min, sort by score
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module       | Purpose                                                  |
//! |--------------|----------------------------------------------------------|
//! | [`lib.rs`]   | `Store` struct, `open`, accessors, `Debug`, errors       |
//! | [`build`]    | `build_store()`: explicit partition/merge/index pipeline |
//! | [`read`]     | `query()`, `handle_lookup()`, threshold parsing          |
//! | [`verify`]   | full-scan consistency check against the index header     |
//! | [`recovery`] | removal of leftovers from interrupted builds             |
//!
//! ## Consistency
//!
//! The sorted file and the index carry the same build id. [`Store::open`]
//! refuses a pair whose ids, record-region bounds or file length disagree, so
//! a stale index can never silently answer queries against a newer file.
//! Data changes require a rebuild and a restart; there is no live swap.

mod build;
mod read;
mod recovery;
mod verify;

use extsort::HeaderError;
use index::{IndexError, KeyIndex};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use build::{build_store, work_dir_for, BuildOptions, BuildReport};
pub use read::{handle_lookup, parse_min_score, Match, DEFAULT_MIN_SCORE};
pub use recovery::cleanup_interrupted_build;
pub use verify::VerifyReport;

/// Errors surfaced by [`Store`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("sorted file header: {0}")]
    Header(#[from] HeaderError),

    #[error("index does not match sorted file: {0}")]
    Mismatch(String),

    #[error("corrupt record at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },
}

/// An opened, immutable store: the sorted file plus its in-memory index.
///
/// `Store` is `Send + Sync`. Queries take `&self`, open their own file
/// handle and never mutate shared state, so any number may run at once.
pub struct Store {
    sorted_path: PathBuf,
    index_path: PathBuf,
    index: KeyIndex,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let h = self.index.header();
        f.debug_struct("Store")
            .field("sorted_path", &self.sorted_path)
            .field("index_path", &self.index_path)
            .field("build_id", &h.build_id)
            .field("keys", &self.index.len())
            .field("records", &h.records)
            .field("data_start", &h.data_start)
            .field("data_end", &h.data_end)
            .finish()
    }
}

impl Store {
    /// Loads the index and checks it against the sorted file's header.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Io`] if either file cannot be opened.
    /// - [`StoreError::Index`] if the index file is malformed.
    /// - [`StoreError::Header`] if the sorted file has no valid header.
    /// - [`StoreError::Mismatch`] if the two files do not belong together.
    pub fn open<P1: AsRef<Path>, P2: AsRef<Path>>(
        sorted_path: P1,
        index_path: P2,
    ) -> Result<Self, StoreError> {
        let sorted_path = sorted_path.as_ref().to_path_buf();
        let index_path = index_path.as_ref().to_path_buf();

        let index = index::load_index(&index_path)?;
        let file = File::open(&sorted_path)?;
        let file_len = file.metadata()?.len();
        let data_header = extsort::read_data_header(&mut BufReader::new(file))?;

        let h = index.header();
        if data_header.build_id != h.build_id {
            return Err(StoreError::Mismatch(format!(
                "index build {} but sorted file build {}",
                h.build_id, data_header.build_id
            )));
        }
        if data_header.len != h.data_start {
            return Err(StoreError::Mismatch(format!(
                "index data_start {} but sorted file header ends at {}",
                h.data_start, data_header.len
            )));
        }
        if file_len != h.data_end {
            return Err(StoreError::Mismatch(format!(
                "index data_end {} but sorted file is {} bytes",
                h.data_end, file_len
            )));
        }

        log::info!(
            "opened store {} (build {}, {} keys, {} records)",
            sorted_path.display(),
            h.build_id,
            index.len(),
            h.records
        );

        Ok(Self {
            sorted_path,
            index_path,
            index,
        })
    }

    /// The build id shared by the sorted file and the index.
    #[must_use]
    pub fn build_id(&self) -> &str {
        &self.index.header().build_id
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Total number of records in the sorted file.
    #[must_use]
    pub fn records(&self) -> u64 {
        self.index.header().records
    }

    /// Keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.index.keys()
    }

    /// Keys starting with `prefix`, in ascending order.
    pub fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.index.keys_with_prefix(prefix)
    }

    #[must_use]
    pub fn sorted_path(&self) -> &Path {
        &self.sorted_path
    }

    #[must_use]
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }
}

#[cfg(test)]
mod tests;
