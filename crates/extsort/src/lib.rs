//! # Extsort - external sort-merge for RecoStore
//!
//! Turns an unsorted record file of any size into the single key-sorted file
//! the store serves from, while holding at most one chunk of records in
//! memory.
//!
//! ## Pipeline
//!
//! ```text
//!  input (unsorted)
//!        |
//!        v
//!  partition()  -- read <= N records, stable sort by key, write run --+
//!        |                                                            |
//!        v                                                            |
//!  run-000-000000.run  run-000-000001.run  ...  (sorted, no header) <-+
//!        |
//!        v
//!  merge()      -- min-heap over run heads, optional extra passes
//!        |
//!        v
//!  sorted file  -- header line + record region, atomically renamed
//! ```
//!
//! ## Sorted file layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┐  offset 0
//! │ #recostore-data v1 build=<id>\n              │
//! ├──────────────────────────────────────────────┤  data_start
//! │ key,target,score\n                           │
//! │ ... records, non-decreasing by key ...       │
//! └──────────────────────────────────────────────┘  data_end = file length
//! ```
//!
//! Records are variable length; nothing downstream assumes a fixed line
//! width. Byte offsets are captured by the indexer instead.

mod format;
mod merge;
mod partition;
mod run;
mod writer;

pub use format::{
    new_build_id, read_data_header, sync_parent_dir, tmp_path_for, validate_build_id,
    write_data_header, DataHeader, HeaderError, DATA_MAGIC, FORMAT_VERSION,
};
pub use merge::{merge, MergeIterator, DEFAULT_FAN_IN};
pub use partition::partition;
pub use run::{remove_runs, run_path, write_run, RunCursor, RunWriter, RUN_EXTENSION};
pub use writer::{MergeSummary, SortedFileWriter};

#[cfg(test)]
mod tests;
