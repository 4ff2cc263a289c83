//! K-way merge of sorted runs into the final sorted file.
//!
//! A min-heap holds the current head record of every run that still has
//! data. Each step pops the smallest key, emits it and refills the heap from
//! the same run; an exhausted run simply stops contributing. Selection costs
//! O(log N) per record for N open runs.
//!
//! Ties on key go to the run with the lower index. Runs are numbered in input
//! order and every chunk was stable-sorted, so records sharing a key come out
//! in their original input order: the merge is stable and its output is fully
//! determined by the input.
//!
//! When there are more runs than the fan-in allows (each open run costs a file
//! handle), consecutive groups are merged into intermediate runs first. Groups
//! keep their relative order, which preserves stability across passes.

use anyhow::{bail, Context, Result};
use record::Record;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::run::{remove_runs, run_path, RunCursor, RunWriter};
use crate::writer::{MergeSummary, SortedFileWriter};

/// Default maximum number of runs merged in a single pass.
pub const DEFAULT_FAN_IN: usize = 256;

/// The head record of one run, ordered for a min-heap.
struct HeapEntry {
    record: Record,
    /// Index into the `cursors` array.
    source: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.record.key == other.record.key && self.source == other.source
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse both comparisons so the smallest
        // key, and on ties the lowest source index, surfaces first.
        other
            .record
            .key
            .cmp(&self.record.key)
            .then_with(|| other.source.cmp(&self.source))
    }
}

/// Merges several sorted runs into one sorted stream of records.
pub struct MergeIterator {
    cursors: Vec<RunCursor>,
    heap: BinaryHeap<HeapEntry>,
}

impl MergeIterator {
    /// Opens every run and primes the heap with each run's first record.
    pub fn open(paths: &[PathBuf]) -> Result<Self> {
        let mut cursors = Vec::with_capacity(paths.len());
        let mut heap = BinaryHeap::with_capacity(paths.len());

        for (i, path) in paths.iter().enumerate() {
            let mut cursor = RunCursor::open(path)?;
            if let Some(record) = cursor.next_record()? {
                heap.push(HeapEntry { record, source: i });
            }
            cursors.push(cursor);
        }

        Ok(Self { cursors, heap })
    }

    /// Returns the next record in key order, or `None` when every run is
    /// exhausted.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        let top = match self.heap.pop() {
            Some(e) => e,
            None => return Ok(None),
        };

        if let Some(record) = self.cursors[top.source].next_record()? {
            if record.key < top.record.key {
                bail!(
                    "run {} is not sorted: {:?} follows {:?}",
                    self.cursors[top.source].path().display(),
                    record.key,
                    top.record.key
                );
            }
            self.heap.push(HeapEntry {
                record,
                source: top.source,
            });
        }

        Ok(Some(top.record))
    }

    /// Number of runs that still have records.
    #[must_use]
    pub fn open_runs(&self) -> usize {
        self.heap.len()
    }

    /// Collects all remaining records into a `Vec`.
    ///
    /// Useful for testing; the build path streams instead.
    pub fn collect_all(&mut self) -> Result<Vec<Record>> {
        let mut out = Vec::new();
        while let Some(rec) = self.next_record()? {
            out.push(rec);
        }
        Ok(out)
    }
}

/// Merges `runs` into the sorted file at `output`, tagged with `build_id`.
///
/// Runs are deleted once the sorted file has been published. On failure the
/// partially written output is discarded and nothing appears at `output`;
/// the caller owns cleanup of whatever runs remain.
///
/// An empty `runs` slice produces a sorted file with a header and no records.
///
/// # Errors
///
/// Fails if `fan_in < 2`, if any run cannot be opened, read or parsed, or on
/// any I/O error writing the output.
pub fn merge(runs: &[PathBuf], output: &Path, build_id: &str, fan_in: usize) -> Result<MergeSummary> {
    if fan_in < 2 {
        bail!("merge fan-in must be at least 2, got {}", fan_in);
    }

    let started = Instant::now();
    let mut current: Vec<PathBuf> = runs.to_vec();
    let mut pass = 0;
    while current.len() > fan_in {
        pass += 1;
        current = merge_pass(&current, pass, fan_in)?;
    }

    let mut writer = SortedFileWriter::create(output, build_id)?;
    let mut iter = MergeIterator::open(&current)?;
    while let Some(rec) = iter.next_record()? {
        writer.append(&rec)?;
    }
    drop(iter);

    let summary = writer
        .finish()
        .with_context(|| format!("failed to publish {}", output.display()))?;
    remove_runs(&current);

    log::info!(
        "merged {} runs ({} extra passes) into {}: {} records in {:?}",
        runs.len(),
        pass,
        output.display(),
        summary.records,
        started.elapsed()
    );
    Ok(summary)
}

/// Merges consecutive groups of `fan_in` runs into intermediate runs.
///
/// Inputs of each group are deleted as soon as the group's output is complete.
fn merge_pass(runs: &[PathBuf], pass: usize, fan_in: usize) -> Result<Vec<PathBuf>> {
    let work_dir = runs
        .first()
        .and_then(|p| p.parent())
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let mut next = Vec::with_capacity(runs.len().div_ceil(fan_in));
    for (i, group) in runs.chunks(fan_in).enumerate() {
        if group.len() == 1 {
            next.push(group[0].clone());
            continue;
        }

        let out = run_path(&work_dir, pass, i);
        let mut writer = RunWriter::create(&out)?;
        let mut iter = MergeIterator::open(group)?;
        while let Some(rec) = iter.next_record()? {
            writer.append(&rec)?;
        }
        drop(iter);
        let records = writer.finish()?;

        log::debug!(
            "pass {}: merged {} runs into {} ({} records)",
            pass,
            group.len(),
            out.display(),
            records
        );
        remove_runs(group);
        next.push(out);
    }

    Ok(next)
}
