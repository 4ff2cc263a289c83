//! Partitioner: splits an unsorted input into sorted run files.
//!
//! At most `max_records` records are held in memory at any time. Each chunk
//! is sorted by key with a stable sort, so records sharing a key keep their
//! input order, and written as its own run. Runs are returned in input order,
//! which the merger relies on for its tie-break.

use anyhow::{bail, Context, Result};
use record::{Record, RecordReader};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::run::{remove_runs, run_path, write_run};

/// Upper bound on the chunk buffer we pre-allocate up front.
const MAX_PREALLOC_RECORDS: usize = 1 << 16;

/// Splits the file at `input` into sorted runs inside `work_dir`.
///
/// Empty input yields no runs. On any error (unreadable input, malformed
/// line, failed write) the runs written so far are deleted before the error
/// is returned.
///
/// # Errors
///
/// Fails if `max_records` is zero, if the input cannot be opened or read, if
/// any line is not a valid record, or if a run cannot be written.
pub fn partition(input: &Path, work_dir: &Path, max_records: usize) -> Result<Vec<PathBuf>> {
    if max_records == 0 {
        bail!("max records per chunk must be at least 1");
    }
    let file = File::open(input)
        .with_context(|| format!("failed to open input {}", input.display()))?;
    let reader = RecordReader::new(BufReader::new(file));

    let started = Instant::now();
    let mut runs = Vec::new();
    match partition_into(reader, work_dir, max_records, &mut runs) {
        Ok(total) => {
            log::info!(
                "partitioned {} records from {} into {} runs in {:?}",
                total,
                input.display(),
                runs.len(),
                started.elapsed()
            );
            Ok(runs)
        }
        Err(e) => {
            remove_runs(&runs);
            Err(e.context(format!("failed to partition {}", input.display())))
        }
    }
}

fn partition_into<R: BufRead>(
    mut reader: RecordReader<R>,
    work_dir: &Path,
    max_records: usize,
    runs: &mut Vec<PathBuf>,
) -> Result<u64> {
    let mut chunk: Vec<Record> = Vec::with_capacity(max_records.min(MAX_PREALLOC_RECORDS));
    let mut total = 0u64;

    loop {
        chunk.clear();
        while chunk.len() < max_records {
            match reader.next_record()? {
                Some(rec) => chunk.push(rec),
                None => break,
            }
        }
        if chunk.is_empty() {
            break;
        }

        // `sort_by` is stable: equal keys keep their input order.
        chunk.sort_by(Record::cmp_key);

        // Track the run before writing so a failed write is cleaned up too.
        let path = run_path(work_dir, 0, runs.len());
        runs.push(path.clone());
        write_run(&path, &chunk)?;
        log::debug!("wrote run {} ({} records)", path.display(), chunk.len());
        total += chunk.len() as u64;

        if chunk.len() < max_records {
            break;
        }
    }

    Ok(total)
}
