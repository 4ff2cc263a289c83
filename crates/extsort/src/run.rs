//! Run files: the sorted, header-less chunks exchanged between the
//! partitioner and the merger.
//!
//! Runs are ephemeral. They are written once, read once by the merger and
//! then deleted, so they skip the fsync + rename dance the final sorted file
//! goes through.

use anyhow::{Context, Result};
use record::{Record, RecordReader};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Extension used for run files.
pub const RUN_EXTENSION: &str = "run";

/// Path of run `seq` produced by merge pass `pass` (pass 0 is the partitioner).
pub fn run_path(work_dir: &Path, pass: usize, seq: usize) -> PathBuf {
    work_dir.join(format!("run-{:03}-{:06}.{}", pass, seq, RUN_EXTENSION))
}

/// Streaming writer for a single run file.
pub struct RunWriter {
    path: PathBuf,
    file: BufWriter<File>,
    records: u64,
}

impl RunWriter {
    /// Creates (or truncates) the run file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("failed to create run file {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            file: BufWriter::new(file),
            records: 0,
        })
    }

    pub fn append(&mut self, rec: &Record) -> Result<()> {
        rec.write_to(&mut self.file)
            .with_context(|| format!("failed to write run file {}", self.path.display()))?;
        self.records += 1;
        Ok(())
    }

    /// Flushes the run and returns the number of records written.
    pub fn finish(mut self) -> Result<u64> {
        self.file
            .flush()
            .with_context(|| format!("failed to flush run file {}", self.path.display()))?;
        Ok(self.records)
    }
}

/// Writes an already sorted slice of records as one run file.
pub fn write_run(path: &Path, records: &[Record]) -> Result<u64> {
    let mut w = RunWriter::create(path)?;
    for rec in records {
        w.append(rec)?;
    }
    w.finish()
}

/// Read cursor over one run file.
pub struct RunCursor {
    path: PathBuf,
    reader: RecordReader<BufReader<File>>,
}

impl RunCursor {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open run file {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            reader: RecordReader::new(BufReader::new(file)),
        })
    }

    /// Returns the next record of the run, or `None` once it is exhausted.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        self.reader
            .next_record()
            .with_context(|| format!("failed to read run file {}", self.path.display()))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Deletes run files, ignoring errors (used for cleanup).
pub fn remove_runs(paths: &[PathBuf]) {
    for p in paths {
        if let Err(e) = std::fs::remove_file(p) {
            log::debug!("could not remove run {}: {}", p.display(), e);
        }
    }
}
