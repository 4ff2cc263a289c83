/// Build pipeline: input file -> sorted file -> index file.
///
/// The three phases run in a fixed order with explicit inputs and outputs:
///
/// 1. [`extsort::partition`] splits the input into sorted runs under a
///    private work directory.
/// 2. [`extsort::merge`] publishes the sorted file atomically.
/// 3. [`index::build_index`] scans the published file; the result is checked
///    against the merge totals and written atomically with
///    [`index::write_index`].
///
/// The work directory is removed on success and on failure. Rebuilding from
/// the same input produces a byte-identical record region.
use anyhow::{bail, Context, Result};
use config::Config;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::recovery::cleanup_interrupted_build;

/// Inputs of one build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub input: PathBuf,
    pub sorted: PathBuf,
    pub index: PathBuf,
    pub chunk_records: usize,
    pub fan_in: usize,
}

impl From<&Config> for BuildOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            input: cfg.input_path.clone(),
            sorted: cfg.sorted_path.clone(),
            index: cfg.index_path.clone(),
            chunk_records: cfg.chunk_records,
            fan_in: cfg.merge_fan_in,
        }
    }
}

/// What a finished build produced.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub build_id: String,
    /// Runs written by the partition phase.
    pub runs: usize,
    pub records: u64,
    /// Distinct keys in the index.
    pub keys: usize,
    /// Size of the record region in bytes.
    pub data_bytes: u64,
    pub elapsed: Duration,
}

/// Directory holding the temporary runs of a build writing `sorted`.
pub fn work_dir_for(sorted: &Path) -> PathBuf {
    let mut name = OsString::from(sorted.as_os_str());
    name.push(".runs");
    PathBuf::from(name)
}

/// Runs the whole pipeline described by `opts`.
///
/// # Errors
///
/// Fails on invalid options, on any malformed input line, or on I/O failure
/// in any phase. When the sorted file was already published but indexing
/// fails, the old index (if any) is left untouched; its build id no longer
/// matches, so [`Store::open`](crate::Store::open) refuses the pair until a
/// rebuild succeeds.
pub fn build_store(opts: &BuildOptions) -> Result<BuildReport> {
    if opts.chunk_records == 0 {
        bail!("chunk size must be at least 1 record");
    }
    if opts.fan_in < 2 {
        bail!("merge fan-in must be at least 2, got {}", opts.fan_in);
    }
    if opts.sorted == opts.index {
        bail!("sorted file and index file must differ");
    }

    let started = Instant::now();
    cleanup_interrupted_build(&opts.sorted, &opts.index);

    let work_dir = work_dir_for(&opts.sorted);
    fs::create_dir_all(&work_dir)
        .with_context(|| format!("failed to create work dir {}", work_dir.display()))?;

    let result = run_phases(opts, &work_dir);
    if let Err(e) = fs::remove_dir_all(&work_dir) {
        log::warn!("could not remove work dir {}: {}", work_dir.display(), e);
    }

    let mut report = result?;
    report.elapsed = started.elapsed();
    log::info!(
        "build {} complete: {} records, {} keys, {} runs in {:?}",
        report.build_id,
        report.records,
        report.keys,
        report.runs,
        report.elapsed
    );
    Ok(report)
}

fn run_phases(opts: &BuildOptions, work_dir: &Path) -> Result<BuildReport> {
    let build_id = extsort::new_build_id();
    log::info!(
        "starting build {}: {} -> {} + {}",
        build_id,
        opts.input.display(),
        opts.sorted.display(),
        opts.index.display()
    );

    let runs = extsort::partition(&opts.input, work_dir, opts.chunk_records)?;
    let run_count = runs.len();

    let summary = match extsort::merge(&runs, &opts.sorted, &build_id, opts.fan_in) {
        Ok(s) => s,
        Err(e) => {
            extsort::remove_runs(&runs);
            return Err(e);
        }
    };

    let entries = index::build_index(&opts.sorted)
        .with_context(|| format!("failed to index {}", opts.sorted.display()))?;
    let h = &entries.header;
    if h.build_id != build_id
        || h.records != summary.records
        || h.data_start != summary.data_start
        || h.data_end != summary.data_end
        || h.crc32 != summary.crc32
    {
        bail!(
            "index scan disagrees with merge output (records {} vs {}, crc {:08x} vs {:08x})",
            h.records,
            summary.records,
            h.crc32,
            summary.crc32
        );
    }

    index::write_index(&opts.index, &entries)
        .with_context(|| format!("failed to write index {}", opts.index.display()))?;

    Ok(BuildReport {
        build_id,
        runs: run_count,
        records: summary.records,
        keys: entries.entries.len(),
        data_bytes: summary.data_end - summary.data_start,
        elapsed: Duration::ZERO,
    })
}
