use super::{read_run, read_sorted, rec};
use crate::*;
use anyhow::Result;
use record::Record;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// Helper: writes each slice as a run file and returns the paths.
fn make_runs(dir: &Path, runs: &[&[Record]]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for (i, records) in runs.iter().enumerate() {
        let path = run_path(dir, 0, i);
        write_run(&path, records)?;
        paths.push(path);
    }
    Ok(paths)
}

fn keys(records: &[Record]) -> Vec<&str> {
    records.iter().map(|r| r.key.as_str()).collect()
}

// -------------------- MergeIterator --------------------

#[test]
fn merge_iterator_single_run() -> Result<()> {
    let dir = tempdir()?;
    let runs = make_runs(
        dir.path(),
        &[&[rec("a", "1", 1.0), rec("b", "2", 2.0), rec("c", "3", 3.0)]],
    )?;

    let mut iter = MergeIterator::open(&runs)?;
    let out = iter.collect_all()?;
    assert_eq!(keys(&out), vec!["a", "b", "c"]);
    Ok(())
}

#[test]
fn merge_iterator_interleaves_runs() -> Result<()> {
    let dir = tempdir()?;
    let runs = make_runs(
        dir.path(),
        &[
            &[rec("a", "x", 1.0), rec("d", "x", 1.0)],
            &[rec("b", "x", 1.0), rec("e", "x", 1.0)],
            &[rec("c", "x", 1.0)],
        ],
    )?;

    let mut iter = MergeIterator::open(&runs)?;
    assert_eq!(iter.open_runs(), 3);
    let out = iter.collect_all()?;
    assert_eq!(keys(&out), vec!["a", "b", "c", "d", "e"]);
    assert_eq!(iter.open_runs(), 0);
    Ok(())
}

#[test]
fn merge_iterator_keeps_all_duplicates_in_run_order() -> Result<()> {
    let dir = tempdir()?;
    let runs = make_runs(
        dir.path(),
        &[
            &[rec("k", "from-run-0", 0.1)],
            &[rec("k", "from-run-1", 0.2), rec("k", "from-run-1b", 0.3)],
            &[rec("k", "from-run-2", 0.4)],
        ],
    )?;

    let mut iter = MergeIterator::open(&runs)?;
    let targets: Vec<String> = iter.collect_all()?.into_iter().map(|r| r.target).collect();
    assert_eq!(
        targets,
        vec!["from-run-0", "from-run-1", "from-run-1b", "from-run-2"]
    );
    Ok(())
}

#[test]
fn merge_iterator_no_runs() -> Result<()> {
    let mut iter = MergeIterator::open(&[])?;
    assert!(iter.collect_all()?.is_empty());
    Ok(())
}

#[test]
fn merge_iterator_skips_empty_run() -> Result<()> {
    let dir = tempdir()?;
    let runs = make_runs(dir.path(), &[&[], &[rec("a", "x", 1.0)]])?;
    let mut iter = MergeIterator::open(&runs)?;
    assert_eq!(iter.open_runs(), 1);
    assert_eq!(iter.collect_all()?.len(), 1);
    Ok(())
}

#[test]
fn merge_iterator_rejects_unsorted_run() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("bad.run");
    fs::write(&path, "b,x,1\na,x,1\n")?;

    let mut iter = MergeIterator::open(&[path])?;
    assert!(iter.collect_all().is_err());
    Ok(())
}

// -------------------- merge() --------------------

#[test]
fn merge_writes_sorted_file_and_deletes_runs() -> Result<()> {
    let dir = tempdir()?;
    let runs = make_runs(
        dir.path(),
        &[
            &[rec("A", "T1", 0.5), rec("B", "T2", 0.9)],
            &[rec("A", "T3", 0.8)],
        ],
    )?;
    let out = dir.path().join("sorted.csv");

    let summary = merge(&runs, &out, "build1", DEFAULT_FAN_IN)?;
    assert_eq!(summary.records, 3);
    assert_eq!(summary.data_end, fs::metadata(&out)?.len());

    assert_eq!(
        read_sorted(&out)?,
        vec![rec("A", "T1", 0.5), rec("A", "T3", 0.8), rec("B", "T2", 0.9)]
    );
    for run in &runs {
        assert!(!run.exists(), "run {} should be deleted", run.display());
    }
    Ok(())
}

#[test]
fn merge_of_no_runs_writes_header_only() -> Result<()> {
    let dir = tempdir()?;
    let out = dir.path().join("sorted.csv");

    let summary = merge(&[], &out, "empty", DEFAULT_FAN_IN)?;
    assert_eq!(summary.records, 0);
    assert_eq!(summary.data_start, summary.data_end);
    assert!(read_sorted(&out)?.is_empty());
    Ok(())
}

#[test]
fn multi_pass_merge_is_complete_and_stable() -> Result<()> {
    let dir = tempdir()?;
    // 9 single-record runs, fan-in 2 -> several intermediate passes.
    let records: Vec<Record> = (0..9)
        .map(|i| rec(if i % 2 == 0 { "even" } else { "odd" }, &format!("t{}", i), i as f64))
        .collect();
    let slices: Vec<&[Record]> = records.iter().map(std::slice::from_ref).collect();
    let runs = make_runs(dir.path(), &slices)?;
    let out = dir.path().join("sorted.csv");

    let summary = merge(&runs, &out, "multi", 2)?;
    assert_eq!(summary.records, 9);

    let merged = read_sorted(&out)?;
    let targets: Vec<&str> = merged.iter().map(|r| r.target.as_str()).collect();
    assert_eq!(
        targets,
        vec!["t0", "t2", "t4", "t6", "t8", "t1", "t3", "t5", "t7"]
    );

    // Only the sorted file is left behind.
    let leftovers: Vec<_> = fs::read_dir(dir.path())?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|x| x == RUN_EXTENSION).unwrap_or(false))
        .collect();
    assert!(leftovers.is_empty(), "leftover runs: {:?}", leftovers);
    Ok(())
}

#[test]
fn fan_in_below_two_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let out = dir.path().join("sorted.csv");
    assert!(merge(&[], &out, "b", 1).is_err());
    Ok(())
}

#[test]
fn failed_merge_leaves_no_output() -> Result<()> {
    let dir = tempdir()?;
    let good = run_path(dir.path(), 0, 0);
    write_run(&good, &[rec("a", "x", 1.0)])?;
    let bad = run_path(dir.path(), 0, 1);
    fs::write(&bad, "b,x,1\nbroken line\n")?;
    let out = dir.path().join("sorted.csv");

    let result = merge(&[good.clone(), bad], &out, "b", DEFAULT_FAN_IN);
    assert!(result.is_err());
    assert!(!out.exists(), "no sorted file may be published");
    assert!(!tmp_path_for(&out).exists(), "temp file must be removed");
    // Inputs survive a failed merge.
    assert_eq!(read_run(&good)?.len(), 1);
    Ok(())
}

#[test]
fn missing_run_fails_merge() -> Result<()> {
    let dir = tempdir()?;
    let out = dir.path().join("sorted.csv");
    let result = merge(&[dir.path().join("gone.run")], &out, "b", DEFAULT_FAN_IN);
    assert!(result.is_err());
    assert!(!out.exists());
    Ok(())
}
