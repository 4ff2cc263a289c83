use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{build_store, BuildOptions, BuildReport, Store};

pub const SAMPLE: &str = "A,T1,0.5\nB,T2,0.9\nA,T3,0.8\n";

pub fn options(dir: &Path, chunk_records: usize, fan_in: usize) -> BuildOptions {
    BuildOptions {
        input: dir.join("input.csv"),
        sorted: dir.join("result.csv"),
        index: dir.join("index.csv"),
        chunk_records,
        fan_in,
    }
}

/// Writes `input` and builds a store from it.
pub fn build_with(
    dir: &Path,
    input: &str,
    chunk_records: usize,
    fan_in: usize,
) -> Result<(BuildOptions, BuildReport)> {
    let opts = options(dir, chunk_records, fan_in);
    fs::write(&opts.input, input)?;
    let report = build_store(&opts)?;
    Ok((opts, report))
}

/// Builds from `input` with default tuning and opens the result.
pub fn open_built(dir: &Path, input: &str) -> Result<Store> {
    let (opts, _) = build_with(dir, input, 1000, 16)?;
    Ok(Store::open(&opts.sorted, &opts.index)?)
}

/// The record region of a sorted file (everything after the header line).
pub fn record_region(path: &Path) -> Result<String> {
    let text = fs::read_to_string(path)?;
    Ok(text.split_once('\n').map(|(_, rest)| rest.to_string()).unwrap_or_default())
}

pub fn pairs(matches: &[crate::Match]) -> Vec<(&str, f64)> {
    matches.iter().map(|m| (m.target.as_str(), m.score)).collect()
}

/// Deterministic pseudo-random input: `n` records over `keys` keys.
pub fn generated_input(n: usize, keys: usize) -> String {
    let mut state = 0x2545_f491_4f6c_dd1du64;
    let mut out = String::new();
    for i in 0..n {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let key = format!("sku{:05}", state % keys as u64);
        let score = (state >> 11) as f64 / (1u64 << 53) as f64;
        out.push_str(&format!("{},target{},{}\n", key, i, score));
    }
    out
}

pub fn entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut names: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    names.sort();
    Ok(names)
}
