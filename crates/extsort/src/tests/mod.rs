mod merge_tests;

use anyhow::Result;
use record::{Record, RecordReader};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Reads every record of a header-less run file.
pub(crate) fn read_run(path: &Path) -> Result<Vec<Record>> {
    let rdr = RecordReader::new(BufReader::new(File::open(path)?));
    Ok(rdr.collect::<Result<Vec<_>, _>>()?)
}

/// Reads the records of a sorted file, skipping its header.
pub(crate) fn read_sorted(path: &Path) -> Result<Vec<Record>> {
    let mut buf = BufReader::new(File::open(path)?);
    let header = crate::read_data_header(&mut buf)?;
    let rdr = RecordReader::with_position(buf, header.len, 1);
    Ok(rdr.collect::<Result<Vec<_>, _>>()?)
}

pub(crate) fn rec(key: &str, target: &str, score: f64) -> Record {
    Record::new(key, target, score).unwrap()
}
