//! Index file persistence: atomic writer and validating loader.

use std::collections::BTreeMap;
use std::fs::{rename, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use extsort::{sync_parent_dir, tmp_path_for, validate_build_id};

use crate::{IndexEntries, IndexError, IndexHeader, KeyIndex, KeyRange};

/// Magic tag opening the index header line.
pub const INDEX_MAGIC: &str = "#recostore-index";

/// Index format version written by this crate.
const INDEX_VERSION: u32 = 1;

fn format_err(line: u64, reason: impl Into<String>) -> IndexError {
    IndexError::Format {
        line,
        reason: reason.into(),
    }
}

fn header_line(h: &IndexHeader) -> String {
    format!(
        "{} v{} build={} data_start={} data_end={} records={} crc32={:08x}\n",
        INDEX_MAGIC, INDEX_VERSION, h.build_id, h.data_start, h.data_end, h.records, h.crc32
    )
}

fn parse_header(line: &str) -> Result<IndexHeader, IndexError> {
    let mut parts = line.split(' ');
    if parts.next() != Some(INDEX_MAGIC) {
        return Err(format_err(1, format!("missing {:?} header", INDEX_MAGIC)));
    }
    match parts.next() {
        Some(v) if v == format!("v{}", INDEX_VERSION) => {}
        other => return Err(format_err(1, format!("unsupported version {:?}", other))),
    }

    let mut build_id = None;
    let mut data_start = None;
    let mut data_end = None;
    let mut records = None;
    let mut crc32 = None;

    for part in parts {
        let (name, value) = part
            .split_once('=')
            .ok_or_else(|| format_err(1, format!("expected name=value, got {:?}", part)))?;
        let bad = || format_err(1, format!("invalid {} value {:?}", name, value));
        match name {
            "build" => build_id = Some(value.to_string()),
            "data_start" => data_start = Some(value.parse::<u64>().map_err(|_| bad())?),
            "data_end" => data_end = Some(value.parse::<u64>().map_err(|_| bad())?),
            "records" => records = Some(value.parse::<u64>().map_err(|_| bad())?),
            "crc32" => crc32 = Some(u32::from_str_radix(value, 16).map_err(|_| bad())?),
            other => return Err(format_err(1, format!("unknown header field {:?}", other))),
        }
    }

    let missing = |field: &str| format_err(1, format!("header is missing {}", field));
    let header = IndexHeader {
        build_id: build_id.ok_or_else(|| missing("build"))?,
        data_start: data_start.ok_or_else(|| missing("data_start"))?,
        data_end: data_end.ok_or_else(|| missing("data_end"))?,
        records: records.ok_or_else(|| missing("records"))?,
        crc32: crc32.ok_or_else(|| missing("crc32"))?,
    };
    validate_build_id(&header.build_id).map_err(|e| format_err(1, e.to_string()))?;
    if header.data_start > header.data_end {
        return Err(format_err(1, "data_start is past data_end"));
    }
    Ok(header)
}

/// Writes `index` to `path` atomically (temp file, fsync, rename).
pub fn write_index(path: &Path, index: &IndexEntries) -> Result<(), IndexError> {
    let tmp_path = tmp_path_for(path);
    let result = write_index_tmp(&tmp_path, index).and_then(|()| {
        rename(&tmp_path, path)?;
        Ok(())
    });
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
        return result;
    }
    sync_parent_dir(path);

    log::info!(
        "wrote index {} ({} keys, build {})",
        path.display(),
        index.entries.len(),
        index.header.build_id
    );
    Ok(())
}

fn write_index_tmp(tmp_path: &Path, index: &IndexEntries) -> Result<(), IndexError> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(tmp_path)?;
    let mut w = BufWriter::new(file);

    w.write_all(header_line(&index.header).as_bytes())?;
    for (key, range) in &index.entries {
        writeln!(w, "{},{},{}", key, range.start, range.end)?;
    }

    let file = w.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

/// Loads the index file at `path` into a [`KeyIndex`].
///
/// Beyond parsing, the loader checks the structural invariants the query
/// engine depends on: keys strictly ascending and unique, every range
/// non-empty, and ranges contiguous from `data_start` to `data_end`.
///
/// # Errors
///
/// Returns [`IndexError::Format`] (with the 1-based line number) for any
/// malformed or inconsistent entry, or [`IndexError::Io`] on read failure.
pub fn load_index(path: &Path) -> Result<KeyIndex, IndexError> {
    let mut rdr = BufReader::new(File::open(path)?);
    let mut line = String::new();

    if rdr.read_line(&mut line)? == 0 {
        return Err(format_err(1, "index file is empty"));
    }
    let header = parse_header(line.strip_suffix('\n').unwrap_or(&line))?;

    let mut ranges: BTreeMap<String, KeyRange> = BTreeMap::new();
    let mut previous: Option<String> = None;
    let mut expected_start = header.data_start;
    let mut line_no = 1u64;

    loop {
        line.clear();
        if rdr.read_line(&mut line)? == 0 {
            break;
        }
        line_no += 1;
        let text = line
            .strip_suffix('\n')
            .ok_or_else(|| format_err(line_no, "truncated entry"))?;

        let mut fields = text.split(',');
        let (key, start, end) = match (fields.next(), fields.next(), fields.next(), fields.next())
        {
            (Some(k), Some(s), Some(e), None) if !k.is_empty() => (k, s, e),
            _ => return Err(format_err(line_no, format!("expected key,start,end: {:?}", text))),
        };
        let start: u64 = start
            .parse()
            .map_err(|_| format_err(line_no, format!("invalid start offset {:?}", start)))?;
        let end: u64 = end
            .parse()
            .map_err(|_| format_err(line_no, format!("invalid end offset {:?}", end)))?;

        if start >= end {
            return Err(format_err(line_no, format!("empty or inverted range {}..{}", start, end)));
        }
        if start != expected_start {
            return Err(format_err(
                line_no,
                format!("range starts at {} but previous ended at {}", start, expected_start),
            ));
        }
        if let Some(prev) = &previous {
            if key <= prev.as_str() {
                return Err(format_err(
                    line_no,
                    format!("key {:?} is not after {:?}", key, prev),
                ));
            }
        }

        expected_start = end;
        ranges.insert(key.to_string(), KeyRange { start, end });
        previous = Some(key.to_string());
    }

    if expected_start != header.data_end {
        return Err(format_err(
            line_no,
            format!(
                "ranges end at {} but the record region ends at {}",
                expected_start, header.data_end
            ),
        ));
    }

    log::debug!("loaded {} index entries from {}", ranges.len(), path.display());
    Ok(KeyIndex { header, ranges })
}
