use anyhow::{bail, Context, Result};
use crc32fast::Hasher as Crc32;
use record::Record;
use std::fs::{rename, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::format::{sync_parent_dir, tmp_path_for, write_data_header};

/// Totals describing a finished sorted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    /// Number of records in the record region.
    pub records: u64,
    /// Offset of the first record (header length).
    pub data_start: u64,
    /// Offset one past the last record (file length).
    pub data_end: u64,
    /// CRC32 over the bytes of the record region.
    pub crc32: u32,
}

/// Writes the single authoritative sorted file.
///
/// The write is all-or-nothing: records go to `<path>.tmp`, which is fsynced
/// and atomically renamed over `path` by [`finish`](SortedFileWriter::finish).
/// Dropping an unfinished writer removes the temp file, so a failed merge
/// never leaves a partial sorted file visible.
///
/// Appends must arrive in non-decreasing key order; an out-of-order record is
/// rejected because the index and query engine depend on contiguous key runs.
pub struct SortedFileWriter {
    path: PathBuf,
    tmp_path: PathBuf,
    file: Option<BufWriter<File>>,
    data_start: u64,
    offset: u64,
    records: u64,
    crc: Crc32,
    last_key: Option<String>,
    published: bool,
}

impl SortedFileWriter {
    /// Creates the temp file and writes the header carrying `build_id`.
    pub fn create(path: &Path, build_id: &str) -> Result<Self> {
        let tmp_path = tmp_path_for(path);
        let raw = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)
            .with_context(|| format!("failed to create {}", tmp_path.display()))?;
        let mut file = BufWriter::new(raw);

        let data_start = match write_data_header(&mut file, build_id) {
            Ok(n) => n,
            Err(e) => {
                drop(file);
                let _ = std::fs::remove_file(&tmp_path);
                return Err(e.into());
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            tmp_path,
            file: Some(file),
            data_start,
            offset: data_start,
            records: 0,
            crc: Crc32::new(),
            last_key: None,
            published: false,
        })
    }

    /// Appends one record to the record region.
    pub fn append(&mut self, rec: &Record) -> Result<()> {
        match &mut self.last_key {
            Some(last) if rec.key < *last => {
                bail!(
                    "record key {:?} sorts before previous key {:?}",
                    rec.key,
                    last
                );
            }
            Some(last) if rec.key != *last => {
                last.clear();
                last.push_str(&rec.key);
            }
            Some(_) => {}
            None => self.last_key = Some(rec.key.clone()),
        }

        let file = match self.file.as_mut() {
            Some(f) => f,
            None => bail!("sorted file writer already finished"),
        };
        let line = rec.to_line();
        file.write_all(line.as_bytes())
            .with_context(|| format!("failed to write {}", self.tmp_path.display()))?;
        self.crc.update(line.as_bytes());
        self.offset += line.len() as u64;
        self.records += 1;
        Ok(())
    }

    /// Number of records appended so far.
    #[must_use]
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Flushes, fsyncs and atomically publishes the sorted file.
    pub fn finish(mut self) -> Result<MergeSummary> {
        let file = match self.file.take() {
            Some(f) => f,
            None => bail!("sorted file writer already finished"),
        };

        let raw = file
            .into_inner()
            .map_err(|e| e.into_error())
            .with_context(|| format!("failed to flush {}", self.tmp_path.display()))?;
        raw.sync_all()
            .with_context(|| format!("failed to sync {}", self.tmp_path.display()))?;
        drop(raw);

        rename(&self.tmp_path, &self.path).with_context(|| {
            format!(
                "failed to rename {} to {}",
                self.tmp_path.display(),
                self.path.display()
            )
        })?;
        self.published = true;
        sync_parent_dir(&self.path);

        Ok(MergeSummary {
            records: self.records,
            data_start: self.data_start,
            data_end: self.offset,
            crc32: self.crc.clone().finalize(),
        })
    }
}

impl Drop for SortedFileWriter {
    fn drop(&mut self) {
        if !self.published {
            drop(self.file.take());
            let _ = std::fs::remove_file(&self.tmp_path);
        }
    }
}
