//! Indexer: one forward scan over a finished sorted file.
//!
//! The scan remembers the byte offset at which each record starts. Whenever
//! the key changes, the previous key's range is closed at the new record's
//! offset and a new range opens there; the last range is closed at end of
//! file. The first range always opens at `data_start`, so the ranges tile the
//! record region exactly.

use crc32fast::Hasher as Crc32;
use record::RecordReader;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Instant;

use crate::{IndexEntries, IndexError, IndexHeader, KeyRange};

/// Pass-through reader that checksums every byte it hands out.
struct CrcReader<R> {
    inner: R,
    crc: Crc32,
}

impl<R: Read> Read for CrcReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.crc.update(&buf[..n]);
        Ok(n)
    }
}

/// Scans the sorted file at `path` and returns one entry per distinct key.
///
/// Entries come back in file order together with a header describing the
/// record region (bounds, record count, CRC32, build id).
///
/// # Errors
///
/// Fails on I/O errors, a missing or malformed header, an unparsable record,
/// or keys that decrease (the file is not sorted).
pub fn build_index(path: &Path) -> Result<IndexEntries, IndexError> {
    let started = Instant::now();
    let mut buf = BufReader::new(File::open(path)?);
    let data_header = extsort::read_data_header(&mut buf)?;
    let data_start = data_header.len;

    // Re-position the raw file at the record region so the checksum sees
    // exactly the bytes after the header.
    buf.seek(SeekFrom::Start(data_start))?;
    let raw = CrcReader {
        inner: buf.into_inner(),
        crc: Crc32::new(),
    };
    let mut reader = RecordReader::with_position(BufReader::new(raw), data_start, 1);

    let mut entries: Vec<(String, KeyRange)> = Vec::new();
    let mut current: Option<(String, u64)> = None;
    let mut records = 0u64;

    while let Some((offset, rec)) = reader.next_with_offset()? {
        records += 1;
        current = match current.take() {
            Some((key, start)) if key == rec.key => Some((key, start)),
            Some((key, start)) => {
                if rec.key < key {
                    return Err(IndexError::Unsorted {
                        offset,
                        key: rec.key,
                        previous: key,
                    });
                }
                entries.push((key, KeyRange { start, end: offset }));
                Some((rec.key, offset))
            }
            None => Some((rec.key, data_start)),
        };
    }

    let data_end = reader.offset();
    if let Some((key, start)) = current {
        entries.push((key, KeyRange { start, end: data_end }));
    }
    let crc32 = reader.into_inner().into_inner().crc.finalize();

    log::info!(
        "indexed {} keys over {} records of {} in {:?}",
        entries.len(),
        records,
        path.display(),
        started.elapsed()
    );

    Ok(IndexEntries {
        header: IndexHeader {
            build_id: data_header.build_id,
            data_start,
            data_end,
            records,
            crc32,
        },
        entries,
    })
}
