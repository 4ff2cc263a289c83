//! Sorted-file header and shared file helpers.
//!
//! ## Header (first line of every sorted file)
//!
//! ```text
//! #recostore-data v1 build=<build_id>\n
//! ```
//!
//! The record region starts right after the header, so `data_start` is the
//! header's length in bytes. The build id is repeated in the index header and
//! lets a reader refuse an index built from a different sorted file.

use std::ffi::OsString;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

/// Magic tag opening the sorted-file header line.
pub const DATA_MAGIC: &str = "#recostore-data";

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

/// Longest header line we are willing to read (guards against binary garbage).
const MAX_HEADER_BYTES: usize = 256;

/// Errors raised while reading a sorted-file header.
#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed header: {0}")]
    Malformed(String),

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),
}

/// Parsed sorted-file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataHeader {
    pub build_id: String,
    /// Header length in bytes, i.e. the offset where records begin.
    pub len: u64,
}

/// Generates a fresh build identifier (16 hex digits).
pub fn new_build_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    format!("{:016x}", nanos ^ (u64::from(std::process::id()) << 48))
}

/// Checks that a build id can be embedded in a header line.
pub fn validate_build_id(build_id: &str) -> Result<(), HeaderError> {
    if build_id.is_empty() || !build_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(HeaderError::Malformed(format!(
            "invalid build id {:?}",
            build_id
        )));
    }
    Ok(())
}

/// Writes the sorted-file header and returns its length in bytes.
pub fn write_data_header<W: Write>(w: &mut W, build_id: &str) -> Result<u64, HeaderError> {
    validate_build_id(build_id)?;
    let line = format!("{} v{} build={}\n", DATA_MAGIC, FORMAT_VERSION, build_id);
    w.write_all(line.as_bytes())?;
    Ok(line.len() as u64)
}

/// Reads and validates the sorted-file header from the start of `r`.
pub fn read_data_header<R: BufRead>(r: &mut R) -> Result<DataHeader, HeaderError> {
    let mut line = String::new();
    let n = r
        .by_ref()
        .take(MAX_HEADER_BYTES as u64)
        .read_line(&mut line)?;
    if n == 0 {
        return Err(HeaderError::Malformed("file is empty".to_string()));
    }
    let body = line
        .strip_suffix('\n')
        .ok_or_else(|| HeaderError::Malformed("header line is not terminated".to_string()))?;

    let mut parts = body.split(' ');
    if parts.next() != Some(DATA_MAGIC) {
        return Err(HeaderError::Malformed(format!(
            "expected {:?} magic",
            DATA_MAGIC
        )));
    }
    let version = parts
        .next()
        .and_then(|v| v.strip_prefix('v'))
        .and_then(|v| v.parse::<u32>().ok())
        .ok_or_else(|| HeaderError::Malformed("missing version".to_string()))?;
    if version != FORMAT_VERSION {
        return Err(HeaderError::UnsupportedVersion(version));
    }
    let build_id = parts
        .next()
        .and_then(|b| b.strip_prefix("build="))
        .ok_or_else(|| HeaderError::Malformed("missing build id".to_string()))?;
    validate_build_id(build_id)?;
    if parts.next().is_some() {
        return Err(HeaderError::Malformed("trailing fields".to_string()));
    }

    Ok(DataHeader {
        build_id: build_id.to_string(),
        len: n as u64,
    })
}

/// Returns `<path>.tmp`, the staging name used for atomic writes.
pub fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Fsyncs the parent directory so a preceding rename is durable.
///
/// Best-effort: on platforms where directories cannot be opened this is a no-op.
pub fn sync_parent_dir(path: &Path) {
    if let Some(parent) = path.parent() {
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        if let Ok(dir) = std::fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}
