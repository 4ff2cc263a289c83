//! Full consistency check of an opened store.

use crate::{Store, StoreError};

/// Outcome of [`Store::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub keys: usize,
    pub records: u64,
    pub crc32: u32,
    /// Human-readable description of every disagreement found.
    pub problems: Vec<String>,
}

impl VerifyReport {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }
}

impl Store {
    /// Rescans the whole sorted file and compares it with the loaded index:
    /// record count, checksum and every key range.
    ///
    /// # Errors
    ///
    /// Only fails when the file cannot be scanned at all (I/O error, bad
    /// header, unparsable or unsorted records). Content that scans cleanly
    /// but disagrees with the index is reported in
    /// [`VerifyReport::problems`].
    pub fn verify(&self) -> Result<VerifyReport, StoreError> {
        let scanned = index::build_index(&self.sorted_path)?;
        let expected = self.index.header();
        let actual = &scanned.header;
        let mut problems = Vec::new();

        if actual.build_id != expected.build_id {
            problems.push(format!(
                "build id {} != indexed {}",
                actual.build_id, expected.build_id
            ));
        }
        if actual.records != expected.records {
            problems.push(format!(
                "{} records != indexed {}",
                actual.records, expected.records
            ));
        }
        if actual.crc32 != expected.crc32 {
            problems.push(format!(
                "crc32 {:08x} != indexed {:08x}",
                actual.crc32, expected.crc32
            ));
        }
        if scanned.entries.len() != self.index.len() {
            problems.push(format!(
                "{} keys != indexed {}",
                scanned.entries.len(),
                self.index.len()
            ));
        }
        for (key, range) in &scanned.entries {
            match self.index.get(key) {
                Some(r) if r == *range => {}
                Some(r) => problems.push(format!(
                    "key {:?}: range {}..{} != indexed {}..{}",
                    key, range.start, range.end, r.start, r.end
                )),
                None => problems.push(format!("key {:?} missing from index", key)),
            }
        }

        if problems.is_empty() {
            log::info!("verified {} ({} records)", self.sorted_path.display(), actual.records);
        } else {
            log::warn!(
                "verification of {} found {} problems",
                self.sorted_path.display(),
                problems.len()
            );
        }

        Ok(VerifyReport {
            keys: scanned.entries.len(),
            records: actual.records,
            crc32: actual.crc32,
            problems,
        })
    }
}
