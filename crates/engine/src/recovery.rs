/// Cleanup of leftovers from an interrupted build.
///
/// A crash can leave `<sorted>.tmp`, `<index>.tmp` and the run work directory
/// behind. None of them is ever read, but they waste disk space and a stale
/// work directory could collide with new run names.
use std::fs;
use std::path::Path;

use crate::build::work_dir_for;

/// Removes temp files and the run work directory belonging to `sorted` and
/// `index`. Missing files are not an error.
pub fn cleanup_interrupted_build(sorted: &Path, index: &Path) {
    for tmp in [extsort::tmp_path_for(sorted), extsort::tmp_path_for(index)] {
        if fs::remove_file(&tmp).is_ok() {
            log::warn!("removed leftover temp file {}", tmp.display());
        }
    }

    let work_dir = work_dir_for(sorted);
    if work_dir.is_dir() {
        match fs::remove_dir_all(&work_dir) {
            Ok(()) => log::warn!("removed stale work dir {}", work_dir.display()),
            Err(e) => log::warn!("could not remove stale work dir {}: {}", work_dir.display(), e),
        }
    }
}
