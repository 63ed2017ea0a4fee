//! Collect the files under an input directory in natural order.

use std::path::{Path, PathBuf};

use plateprep_pipeline::sort_naturally;
use walkdir::WalkDir;

/// Every regular file below `root`, recursively, sorted by
/// [`sort_key`](plateprep_pipeline::sort_key).
///
/// Entries that cannot be read are logged and skipped.
#[must_use]
pub fn collect_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(root = %root.display(), error = %err, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect();
    sort_naturally(&mut files);
    files
}
