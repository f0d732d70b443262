//! Recursive directory walk that collects media files.
//!
//! Subdirectories are walked in parallel with rayon. Entries of every
//! directory are sorted by name before they are visited and rayon's ordered
//! collect keeps that order, so the resulting list is in lexicographic
//! preorder on every platform.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;

use super::FileRecord;
use crate::error::{IndexError, Result};
use crate::hash::Fingerprint;

/// Counters shared by the parallel walk.
#[derive(Debug, Default)]
struct WalkStats {
    dirs: AtomicUsize,
    files: AtomicUsize,
    errors: AtomicUsize,
}

/// Walks `root` and returns every file with an allow-listed extension.
pub fn scan(root: &Path) -> Result<Vec<FileRecord>> {
    let started = Instant::now();
    let metadata = fs::metadata(root).map_err(|error| IndexError::from_io_at(root, error))?;
    if !metadata.is_dir() {
        return Err(IndexError::InvalidInput(format!(
            "library root is not a directory: {}",
            root.display()
        )));
    }

    let stats = WalkStats::default();
    let records = walk_dir(root, root, &stats);

    log::info!(
        "library scan root={} records={} files_seen={} dirs={} errors={} elapsed_ms={}",
        root.display(),
        records.len(),
        stats.files.load(Ordering::Relaxed),
        stats.dirs.load(Ordering::Relaxed),
        stats.errors.load(Ordering::Relaxed),
        started.elapsed().as_millis(),
    );
    Ok(records)
}

fn walk_dir(root: &Path, dir: &Path, stats: &WalkStats) -> Vec<FileRecord> {
    stats.dirs.fetch_add(1, Ordering::Relaxed);
    let read_dir = match fs::read_dir(dir) {
        Ok(iter) => iter,
        Err(error) => {
            stats.errors.fetch_add(1, Ordering::Relaxed);
            log::warn!("skipping unreadable directory {}: {error}", dir.display());
            return Vec::new();
        }
    };

    let mut entries: Vec<_> = read_dir
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(_) => {
                stats.errors.fetch_add(1, Ordering::Relaxed);
                None
            }
        })
        .collect();
    entries.sort_unstable_by_key(|entry| entry.file_name());

    entries
        .into_par_iter()
        .flat_map_iter(|entry| {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                stats.errors.fetch_add(1, Ordering::Relaxed);
                return Vec::new();
            };

            // Symlinked directories are not followed.
            if file_type.is_dir() {
                return walk_dir(root, &path, stats);
            }

            stats.files.fetch_add(1, Ordering::Relaxed);
            let metadata = match fs::metadata(&path) {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => return Vec::new(),
                Err(_) => {
                    stats.errors.fetch_add(1, Ordering::Relaxed);
                    return Vec::new();
                }
            };
            FileRecord::new(root, path, Fingerprint::from_metadata(&metadata))
                .into_iter()
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, b"x").expect("write file");
    }

    #[test]
    fn scan_keeps_allow_listed_extensions_in_name_order() {
        let dir = tempdir().expect("tempdir");
        touch(&dir.path().join("b (cat).jpg"));
        touch(&dir.path().join("a.PNG"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join("nested/(dog).mp4"));
        touch(&dir.path().join("nested/deeper/clip.gif"));
        touch(&dir.path().join("nested/readme"));

        let records = scan(dir.path()).expect("scan");
        let relative: Vec<_> = records.iter().map(|r| r.relative.as_str()).collect();
        assert_eq!(
            relative,
            ["a.PNG", "b (cat).jpg", "nested/(dog).mp4", "nested/deeper/clip.gif"]
        );
    }

    #[test]
    fn scan_of_missing_root_is_not_found() {
        let dir = tempdir().expect("tempdir");
        let missing = dir.path().join("gone");
        let error = scan(&missing).expect_err("missing root");
        assert!(matches!(error, IndexError::NotFound(_)));
    }

    #[test]
    fn scan_of_file_root_is_invalid() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("(a).jpg");
        touch(&file);
        let error = scan(&file).expect_err("file root");
        assert!(matches!(error, IndexError::InvalidInput(_)));
    }
}
