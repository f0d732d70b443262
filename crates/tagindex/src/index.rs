//! The in-memory file index.
//!
//! A [`FileIndex`] holds at most one [`IndexSnapshot`]: the full list of media
//! files under the library root at the time of the last scan. Snapshots are
//! never patched. Any mutation of the library invalidates the snapshot and
//! the next access rescans from disk.
//!
//! - `walk` - parallel directory walk with the extension allow-list

mod walk;

use std::collections::{BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

pub use walk::scan;

use crate::error::{IndexError, Result};
use crate::hash::{Fingerprint, HashMemo};
use crate::tags;
use crate::types::{media_extension, MediaKind};

/// One media file under the library root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Absolute path.
    pub path: PathBuf,
    /// Path relative to the root, `/`-separated.
    pub relative: String,
    pub name: String,
    /// File name without the extension.
    pub stem: String,
    /// Lower-cased extension without the dot.
    pub extension: String,
    pub kind: MediaKind,
    pub fingerprint: Fingerprint,
}

impl FileRecord {
    /// Builds a record, or `None` if the file is not an allow-listed media file.
    pub fn new(root: &Path, path: PathBuf, fingerprint: Fingerprint) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().into_owned();
        let (stem, extension) = split_extension(&name)?;
        let extension = media_extension(extension)?;
        let relative = relative_path(root, &path)?;
        Some(Self {
            stem: stem.to_string(),
            kind: MediaKind::from_extension(&extension),
            extension,
            relative,
            name,
            path,
            fingerprint,
        })
    }

    /// Exact tag set of the basename, ignoring a collision counter.
    pub fn tags(&self) -> BTreeSet<String> {
        tags::decode(strip_counter(&self.stem))
    }

    pub fn has_tag_groups(&self) -> bool {
        tags::has_tag_groups(&self.stem)
    }

    pub fn url(&self) -> String {
        media_url(&self.relative)
    }
}

/// Splits `name` at its last dot. Dot-files such as `.jpg` have no extension.
pub fn split_extension(name: &str) -> Option<(&str, &str)> {
    match name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() && !extension.is_empty() => {
            Some((stem, extension))
        }
        _ => None,
    }
}

/// Strips a trailing `.N` collision counter from a stem.
pub fn strip_counter(stem: &str) -> &str {
    match stem.rsplit_once('.') {
        Some((base, counter))
            if !base.is_empty()
                && !counter.is_empty()
                && counter.bytes().all(|byte| byte.is_ascii_digit()) =>
        {
            base
        }
        _ => stem,
    }
}

/// Public URL of a root-relative path, each segment percent-encoded.
pub fn media_url(relative: &str) -> String {
    let encoded: Vec<_> = relative
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("/media/{}", encoded.join("/"))
}

pub(crate) fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments: Vec<_> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    (!segments.is_empty()).then(|| segments.join("/"))
}

/// Resolves a client-supplied relative path under `root`.
///
/// Absolute paths and `..` components are rejected so requests cannot reach
/// outside the library.
pub fn resolve_relative(root: &Path, relative: &str) -> Result<PathBuf> {
    let candidate = Path::new(relative);
    let mut resolved = root.to_path_buf();
    let mut depth = 0usize;
    for component in candidate.components() {
        match component {
            Component::Normal(segment) => {
                resolved.push(segment);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(IndexError::InvalidInput(format!(
                    "path escapes the library root: {relative}"
                )));
            }
        }
    }
    if depth == 0 {
        return Err(IndexError::InvalidInput("empty file path".to_string()));
    }
    Ok(resolved)
}

/// An immutable list of records from one scan.
#[derive(Debug)]
pub struct IndexSnapshot {
    generation: u64,
    records: Vec<FileRecord>,
    by_relative: HashMap<String, usize>,
}

impl IndexSnapshot {
    pub fn new(generation: u64, records: Vec<FileRecord>) -> Self {
        let by_relative = records
            .iter()
            .enumerate()
            .map(|(position, record)| (record.relative.clone(), position))
            .collect();
        Self {
            generation,
            records,
            by_relative,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(&self, relative: &str) -> Option<&FileRecord> {
        self.by_relative
            .get(relative)
            .map(|&position| &self.records[position])
    }
}

#[derive(Debug)]
pub struct FileIndex {
    root: PathBuf,
    hashes: Arc<HashMemo>,
    current: Option<Arc<IndexSnapshot>>,
    generation: u64,
}

impl FileIndex {
    pub fn new(root: PathBuf, hashes: Arc<HashMemo>) -> Self {
        Self {
            root,
            hashes,
            current: None,
            generation: 0,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Generation of the next or current snapshot; bumped by every invalidation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The current snapshot, if one has been scanned since the last invalidation.
    pub fn current(&self) -> Option<Arc<IndexSnapshot>> {
        self.current.clone()
    }

    /// Returns the current snapshot, scanning the root if there is none.
    pub fn snapshot(&mut self) -> Result<Arc<IndexSnapshot>> {
        if let Some(snapshot) = &self.current {
            return Ok(snapshot.clone());
        }
        self.rescan()
    }

    /// Drops the snapshot; the next [`FileIndex::snapshot`] call rescans.
    pub fn invalidate(&mut self) {
        self.current = None;
        self.generation += 1;
    }

    fn rescan(&mut self) -> Result<Arc<IndexSnapshot>> {
        let records = scan(&self.root)?;

        let live: HashMap<&Path, Fingerprint> = records
            .iter()
            .map(|record| (record.path.as_path(), record.fingerprint))
            .collect();
        let pruned = self
            .hashes
            .retain(|path, fingerprint| live.get(path) == Some(&fingerprint));
        if pruned > 0 {
            log::debug!("dropped {pruned} stale content hashes");
        }

        let snapshot = Arc::new(IndexSnapshot::new(self.generation, records));
        self.current = Some(snapshot.clone());
        Ok(snapshot)
    }
}
