//! The owned state object behind every request.
//!
//! A [`Library`] ties the file index, the hash memo, the query cache and the
//! alias table together. Readers take the index lock only long enough to
//! clone the current snapshot; rename and delete hold the write lock across
//! the whole mutate + invalidate sequence.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::cache::{QueryCache, SearchKey, TagListKey};
use crate::error::{IndexError, Result};
use crate::hash::HashMemo;
use crate::index::{
    relative_path, resolve_relative, split_extension, FileIndex, FileRecord, IndexSnapshot,
};
use crate::query::QueryEngine;
use crate::rename::{RenameEffect, RenameEngine, RenameOutcome};
use crate::tags::AliasResolver;
use crate::types::{media_extension, ActiveQuery, RandomFilter, SearchResults, TagCount};

pub const DEFAULT_CACHE_CAPACITY: u64 = 1024;

#[derive(Debug)]
pub struct Library {
    root: PathBuf,
    index: RwLock<FileIndex>,
    hashes: Arc<HashMemo>,
    cache: QueryCache,
    aliases: AliasResolver,
}

impl Library {
    /// Opens the library at `root` with the builtin alias table.
    ///
    /// The root is scanned once up front so a bad root fails here.
    pub fn open(root: impl Into<PathBuf>, cache_capacity: u64) -> Result<Self> {
        Self::with_aliases(root, AliasResolver::builtin()?, cache_capacity)
    }

    pub fn with_aliases(
        root: impl Into<PathBuf>,
        aliases: AliasResolver,
        cache_capacity: u64,
    ) -> Result<Self> {
        let root = root.into();
        let hashes = Arc::new(HashMemo::new());
        let mut index = FileIndex::new(root.clone(), hashes.clone());
        index.snapshot()?;
        Ok(Self {
            root,
            index: RwLock::new(index),
            hashes,
            cache: QueryCache::new(cache_capacity),
            aliases,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn aliases(&self) -> &AliasResolver {
        &self.aliases
    }

    pub fn hashes(&self) -> Arc<HashMemo> {
        self.hashes.clone()
    }

    /// The current snapshot, rescanning if the last one was invalidated.
    pub fn snapshot(&self) -> Result<Arc<IndexSnapshot>> {
        if let Some(snapshot) = self.index.read().current() {
            return Ok(snapshot);
        }
        self.index.write().snapshot()
    }

    /// Drops the snapshot and every cached result.
    pub fn invalidate(&self) {
        let mut index = self.index.write();
        self.invalidate_locked(&mut index);
    }

    fn invalidate_locked(&self, index: &mut FileIndex) {
        index.invalidate();
        self.cache.invalidate_all();
        log::debug!("library invalidated generation={}", index.generation());
    }

    pub fn search(&self, free_text: &str, tags: &[String]) -> Result<Arc<SearchResults>> {
        let snapshot = self.snapshot()?;
        let key = SearchKey {
            free_text: free_text.to_lowercase(),
            tags: tags.to_vec(),
        };
        self.cache.search(snapshot.generation(), key, || {
            Ok(self.engine(&snapshot).search(free_text, tags))
        })
    }

    pub fn list_tags(&self, min_count: usize, sort_by_count: bool) -> Result<Arc<Vec<TagCount>>> {
        let snapshot = self.snapshot()?;
        let key = TagListKey {
            min_count,
            sort_by_count,
        };
        self.cache.tag_list(snapshot.generation(), key, || {
            Ok(self.engine(&snapshot).list_tags(min_count, sort_by_count))
        })
    }

    /// Records tagged `(tag)` whose extension passes `filter`.
    pub fn tagged(&self, tag: &str, filter: RandomFilter) -> Result<Vec<FileRecord>> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(IndexError::InvalidInput("tag is empty".to_string()));
        }
        let snapshot = self.snapshot()?;
        Ok(self
            .engine(&snapshot)
            .tagged(tag, filter)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Resolves a client path under the root without touching the disk.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        resolve_relative(&self.root, relative)
    }

    /// Resolves a client path and requires it to name an existing media file.
    ///
    /// Directories and files outside the extension allow-list are
    /// `InvalidInput`, so no operation reaches a file the index would skip.
    pub fn resolve_existing(&self, relative: &str) -> Result<PathBuf> {
        let path = self.resolve(relative)?;
        let metadata = fs::metadata(&path).map_err(|error| IndexError::from_io_at(&path, error))?;
        if !metadata.is_file() {
            return Err(IndexError::InvalidInput(format!("not a file: {relative}")));
        }
        let is_media = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(split_extension)
            .and_then(|(_, extension)| media_extension(extension))
            .is_some();
        if !is_media {
            return Err(IndexError::InvalidInput(format!("not a media file: {relative}")));
        }
        Ok(path)
    }

    /// Renames the file at `relative` to the normalized form of `input`.
    ///
    /// With an active query, the refreshed results carry the renamed file first.
    pub fn rename(
        &self,
        relative: &str,
        input: &str,
        active: Option<&ActiveQuery>,
    ) -> Result<RenameOutcome> {
        let effect = {
            let mut index = self.index.write();
            let source = self.resolve_existing(relative)?;
            let effect = RenameEngine::new(&self.aliases).rename_file(&source, input)?;
            if matches!(effect, RenameEffect::Moved(_)) {
                self.invalidate_locked(&mut index);
            }
            effect
        };

        let destination = match effect {
            RenameEffect::Unchanged => return Ok(RenameOutcome::Unchanged),
            RenameEffect::Moved(destination) => destination,
        };
        let path = relative_path(&self.root, &destination)
            .unwrap_or_else(|| destination.to_string_lossy().into_owned());

        let results = match active {
            Some(active) => Some(self.rerun_promoting(active, &path)?),
            None => None,
        };
        Ok(RenameOutcome::Renamed { path, results })
    }

    /// Deletes the file at `relative` and returns the refreshed active query.
    pub fn delete(
        &self,
        relative: &str,
        active: Option<&ActiveQuery>,
    ) -> Result<Option<SearchResults>> {
        let path = {
            let mut index = self.index.write();
            let path = self.resolve_existing(relative)?;
            fs::remove_file(&path).map_err(|error| IndexError::from_io_at(&path, error))?;
            self.invalidate_locked(&mut index);
            path
        };
        log::info!("deleted {}", path.display());

        match active {
            Some(active) => Ok(Some(self.search(&active.query, &active.tags)?.as_ref().clone())),
            None => Ok(None),
        }
    }

    fn rerun_promoting(&self, active: &ActiveQuery, path: &str) -> Result<SearchResults> {
        let mut results = self.search(&active.query, &active.tags)?.as_ref().clone();
        let entry = if results.files.iter().any(|file| file.path == path) {
            None
        } else {
            let snapshot = self.snapshot()?;
            snapshot
                .find(path)
                .and_then(|record| self.engine(&snapshot).file_info(record))
        };
        results.promote(path, entry);
        Ok(results)
    }

    fn engine<'a>(&'a self, snapshot: &'a IndexSnapshot) -> QueryEngine<'a> {
        QueryEngine::new(snapshot, &self.aliases, &self.hashes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn library(names: &[&str]) -> (TempDir, Library) {
        let dir = tempdir().expect("tempdir");
        for name in names {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("create parent");
            }
            fs::write(&path, name.as_bytes()).expect("write");
        }
        let library = Library::open(dir.path(), 64).expect("open");
        (dir, library)
    }

    fn paths(results: &SearchResults) -> Vec<&str> {
        results.files.iter().map(|file| file.path.as_str()).collect()
    }

    fn active(query: &str, tags: &[&str]) -> ActiveQuery {
        ActiveQuery {
            query: query.to_string(),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
        }
    }

    #[test]
    fn open_rejects_missing_root() {
        let dir = tempdir().expect("tempdir");
        let error = Library::open(dir.path().join("gone"), 8).expect_err("missing");
        assert!(matches!(error, IndexError::NotFound(_)));
    }

    #[test]
    fn repeated_search_is_cached() {
        let (_dir, library) = library(&["(cat).jpg", "(dog).jpg"]);
        let first = library.search("", &["cat".to_string()]).expect("search");
        let second = library.search("", &["cat".to_string()]).expect("search");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(paths(&first), ["(cat).jpg"]);
    }

    #[test]
    fn invalidate_picks_up_new_files() {
        let (dir, library) = library(&["(cat).jpg"]);
        assert_eq!(library.search("", &[]).expect("search").files.len(), 1);

        fs::write(dir.path().join("(cat)(new).png"), b"new").expect("write");
        assert_eq!(library.search("", &[]).expect("cached").files.len(), 1);

        library.invalidate();
        assert_eq!(library.search("", &[]).expect("rescan").files.len(), 2);
    }

    #[test]
    fn rename_invalidates_and_promotes() {
        let (dir, library) = library(&["(cat)(a).jpg", "(cat)(b).jpg", "(cat)(c).jpg"]);
        library.search("", &["cat".to_string()]).expect("warm cache");

        let outcome = library
            .rename("(cat)(c).jpg", "cat d", Some(&active("", &["cat"])))
            .expect("rename");
        let RenameOutcome::Renamed { path, results } = outcome else {
            panic!("expected a rename");
        };
        assert_eq!(path, "(cat)(d).jpg");
        assert!(dir.path().join("(cat)(d).jpg").exists());
        assert!(!dir.path().join("(cat)(c).jpg").exists());

        let results = results.expect("active query results");
        assert_eq!(paths(&results), ["(cat)(d).jpg", "(cat)(a).jpg", "(cat)(b).jpg"]);
        assert!(library.snapshot().expect("snapshot").find("(cat)(c).jpg").is_none());
    }

    #[test]
    fn renamed_file_leaving_the_query_is_still_shown() {
        let (_dir, library) = library(&["(cat).jpg", "(cat)(x).jpg"]);
        let outcome = library
            .rename("(cat)(x).jpg", "dog", Some(&active("", &["cat"])))
            .expect("rename");
        let RenameOutcome::Renamed { results, .. } = outcome else {
            panic!("expected a rename");
        };
        assert_eq!(paths(&results.expect("results")), ["(dog).jpg", "(cat).jpg"]);
    }

    #[test]
    fn rename_in_subdirectory_keeps_directory() {
        let (_dir, library) = library(&["album/one.gif"]);
        let outcome = library.rename("album/one.gif", "party", None).expect("rename");
        assert_eq!(
            outcome,
            RenameOutcome::Renamed {
                path: "album/(party).gif".to_string(),
                results: None,
            }
        );
    }

    #[test]
    fn rename_to_equivalent_name_is_unchanged() {
        let (_dir, library) = library(&["(a)(b).jpg"]);
        let outcome = library.rename("(a)(b).jpg", "(B)(a)", None).expect("rename");
        assert_eq!(outcome, RenameOutcome::Unchanged);
    }

    #[test]
    fn rename_of_missing_file_is_not_found() {
        let (_dir, library) = library(&["(a).jpg"]);
        let error = library.rename("(b).jpg", "c", None).expect_err("missing");
        assert!(matches!(error, IndexError::NotFound(_)));
    }

    #[test]
    fn paths_outside_the_root_are_rejected() {
        let (_dir, library) = library(&["(a).jpg"]);
        assert!(matches!(
            library.rename("../(a).jpg", "b", None),
            Err(IndexError::InvalidInput(_))
        ));
        assert!(matches!(
            library.delete("/etc/passwd", None),
            Err(IndexError::InvalidInput(_))
        ));
    }

    #[test]
    fn rename_cannot_move_a_file_out_of_its_directory() {
        let (dir, library) = library(&["(sub/.keep", "one.jpg"]);
        let error = library
            .rename("one.jpg", "sub/../../escaped", None)
            .expect_err("separator in name");
        assert!(matches!(error, IndexError::InvalidInput(_)));
        assert!(dir.path().join("one.jpg").exists());
        assert!(!dir.path().parent().expect("parent").join("escaped).jpg").exists());

        let error = library.rename("one.jpg", "a/b", None).expect_err("separator");
        assert!(matches!(error, IndexError::InvalidInput(_)));
    }

    #[test]
    fn only_media_files_can_be_touched() {
        let (dir, library) = library(&["settings.toml", "album.2023/(a).jpg", "(b).jpg"]);

        for relative in ["settings.toml", "album.2023"] {
            assert!(
                matches!(library.rename(relative, "cat", None), Err(IndexError::InvalidInput(_))),
                "renamed {relative}"
            );
            assert!(
                matches!(library.delete(relative, None), Err(IndexError::InvalidInput(_))),
                "deleted {relative}"
            );
            assert!(matches!(
                library.resolve_existing(relative),
                Err(IndexError::InvalidInput(_))
            ));
        }
        assert!(dir.path().join("settings.toml").exists());
        assert!(dir.path().join("album.2023/(a).jpg").exists());
        assert!(library.resolve_existing("(b).jpg").is_ok());
    }

    #[test]
    fn delete_removes_file_and_reruns_query() {
        let (dir, library) = library(&["(cat)(a).jpg", "(cat)(b).jpg"]);
        let results = library
            .delete("(cat)(a).jpg", Some(&active("", &["cat"])))
            .expect("delete")
            .expect("results");
        assert_eq!(paths(&results), ["(cat)(b).jpg"]);
        assert!(!dir.path().join("(cat)(a).jpg").exists());

        let error = library.delete("(cat)(a).jpg", None).expect_err("gone");
        assert!(matches!(error, IndexError::NotFound(_)));
    }

    #[test]
    fn list_tags_reflects_renames() {
        let (_dir, library) = library(&["(cat).jpg", "(dog).jpg"]);
        assert_eq!(library.list_tags(1, false).expect("tags").len(), 2);
        library.rename("(dog).jpg", "cat", None).expect("rename");
        assert_eq!(
            library.list_tags(1, true).expect("tags").as_ref(),
            &vec![TagCount::new("cat", 2)]
        );
    }

    #[test]
    fn tagged_requires_a_tag() {
        let (_dir, library) = library(&["(cat).jpg", "(cat).mp4"]);
        assert_eq!(library.tagged("cat", RandomFilter::Video).expect("tagged").len(), 1);
        assert!(matches!(
            library.tagged("  ", RandomFilter::Any),
            Err(IndexError::InvalidInput(_))
        ));
    }
}
