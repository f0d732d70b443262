//! Memoization of query results.
//!
//! Keys carry the generation of the snapshot the result was computed from.
//! A result computed against an old snapshot can therefore never answer a
//! query against a newer one, even if it is inserted after invalidation.

use std::sync::Arc;

use moka::sync::Cache;

use crate::error::Result;
use crate::types::{SearchResults, TagCount};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchKey {
    /// Lower-cased free text.
    pub free_text: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagListKey {
    pub min_count: usize,
    pub sort_by_count: bool,
}

#[derive(Clone)]
pub struct QueryCache {
    searches: Cache<(u64, SearchKey), Arc<SearchResults>>,
    tag_lists: Cache<(u64, TagListKey), Arc<Vec<TagCount>>>,
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("searches", &self.searches.entry_count())
            .field("tag_lists", &self.tag_lists.entry_count())
            .finish()
    }
}

impl QueryCache {
    pub fn new(max_entries: u64) -> Self {
        let max_capacity = max_entries.max(1);
        Self {
            searches: Cache::builder().max_capacity(max_capacity).build(),
            tag_lists: Cache::builder().max_capacity(max_capacity).build(),
        }
    }

    pub fn search(
        &self,
        generation: u64,
        key: SearchKey,
        compute: impl FnOnce() -> Result<SearchResults>,
    ) -> Result<Arc<SearchResults>> {
        let key = (generation, key);
        if let Some(hit) = self.searches.get(&key) {
            log::debug!("search cache hit generation={generation}");
            return Ok(hit);
        }
        let value = Arc::new(compute()?);
        self.searches.insert(key, value.clone());
        Ok(value)
    }

    pub fn tag_list(
        &self,
        generation: u64,
        key: TagListKey,
        compute: impl FnOnce() -> Result<Vec<TagCount>>,
    ) -> Result<Arc<Vec<TagCount>>> {
        let key = (generation, key);
        if let Some(hit) = self.tag_lists.get(&key) {
            log::debug!("tag list cache hit generation={generation}");
            return Ok(hit);
        }
        let value = Arc::new(compute()?);
        self.tag_lists.insert(key, value.clone());
        Ok(value)
    }

    pub fn invalidate_all(&self) {
        self.searches.invalidate_all();
        self.tag_lists.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndexError;

    fn results(query: &str) -> SearchResults {
        SearchResults {
            query: query.to_string(),
            files: Vec::new(),
            tags: Vec::new(),
        }
    }

    fn key(text: &str) -> SearchKey {
        SearchKey {
            free_text: text.to_string(),
            tags: Vec::new(),
        }
    }

    #[test]
    fn second_lookup_is_served_from_cache() {
        let cache = QueryCache::new(16);
        cache.search(0, key("cat"), || Ok(results("cat"))).expect("compute");
        let hit = cache
            .search(0, key("cat"), || panic!("should not recompute"))
            .expect("hit");
        assert_eq!(hit.query, "cat");
    }

    #[test]
    fn newer_generation_recomputes() {
        let cache = QueryCache::new(16);
        cache.search(0, key("cat"), || Ok(results("old"))).expect("compute");
        let fresh = cache.search(1, key("cat"), || Ok(results("new"))).expect("recompute");
        assert_eq!(fresh.query, "new");
    }

    #[test]
    fn invalidate_all_drops_entries() {
        let cache = QueryCache::new(16);
        let tags = TagListKey {
            min_count: 1,
            sort_by_count: false,
        };
        cache.tag_list(0, tags, || Ok(vec![TagCount::new("a", 1)])).expect("compute");
        cache.invalidate_all();
        let recomputed = cache
            .tag_list(0, tags, || Ok(Vec::new()))
            .expect("recompute");
        assert!(recomputed.is_empty());
    }

    #[test]
    fn errors_are_not_cached() {
        let cache = QueryCache::new(16);
        let error = cache
            .search(0, key("x"), || Err(IndexError::InvalidInput("bad".into())))
            .expect_err("error");
        assert!(matches!(error, IndexError::InvalidInput(_)));
        let ok = cache.search(0, key("x"), || Ok(results("x"))).expect("compute");
        assert_eq!(ok.query, "x");
    }
}
