//! Query evaluation over an index snapshot.
//!
//! A search combines free text and tag filters with AND semantics:
//! - every whitespace-separated word of the free text must occur in the
//!   lower-cased basename
//! - every tag filter, wrapped as `(tag)`, must occur verbatim in the basename
//!
//! Tag filtering is substring matching on the encoded form, not tag-set
//! membership, so it is case-sensitive and alias-unaware.
//!
//! The special free text `[]` selects untagged files and ignores tag filters.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::hash::HashMemo;
use crate::index::{FileRecord, IndexSnapshot};
use crate::tags::{self, AliasResolver};
use crate::types::{FileInfo, RandomFilter, SearchResults, TagCount};

/// Free text selecting files whose basename has no tag groups.
pub const UNTAGGED_QUERY: &str = "[]";

#[derive(Debug, Clone, Copy)]
pub struct QueryEngine<'a> {
    snapshot: &'a IndexSnapshot,
    aliases: &'a AliasResolver,
    hashes: &'a HashMemo,
}

impl<'a> QueryEngine<'a> {
    pub fn new(
        snapshot: &'a IndexSnapshot,
        aliases: &'a AliasResolver,
        hashes: &'a HashMemo,
    ) -> Self {
        Self {
            snapshot,
            aliases,
            hashes,
        }
    }

    /// Records matching the query, in index order.
    pub fn matching(&self, free_text: &str, tag_filters: &[String]) -> Vec<&'a FileRecord> {
        let records = self.snapshot.records();
        let free_text = free_text.to_lowercase();

        if free_text == UNTAGGED_QUERY {
            return records
                .iter()
                .filter(|record| !record.has_tag_groups())
                .collect();
        }

        let words: Vec<&str> = free_text.split_whitespace().collect();
        let groups: Vec<String> = tag_filters.iter().map(|tag| format!("({tag})")).collect();

        records
            .iter()
            .filter(|record| groups.iter().all(|group| record.stem.contains(group.as_str())))
            .filter(|record| {
                if words.is_empty() {
                    return true;
                }
                let stem = record.stem.to_lowercase();
                words.iter().all(|word| stem.contains(word))
            })
            .collect()
    }

    /// Runs a search and builds the enriched result with tag frequencies.
    pub fn search(&self, free_text: &str, tag_filters: &[String]) -> SearchResults {
        let matches = self.matching(free_text, tag_filters);
        let files: Vec<FileInfo> = matches
            .par_iter()
            .filter_map(|record| self.file_info(record))
            .collect();
        let tags = self.tag_frequencies(&files);

        SearchResults {
            query: free_text.to_lowercase(),
            files,
            tags,
        }
    }

    /// Enriches one record; `None` if its content can no longer be read.
    pub fn file_info(&self, record: &FileRecord) -> Option<FileInfo> {
        let hash = match self.hashes.hash_file(&record.path, record.fingerprint) {
            Ok(hash) => hash,
            Err(error) => {
                log::warn!("skipping {} in results: {error}", record.relative);
                return None;
            }
        };
        Some(FileInfo {
            url: record.url(),
            path: record.relative.clone(),
            name: record.name.clone(),
            hash: hash.into_string(),
            kind: record.kind,
            tags: tags::decode_fast(&record.stem).into_iter().collect(),
        })
    }

    /// Alias-aware tag counts over a result set, most frequent first.
    pub fn tag_frequencies(&self, files: &[FileInfo]) -> Vec<TagCount> {
        let counts = self
            .aliases
            .count_with_dedup(files.iter().map(|file| file.tags.iter()));
        sorted_by_count(counts)
    }

    /// Raw tag counts over the whole index.
    ///
    /// Only basenames using the parenthesized encoding contribute; untagged
    /// files would otherwise flood the list with their words.
    pub fn list_tags(&self, min_count: usize, sort_by_count: bool) -> Vec<TagCount> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for record in self.snapshot.records() {
            if !record.has_tag_groups() {
                continue;
            }
            for tag in record.tags() {
                *counts.entry(tag).or_insert(0) += 1;
            }
        }
        counts.retain(|_, count| *count >= min_count);

        if sort_by_count {
            sorted_by_count(counts)
        } else {
            let mut tags: Vec<TagCount> = counts
                .into_iter()
                .map(|(tag, count)| TagCount::new(tag, count))
                .collect();
            tags.sort_by(|a, b| a.tag.cmp(&b.tag));
            tags
        }
    }

    /// Records whose basename contains `(tag)` and whose extension passes `filter`.
    pub fn tagged(&self, tag: &str, filter: RandomFilter) -> Vec<&'a FileRecord> {
        let group = format!("({tag})");
        self.snapshot
            .records()
            .iter()
            .filter(|record| {
                record.stem.contains(group.as_str()) && filter.matches(&record.extension)
            })
            .collect()
    }
}

fn sorted_by_count(counts: HashMap<String, usize>) -> Vec<TagCount> {
    let mut tags: Vec<TagCount> = counts
        .into_iter()
        .map(|(tag, count)| TagCount::new(tag, count))
        .collect();
    tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    tags
}
