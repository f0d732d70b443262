//! Synonym groups for tags.
//!
//! Every tag in a group is interchangeable. The representative of a group is
//! its greatest member under string ordering, which puts emoji first for the
//! builtin table.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::{IndexError, Result};

/// The alias table shipped with tagshelf.
pub const BUILTIN_ALIAS_GROUPS: &[&[&str]] = &[
    &["😭", "sob", "cry", "sad"],
    &["😄", "smile", "happy"],
    &["😂", "laugh", "lol"],
    &["usa", "america", "murica"],
    &["💵", "money", "cash", "yen", "$"],
    &["kill myself", "kms"],
    &["🖕", "kill yourself", "kys", "f you"],
    &["🔫", "shoot", "gun"],
    &["❓", "what", "?", "confused"],
    &["😮", "surprised", "shock", "!", "😯"],
    &["🤮", "ew", "yuck", "🤢", "disgusted"],
    &["👌", "approve", "thumbs up", "+1", "👍", "ok"],
    &["🍆", "boner", "horny", "hot", "lewd"],
    &["🏳️‍🌈", "gay", "faggot"],
    &["😏", "smirk", "smug", "heh"],
    &["💊", "based", "redpilled"],
    &["🤔", "think"],
];

#[derive(Debug, Clone, Default)]
pub struct AliasResolver {
    groups: Vec<BTreeSet<String>>,
    /// tag -> index into `groups`
    membership: HashMap<String, usize>,
}

impl AliasResolver {
    /// Builds a resolver, rejecting tables where a tag belongs to two groups.
    pub fn new<G, T>(groups: G) -> Result<Self>
    where
        G: IntoIterator,
        G::Item: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut resolver = Self::default();
        for group in groups {
            let members: BTreeSet<String> = group.into_iter().map(Into::into).collect();
            if members.is_empty() {
                continue;
            }
            let index = resolver.groups.len();
            for member in &members {
                if let Some(previous) = resolver.membership.insert(member.clone(), index) {
                    return Err(IndexError::InvalidInput(format!(
                        "alias '{member}' appears in groups {previous} and {index}"
                    )));
                }
            }
            resolver.groups.push(members);
        }
        Ok(resolver)
    }

    pub fn builtin() -> Result<Self> {
        Self::new(BUILTIN_ALIAS_GROUPS.iter().map(|group| group.iter().copied()))
    }

    /// Returns the group representative for `tag`, or `tag` itself.
    pub fn canonicalize<'a>(&'a self, tag: &'a str) -> &'a str {
        self.membership
            .get(tag)
            .and_then(|&index| self.groups[index].last())
            .map(String::as_str)
            .unwrap_or(tag)
    }

    /// Adds every member of every group the input touches.
    pub fn expand(&self, tags: &BTreeSet<String>) -> BTreeSet<String> {
        let mut expanded = tags.clone();
        let touched: HashSet<usize> = tags
            .iter()
            .filter_map(|tag| self.membership.get(tag).copied())
            .collect();
        for index in touched {
            expanded.extend(self.groups[index].iter().cloned());
        }
        expanded
    }

    /// Counts tags across files, keyed by canonical tag.
    ///
    /// A file adds at most one to each canonical tag, so a file tagged with
    /// two synonyms is counted once.
    pub fn count_with_dedup<F, T>(&self, files: F) -> HashMap<String, usize>
    where
        F: IntoIterator,
        F::Item: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for file_tags in files {
            let mut seen: HashSet<String> = HashSet::new();
            for tag in file_tags {
                let canonical = self.canonicalize(tag.as_ref());
                if seen.insert(canonical.to_string()) {
                    *counts.entry(canonical.to_string()).or_insert(0) += 1;
                }
            }
        }
        counts
    }

    pub fn groups(&self) -> &[BTreeSet<String>] {
        &self.groups
    }
}
