//! Normalizing renames into the canonical tag encoding.
//!
//! Whatever the user types is decoded into tags, lower-cased, expanded with
//! aliases and re-encoded, so formatting noise never reaches the filesystem.
//! A trailing `.N` before the extension is kept as an explicit counter.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};
use crate::index::split_extension;
use crate::tags::{self, AliasResolver};
use crate::types::{media_extension, SearchResults};

/// Characters that would turn a tag into extra path components.
const FORBIDDEN_IN_TAG: [char; 3] = ['/', '\\', '\0'];

/// Terminal result of a rename request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// The file was moved. `results` holds the refreshed active query, if any.
    Renamed {
        path: String,
        results: Option<SearchResults>,
    },
    /// The normalized name equals the current one; nothing was touched.
    Unchanged,
}

/// What a rename of one file resolved to on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameEffect {
    Moved(PathBuf),
    Unchanged,
}

/// A normalized target name, before collision handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameTarget {
    /// Canonical `(tag)(tag)` encoding.
    pub base: String,
    pub counter: Option<u32>,
    /// Lower-cased extension without the dot; never `jpeg`.
    pub extension: String,
}

impl RenameTarget {
    pub fn file_name(&self) -> String {
        match self.counter {
            Some(counter) => self.with_counter(counter),
            None => format!("{}.{}", self.base, self.extension),
        }
    }

    pub fn with_counter(&self, counter: u32) -> String {
        format!("{}.{}.{}", self.base, counter, self.extension)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RenameEngine<'a> {
    aliases: &'a AliasResolver,
}

impl<'a> RenameEngine<'a> {
    pub fn new(aliases: &'a AliasResolver) -> Self {
        Self { aliases }
    }

    /// Normalizes user input into a canonical target name.
    ///
    /// The typed extension wins if it is a media extension; otherwise the
    /// whole input is treated as the base and `source_extension` is kept.
    pub fn normalize(&self, input: &str, source_extension: &str) -> Result<RenameTarget> {
        let input = input.trim();
        let (mut base, extension) = match split_extension(input) {
            Some((stem, typed)) => match media_extension(typed) {
                Some(extension) => (stem, extension),
                None => (input, source_extension.to_ascii_lowercase()),
            },
            None => (input, source_extension.to_ascii_lowercase()),
        };

        let mut counter = None;
        if let Some((rest, last)) = base.rsplit_once('.') {
            if !last.is_empty() && last.bytes().all(|byte| byte.is_ascii_digit()) {
                let value = last.parse::<u32>().map_err(|_| {
                    IndexError::InvalidInput(format!("counter out of range: {last}"))
                })?;
                counter = (value > 0).then_some(value);
                base = rest;
            }
        }

        let lowered: BTreeSet<String> = tags::decode(base)
            .into_iter()
            .map(|tag| tag.to_lowercase())
            .collect();
        if let Some(tag) = lowered.iter().find(|tag| tag.contains(FORBIDDEN_IN_TAG)) {
            return Err(IndexError::InvalidInput(format!(
                "tag contains a path separator: {tag:?}"
            )));
        }
        let encoded = tags::encode(&self.aliases.expand(&lowered));
        if encoded.is_empty() {
            return Err(IndexError::InvalidInput(format!("name has no tags: {input:?}")));
        }
        if extension.is_empty() {
            return Err(IndexError::InvalidInput(format!(
                "name has no media extension: {input:?}"
            )));
        }

        Ok(RenameTarget {
            base: encoded,
            counter,
            extension: normalize_extension(extension),
        })
    }

    /// Picks a free path for `target` next to `source`.
    ///
    /// Returns `None` when the probe reaches `source` itself, meaning the file
    /// already carries an equivalent name.
    pub fn free_path(&self, source: &Path, target: &RenameTarget) -> Result<Option<PathBuf>> {
        let dir = source.parent().unwrap_or_else(|| Path::new(""));
        let first = dir.join(target.file_name());
        if first == source {
            return Ok(None);
        }
        if !first.exists() {
            return Ok(Some(first));
        }

        for counter in 1..=u32::MAX {
            let candidate = dir.join(target.with_counter(counter));
            if candidate == source {
                return Ok(None);
            }
            if !candidate.exists() {
                return Ok(Some(candidate));
            }
        }
        Err(IndexError::CollisionExhausted(first))
    }

    /// Renames `source` according to `input`. Does not touch any index.
    pub fn rename_file(&self, source: &Path, input: &str) -> Result<RenameEffect> {
        let name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| IndexError::InvalidInput(format!("not a file: {}", source.display())))?;
        let source_extension = split_extension(&name).map(|(_, ext)| ext).unwrap_or("");

        let target = self.normalize(input, source_extension)?;
        if target.file_name() == name {
            return Ok(RenameEffect::Unchanged);
        }
        if !source.exists() {
            return Err(IndexError::NotFound(source.to_path_buf()));
        }

        let Some(destination) = self.free_path(source, &target)? else {
            return Ok(RenameEffect::Unchanged);
        };
        if destination.parent() != source.parent() {
            return Err(IndexError::InvalidInput(format!(
                "rename would leave the directory: {}",
                destination.display()
            )));
        }
        fs::rename(source, &destination).map_err(|error| {
            if source.exists() {
                IndexError::Io(error)
            } else {
                IndexError::NotFound(source.to_path_buf())
            }
        })?;
        log::info!("renamed {} -> {}", source.display(), destination.display());
        Ok(RenameEffect::Moved(destination))
    }
}

fn normalize_extension(extension: String) -> String {
    if extension == "jpeg" {
        "jpg".to_string()
    } else {
        extension
    }
}
