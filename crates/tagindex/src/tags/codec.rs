//! Conversion between tag sets and the `(tag)(tag)...` basename encoding.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

static TAG_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((.*?)\)").expect("valid tag group regex"));

/// Encodes a tag set as its canonical basename.
///
/// Tags are emitted in set order (lexicographic), each wrapped in
/// parentheses, with no separator. Case is preserved.
pub fn encode(tags: &BTreeSet<String>) -> String {
    tags.iter().map(|tag| format!("({tag})")).collect()
}

/// Returns true if the basename uses the parenthesized encoding at all.
pub fn has_tag_groups(basename: &str) -> bool {
    basename.contains(['(', ')'])
}

/// Decodes a basename into its tag set.
///
/// Basenames without any parentheses are split on whitespace. Otherwise
/// parentheses are depth-counted: each top-level group is one tag, nested
/// groups stay inside the tag verbatim, and text outside of groups becomes
/// a tag of its own. Fragments are trimmed; empty ones are dropped.
pub fn decode(basename: &str) -> BTreeSet<String> {
    if !has_tag_groups(basename) {
        return basename.split_whitespace().map(str::to_string).collect();
    }

    let mut tags = BTreeSet::new();
    let mut fragment = String::new();
    let mut depth = 0usize;

    for ch in basename.chars() {
        match ch {
            '(' => {
                if depth == 0 {
                    flush_fragment(&mut tags, &mut fragment);
                } else {
                    fragment.push(ch);
                }
                depth += 1;
            }
            ')' => match depth {
                // Unbalanced close: treat it as a boundary.
                0 => flush_fragment(&mut tags, &mut fragment),
                1 => {
                    depth = 0;
                    flush_fragment(&mut tags, &mut fragment);
                }
                _ => {
                    depth -= 1;
                    fragment.push(ch);
                }
            },
            _ => fragment.push(ch),
        }
    }
    flush_fragment(&mut tags, &mut fragment);

    tags
}

/// Approximate decoder for the hot search path.
///
/// Collects every non-greedy `(...)` capture. There is no whitespace
/// fallback, no nesting support and no trimming, so untagged basenames
/// decode to an empty set and `(a(b))` yields `a(b`.
pub fn decode_fast(basename: &str) -> BTreeSet<String> {
    TAG_GROUP
        .captures_iter(basename)
        .filter_map(|captures| captures.get(1))
        .map(|group| group.as_str().to_string())
        .collect()
}

fn flush_fragment(tags: &mut BTreeSet<String>, fragment: &mut String) {
    let trimmed = fragment.trim();
    if !trimmed.is_empty() {
        tags.insert(trimmed.to_string());
    }
    fragment.clear();
}
