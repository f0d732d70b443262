//! Result types shared by the query, rename and upload layers.
//!
//! These serialize directly into the payloads the tagshelf server sends to
//! clients, so field names follow the wire format.

use serde::ser::SerializeTuple;
use serde::{Deserialize, Serialize, Serializer};

/// Extensions eligible for indexing, lower-case, without the dot.
pub const MEDIA_EXTENSIONS: [&str; 5] = ["jpeg", "jpg", "png", "gif", "mp4"];

/// Returns the lower-cased extension if it is in [`MEDIA_EXTENSIONS`].
pub fn media_extension(extension: &str) -> Option<String> {
    let lowered = extension.to_ascii_lowercase();
    MEDIA_EXTENSIONS
        .contains(&lowered.as_str())
        .then_some(lowered)
}

/// Media classification of an indexed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn from_extension(extension: &str) -> Self {
        if extension.eq_ignore_ascii_case("mp4") {
            Self::Video
        } else {
            Self::Image
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

/// Extension filter used when picking a random tagged file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RandomFilter {
    #[default]
    Image,
    Video,
    Gif,
    Any,
}

impl RandomFilter {
    pub fn matches(self, extension: &str) -> bool {
        let extension = extension.to_ascii_lowercase();
        match self {
            Self::Image => matches!(extension.as_str(), "jpeg" | "jpg" | "png"),
            Self::Video => extension == "mp4",
            Self::Gif => extension == "gif",
            Self::Any => true,
        }
    }
}

/// One file in a search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    /// Public URL under `/media`.
    pub url: String,
    /// Path relative to the library root, `/`-separated.
    pub path: String,
    pub name: String,
    /// Hex SHA-256 of the file content.
    pub hash: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    /// Tags from the approximate decoder, sorted.
    pub tags: Vec<String>,
}

/// A tag with the number of files carrying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

impl TagCount {
    pub fn new(tag: impl Into<String>, count: usize) -> Self {
        Self {
            tag: tag.into(),
            count,
        }
    }
}

// Serialized as `["tag", count]` for the tag cloud.
impl Serialize for TagCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.tag)?;
        tuple.serialize_element(&self.count)?;
        tuple.end()
    }
}

/// Output of a search: matching files plus the tag frequencies among them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResults {
    /// The lower-cased free-text query.
    pub query: String,
    pub files: Vec<FileInfo>,
    pub tags: Vec<TagCount>,
}

impl SearchResults {
    /// Moves the entry for `path` to the front, inserting `entry` if absent.
    pub fn promote(&mut self, path: &str, entry: Option<FileInfo>) {
        let existing = self.files.iter().position(|file| file.path == path);
        match (existing, entry) {
            (Some(index), _) => {
                let file = self.files.remove(index);
                self.files.insert(0, file);
            }
            (None, Some(entry)) => self.files.insert(0, entry),
            (None, None) => {}
        }
    }
}

/// A query to re-run after a mutation, as supplied by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ActiveQuery {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(path: &str) -> FileInfo {
        FileInfo {
            url: format!("/media/{path}"),
            path: path.to_string(),
            name: path.to_string(),
            hash: String::new(),
            kind: MediaKind::Image,
            tags: Vec::new(),
        }
    }

    #[test]
    fn media_extension_is_case_insensitive() {
        assert_eq!(media_extension("JPG").as_deref(), Some("jpg"));
        assert_eq!(media_extension("mp4").as_deref(), Some("mp4"));
        assert_eq!(media_extension("txt"), None);
    }

    #[test]
    fn kind_follows_extension() {
        assert_eq!(MediaKind::from_extension("mp4"), MediaKind::Video);
        assert_eq!(MediaKind::from_extension("gif"), MediaKind::Image);
    }

    #[test]
    fn random_filter_groups_extensions() {
        assert!(RandomFilter::Image.matches("jpeg"));
        assert!(RandomFilter::Image.matches("PNG"));
        assert!(!RandomFilter::Image.matches("gif"));
        assert!(RandomFilter::Gif.matches("gif"));
        assert!(RandomFilter::Video.matches("mp4"));
        assert!(RandomFilter::Any.matches("gif"));
    }

    #[test]
    fn tag_count_serializes_as_pair() {
        let value = serde_json::to_value(TagCount::new("cat", 3)).expect("serialize");
        assert_eq!(value, serde_json::json!(["cat", 3]));
    }

    #[test]
    fn promote_moves_existing_entry_first() {
        let mut results = SearchResults {
            query: String::new(),
            files: vec![info("a.jpg"), info("b.jpg"), info("c.jpg")],
            tags: Vec::new(),
        };
        results.promote("c.jpg", Some(info("c.jpg")));
        let paths: Vec<_> = results.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, ["c.jpg", "a.jpg", "b.jpg"]);
    }

    #[test]
    fn promote_inserts_missing_entry() {
        let mut results = SearchResults {
            query: String::new(),
            files: vec![info("a.jpg")],
            tags: Vec::new(),
        };
        results.promote("z.jpg", Some(info("z.jpg")));
        assert_eq!(results.files[0].path, "z.jpg");
        assert_eq!(results.files.len(), 2);
    }
}
