//! Tag-encoded media library core.
//!
//! Tags live in file names as `(tag)(tag)...` groups; there is no tag database.
//! This crate indexes a folder of media files and answers queries over it:
//! - `tags` - the filename encoding and the alias table
//! - `index` - directory scan into immutable snapshots
//! - `hash` - content hashes memoized per path and fingerprint
//! - `query` - free-text and tag filtering, tag frequencies
//! - `cache` - query results memoized per snapshot generation
//! - `rename` - normalizing renames with collision counters
//! - `upload` - content-addressed cache of external upload URLs
//! - `library` - the shared state object tying it all together

pub mod cache;
pub mod error;
pub mod hash;
pub mod index;
pub mod library;
pub mod query;
pub mod rename;
pub mod tags;
pub mod types;
pub mod upload;

pub use error::{IndexError, Result};
pub use hash::{ContentHash, Fingerprint, HashMemo};
pub use index::{FileIndex, FileRecord, IndexSnapshot};
pub use library::{Library, DEFAULT_CACHE_CAPACITY};
pub use query::{QueryEngine, UNTAGGED_QUERY};
pub use rename::{RenameEngine, RenameOutcome};
pub use tags::AliasResolver;
pub use types::{
    ActiveQuery, FileInfo, MediaKind, RandomFilter, SearchResults, TagCount, MEDIA_EXTENSIONS,
};
pub use upload::{SharedUploader, UploadCache, Uploader};
