//! Operations shared by the HTTP API and the WebSocket channel.
//!
//! Both transports decode their input into a [`Request`], run it through
//! [`execute`], and render the resulting [`Reply`] or [`Failure`] in their
//! own format.

use std::sync::Arc;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use tagindex::{ActiveQuery, IndexError, RenameOutcome, SearchResults, TagCount};

use crate::server::ServerState;

pub const RENAMED_MESSAGE: &str = "Successfully renamed file";
pub const UNCHANGED_MESSAGE: &str = "New name is the same as the old name";
pub const DELETED_MESSAGE: &str = "Successfully deleted file";
pub const OPENED_MESSAGE: &str = "Successfully opened file";
pub const UPLOADED_MESSAGE: &str = "Successfully uploaded file";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SearchPayload {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TagsPayload {
    #[serde(default = "default_min")]
    pub min: usize,
    #[serde(default)]
    pub sort_by_count: bool,
}

impl Default for TagsPayload {
    fn default() -> Self {
        Self {
            min: default_min(),
            sort_by_count: false,
        }
    }
}

fn default_min() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RenamePayload {
    /// Current path relative to the library root.
    pub old: String,
    /// Name as typed by the user.
    pub new: String,
    #[serde(default, rename = "searchQuery", deserialize_with = "active_query")]
    pub search_query: Option<ActiveQuery>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeletePayload {
    pub file: String,
    #[serde(default, rename = "searchQuery", deserialize_with = "active_query")]
    pub search_query: Option<ActiveQuery>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FilePayload {
    pub file: String,
}

/// Reads `searchQuery`, which clients send as an object, a bare string or
/// an empty value when no query is active.
fn active_query<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<ActiveQuery>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(text) if text.trim().is_empty() => Ok(None),
        serde_json::Value::String(text) => Ok(Some(ActiveQuery {
            query: text,
            tags: Vec::new(),
        })),
        serde_json::Value::Object(map) if map.is_empty() => Ok(None),
        other => serde_json::from_value(other).map(Some).map_err(D::Error::custom),
    }
}

/// One operation, as decoded from either transport.
///
/// Socket frames deserialize straight into this type: `{"event": .., "data": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Request {
    Search(SearchPayload),
    Tags(TagsPayload),
    Rename(RenamePayload),
    Delete(DeletePayload),
    Open(FilePayload),
    #[serde(alias = "catbox")]
    Upload(FilePayload),
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::Search(_) => "search",
            Request::Tags(_) => "tags",
            Request::Rename(_) => "rename",
            Request::Delete(_) => "delete",
            Request::Open(_) => "open",
            Request::Upload(_) => "upload",
        }
    }

    fn failure_context(&self) -> &'static str {
        match self {
            Request::Search(_) => "An error occurred while searching",
            Request::Tags(_) => "An error occurred while fetching the tags",
            Request::Rename(_) => "An error occurred while renaming the file",
            Request::Delete(_) => "An error occurred while deleting the file",
            Request::Open(_) => "An error occurred while opening the file",
            Request::Upload(_) => "An error occurred while uploading the file",
        }
    }
}

/// Successful result of a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Results(Arc<SearchResults>),
    Tags(Arc<Vec<TagCount>>),
    Renamed {
        path: String,
        results: Option<SearchResults>,
    },
    Unchanged,
    Deleted {
        results: Option<SearchResults>,
    },
    Opened,
    Uploaded {
        url: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    BadRequest,
    Conflict,
    UploadFailed,
    Internal,
}

impl FailureKind {
    pub fn code(self) -> &'static str {
        match self {
            FailureKind::NotFound => "not_found",
            FailureKind::BadRequest => "bad_request",
            FailureKind::Conflict => "conflict",
            FailureKind::UploadFailed => "upload_failed",
            FailureKind::Internal => "internal",
        }
    }
}

/// A failed [`Request`], with a message meant for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn from_index(context: &str, error: IndexError) -> Self {
        let kind = match &error {
            IndexError::NotFound(_) => FailureKind::NotFound,
            IndexError::InvalidInput(_) => FailureKind::BadRequest,
            IndexError::CollisionExhausted(_) => FailureKind::Conflict,
            IndexError::UploadFailed(_) => FailureKind::UploadFailed,
            IndexError::Io(_) | IndexError::Serialization(_) => FailureKind::Internal,
        };
        Self::new(kind, format!("{context}: {error}"))
    }
}

/// Runs one request against the shared state.
pub async fn execute(state: &ServerState, request: Request) -> Result<Reply, Failure> {
    let name = request.name();
    let context = request.failure_context();
    let result = dispatch(state, request).await.map_err(|error| match error {
        Dispatch::Index(error) => Failure::from_index(context, error),
        Dispatch::Failure(failure) => failure,
    });
    if let Err(failure) = &result {
        tracing::warn!(operation = name, code = failure.kind.code(), "{}", failure.message);
    }
    result
}

enum Dispatch {
    Index(IndexError),
    Failure(Failure),
}

impl From<IndexError> for Dispatch {
    fn from(error: IndexError) -> Self {
        Dispatch::Index(error)
    }
}

async fn dispatch(state: &ServerState, request: Request) -> Result<Reply, Dispatch> {
    let library = state.library.clone();
    match request {
        Request::Search(SearchPayload { query, tags }) => {
            let results = blocking(move || library.search(&query, &tags)).await?;
            Ok(Reply::Results(results))
        }
        Request::Tags(TagsPayload { min, sort_by_count }) => {
            let tags = blocking(move || library.list_tags(min, sort_by_count)).await?;
            Ok(Reply::Tags(tags))
        }
        Request::Rename(RenamePayload {
            old,
            new,
            search_query,
        }) => {
            tracing::info!(old = %old, new = %new, "rename");
            let outcome =
                blocking(move || library.rename(&old, &new, search_query.as_ref())).await?;
            Ok(match outcome {
                RenameOutcome::Renamed { path, results } => Reply::Renamed { path, results },
                RenameOutcome::Unchanged => Reply::Unchanged,
            })
        }
        Request::Delete(DeletePayload { file, search_query }) => {
            tracing::info!(file = %file, "delete");
            let results = blocking(move || library.delete(&file, search_query.as_ref())).await?;
            Ok(Reply::Deleted { results })
        }
        Request::Open(FilePayload { file }) => {
            let reveal = state.reveal.clone();
            blocking(move || {
                let path = library.resolve_existing(&file)?;
                reveal.reveal(&path).map_err(|error| {
                    Dispatch::Failure(Failure::new(
                        FailureKind::Internal,
                        format!("An error occurred while opening the file: {error}"),
                    ))
                })
            })
            .await?;
            Ok(Reply::Opened)
        }
        Request::Upload(FilePayload { file }) => {
            let path = blocking(move || library.resolve_existing(&file)).await?;
            let url = state
                .uploads
                .get_or_upload(&path, state.uploader.as_ref(), state.upload_timeout)
                .await?;
            Ok(Reply::Uploaded { url })
        }
    }
}

/// Runs synchronous library work off the async runtime.
async fn blocking<T, E, F>(work: F) -> Result<T, Dispatch>
where
    T: Send + 'static,
    E: Into<Dispatch> + Send + 'static,
    F: FnOnce() -> Result<T, E> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result.map_err(Into::into),
        Err(error) => Err(Dispatch::Failure(Failure::new(
            FailureKind::Internal,
            format!("task failed: {error}"),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: serde_json::Value) -> Request {
        serde_json::from_value(value).expect("request")
    }

    #[test]
    fn socket_frames_decode_into_requests() {
        assert_eq!(
            request(json!({"event": "search", "data": {"query": "Cat", "tags": ["red"]}})),
            Request::Search(SearchPayload {
                query: "Cat".to_string(),
                tags: vec!["red".to_string()],
            })
        );
        assert_eq!(
            request(json!({"event": "tags", "data": {}})),
            Request::Tags(TagsPayload::default())
        );
        assert_eq!(
            request(json!({"event": "catbox", "data": {"file": "(a).jpg"}})),
            Request::Upload(FilePayload {
                file: "(a).jpg".to_string()
            })
        );
    }

    #[test]
    fn search_query_accepts_every_client_shape() {
        let rename = |search_query: serde_json::Value| match request(json!({
            "event": "rename",
            "data": {"old": "a.jpg", "new": "b", "searchQuery": search_query}
        })) {
            Request::Rename(payload) => payload.search_query,
            other => panic!("unexpected request {other:?}"),
        };

        assert_eq!(rename(json!("")), None);
        assert_eq!(rename(json!({})), None);
        assert_eq!(rename(json!(null)), None);
        assert_eq!(
            rename(json!("cat")),
            Some(ActiveQuery {
                query: "cat".to_string(),
                tags: Vec::new()
            })
        );
        assert_eq!(
            rename(json!({"query": "", "tags": ["cat"]})),
            Some(ActiveQuery {
                query: String::new(),
                tags: vec!["cat".to_string()]
            })
        );
    }

    #[test]
    fn missing_search_query_is_none() {
        let payload: DeletePayload =
            serde_json::from_value(json!({"file": "a.jpg"})).expect("payload");
        assert_eq!(payload.search_query, None);
    }

    #[test]
    fn unknown_events_are_rejected() {
        let error = serde_json::from_value::<Request>(json!({"event": "format", "data": {}}));
        assert!(error.is_err());
    }

    #[test]
    fn index_errors_map_to_failure_kinds() {
        let failure = Failure::from_index(
            "An error occurred while renaming the file",
            IndexError::NotFound("/library/a.jpg".into()),
        );
        assert_eq!(failure.kind, FailureKind::NotFound);
        assert!(failure.message.starts_with("An error occurred while renaming the file: "));
        assert_eq!(
            Failure::from_index("x", IndexError::InvalidInput("bad".into())).kind,
            FailureKind::BadRequest
        );
        assert_eq!(
            Failure::from_index("x", IndexError::UploadFailed("down".into())).kind,
            FailureKind::UploadFailed
        );
    }
}
