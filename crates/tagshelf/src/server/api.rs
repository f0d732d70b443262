//! JSON API endpoints.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tagindex::SearchResults;

use crate::ops::{
    self, DeletePayload, FilePayload, RenamePayload, Reply, Request, SearchPayload, TagsPayload,
    DELETED_MESSAGE, OPENED_MESSAGE, RENAMED_MESSAGE, UNCHANGED_MESSAGE, UPLOADED_MESSAGE,
};
use crate::server::error::ApiError;
use crate::server::ServerState;

/// Query string of `GET /api/search`.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    /// Comma-separated tag filters.
    #[serde(default)]
    pub tags: String,
}

/// Query string of `GET /api/tags`.
#[derive(Debug, Deserialize)]
pub struct TagsParams {
    pub min: Option<String>,
    pub sort_by_count: Option<String>,
}

/// Body of every mutating endpoint's success response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub ok: bool,
    pub message: &'static str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub unchanged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<SearchResults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ActionResponse {
    fn new(message: &'static str) -> Self {
        Self {
            ok: true,
            message,
            unchanged: false,
            path: None,
            results: None,
            url: None,
        }
    }
}

/// GET /api/search
pub(crate) async fn search(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<SearchParams>,
) -> Result<Response, ApiError> {
    let payload = SearchPayload {
        query: params.query,
        tags: split_tags(&params.tags),
    };
    respond(&state, Request::Search(payload)).await
}

/// GET /api/tags
pub(crate) async fn tags(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<TagsParams>,
) -> Result<Response, ApiError> {
    let mut payload = TagsPayload::default();
    if let Some(min) = params.min.as_deref().map(str::trim).filter(|min| !min.is_empty()) {
        payload.min = min
            .parse()
            .map_err(|_| ApiError::bad_request(format!("invalid min: {min}")))?;
    }
    payload.sort_by_count = params.sort_by_count.as_deref().is_some_and(is_truthy);
    respond(&state, Request::Tags(payload)).await
}

/// POST /api/rename
#[tracing::instrument(skip_all)]
pub(crate) async fn rename(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<RenamePayload>,
) -> Result<Response, ApiError> {
    respond(&state, Request::Rename(payload)).await
}

/// POST /api/delete
#[tracing::instrument(skip_all)]
pub(crate) async fn delete(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<DeletePayload>,
) -> Result<Response, ApiError> {
    respond(&state, Request::Delete(payload)).await
}

/// POST /api/open
pub(crate) async fn open(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<FilePayload>,
) -> Result<Response, ApiError> {
    respond(&state, Request::Open(payload)).await
}

/// POST /api/upload, also mounted at /api/catbox.
#[tracing::instrument(skip_all)]
pub(crate) async fn upload(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<FilePayload>,
) -> Result<Response, ApiError> {
    respond(&state, Request::Upload(payload)).await
}

async fn respond(state: &ServerState, request: Request) -> Result<Response, ApiError> {
    let reply = ops::execute(state, request).await?;
    Ok(render(reply))
}

/// Renders a reply as the HTTP response body.
pub(crate) fn render(reply: Reply) -> Response {
    match reply {
        Reply::Results(results) => Json(results.as_ref()).into_response(),
        Reply::Tags(tags) => Json(tags.as_ref()).into_response(),
        Reply::Renamed { path, results } => Json(ActionResponse {
            path: Some(path),
            results,
            ..ActionResponse::new(RENAMED_MESSAGE)
        })
        .into_response(),
        Reply::Unchanged => Json(ActionResponse {
            unchanged: true,
            ..ActionResponse::new(UNCHANGED_MESSAGE)
        })
        .into_response(),
        Reply::Deleted { results } => Json(ActionResponse {
            results,
            ..ActionResponse::new(DELETED_MESSAGE)
        })
        .into_response(),
        Reply::Opened => Json(ActionResponse::new(OPENED_MESSAGE)).into_response(),
        Reply::Uploaded { url } => Json(ActionResponse {
            url: Some(url),
            ..ActionResponse::new(UPLOADED_MESSAGE)
        })
        .into_response(),
    }
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    !(value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_split_on_commas() {
        assert_eq!(split_tags("cat, red,,"), ["cat", "red"]);
        assert!(split_tags("").is_empty());
    }

    #[test]
    fn truthy_flags() {
        assert!(is_truthy("true"));
        assert!(is_truthy("1"));
        assert!(!is_truthy("False"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy(""));
    }
}
