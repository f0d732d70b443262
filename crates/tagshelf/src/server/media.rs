//! Media file serving and random-by-tag picks.

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use rand::seq::IndexedRandom;
use serde::Deserialize;
use tagindex::{FileRecord, IndexError, RandomFilter};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeader;

use crate::server::error::ApiError;
use crate::server::ServerState;

pub const MEDIA_CACHE_CONTROL: &str = "public, max-age=31536000";

/// Serves files under the library root with a one-year cache lifetime.
pub(crate) fn media_service(root: &Path) -> SetResponseHeader<ServeDir, HeaderValue> {
    SetResponseHeader::overriding(
        ServeDir::new(root),
        header::CACHE_CONTROL,
        HeaderValue::from_static(MEDIA_CACHE_CONTROL),
    )
}

#[derive(Debug, Deserialize)]
pub struct InlineParams {
    #[serde(default, rename = "type")]
    pub kind: RandomFilter,
}

/// GET /random/redirect/:tag
pub(crate) async fn random_redirect(
    State(state): State<Arc<ServerState>>,
    UrlPath(tag): UrlPath<String>,
) -> Result<Response, ApiError> {
    let record = pick_random(&state, tag, RandomFilter::Any).await?;
    Ok((StatusCode::FOUND, [(header::LOCATION, record.url())]).into_response())
}

/// GET /random/inline/:tag?type=image|video|gif
pub(crate) async fn random_inline(
    State(state): State<Arc<ServerState>>,
    UrlPath(tag): UrlPath<String>,
    Query(params): Query<InlineParams>,
) -> Result<Response, ApiError> {
    let record = pick_random(&state, tag, params.kind).await?;
    let bytes = tokio::fs::read(&record.path)
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type(&record.extension))
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from(bytes))
        .map_err(|e| ApiError::internal(e.to_string()))
}

/// Handles `/random/<kind>/` with nothing after the slash.
pub(crate) async fn missing_tag() -> ApiError {
    ApiError::bad_request("tag is empty")
}

async fn pick_random(
    state: &ServerState,
    tag: String,
    filter: RandomFilter,
) -> Result<FileRecord, ApiError> {
    let library = state.library.clone();
    let records = tokio::task::spawn_blocking(move || library.tagged(&tag, filter))
        .await
        .map_err(|e| ApiError::internal(format!("task failed: {e}")))?
        .map_err(|error| match error {
            IndexError::InvalidInput(message) => ApiError::bad_request(message),
            other => ApiError::internal(other.to_string()),
        })?;

    records
        .choose(&mut rand::rng())
        .cloned()
        .ok_or_else(|| ApiError::not_found("no file carries this tag"))
}

fn content_type(extension: &str) -> &'static str {
    match extension {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}
