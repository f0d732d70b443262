//! Paste-host clients behind the [`Uploader`] trait.
//!
//! - `rustypaste` - self-hosted rustypaste server
//! - `catbox` - catbox.moe user API

mod catbox;
mod rustypaste;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tagindex::{IndexError, SharedUploader, Uploader};

use crate::config::UploadBackend;
use crate::error::ConfigError;

pub use catbox::{CatboxUploader, CATBOX_API_URL};
pub use rustypaste::RustypasteUploader;

/// Rejects every upload; used when no backend is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledUploader;

#[async_trait]
impl Uploader for DisabledUploader {
    async fn upload(&self, _bytes: Vec<u8>, _suffix: &str) -> tagindex::Result<String> {
        Err(IndexError::UploadFailed("no upload backend is configured".to_string()))
    }
}

/// Builds the uploader for `backend`. `timeout` bounds every HTTP request.
pub fn uploader_for(
    backend: &UploadBackend,
    timeout: Duration,
) -> Result<SharedUploader, ConfigError> {
    let uploader: SharedUploader = match backend {
        UploadBackend::Rustypaste { url, auth } => {
            Arc::new(RustypasteUploader::new(url.clone(), auth.clone(), timeout)?)
        }
        UploadBackend::Catbox { userhash } => {
            Arc::new(CatboxUploader::new(CATBOX_API_URL, userhash.clone(), timeout)?)
        }
        UploadBackend::Disabled => Arc::new(DisabledUploader),
    };
    Ok(uploader)
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .user_agent(concat!("tagshelf/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(|error| {
            ConfigError::invalid(
                "UPLOAD_BACKEND",
                format!("failed to build http client: {error}"),
            )
        })
}

/// Reads a paste-host reply whose body is the bare URL.
async fn url_from_response(host: &str, response: reqwest::Response) -> tagindex::Result<String> {
    let status = response.status();
    let body = response.text().await.map_err(|error| {
        IndexError::UploadFailed(format!("failed to read {host} response: {error}"))
    })?;
    if !status.is_success() {
        return Err(IndexError::UploadFailed(format!(
            "{host} returned {status}: {}",
            body.trim()
        )));
    }
    let url = body.trim();
    if !url.starts_with("http") {
        return Err(IndexError::UploadFailed(format!(
            "{host} returned an unexpected body: {url}"
        )));
    }
    Ok(url.to_string())
}

/// File name sent in multipart forms; hosts keep the extension.
fn upload_file_name(suffix: &str) -> String {
    format!("upload{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::Router;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// Captured request: authorization header and raw multipart body.
    pub(super) type Captured = (Option<String>, String);

    /// Serves `reply` on a random port and reports every request it receives.
    pub(super) async fn paste_host(
        reply: &'static str,
        status: axum::http::StatusCode,
    ) -> (SocketAddr, mpsc::UnboundedReceiver<Captured>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = Router::new().route(
            "/",
            post(move |headers: HeaderMap, body: Bytes| {
                let tx = tx.clone();
                async move {
                    let auth = headers
                        .get(axum::http::header::AUTHORIZATION)
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_string);
                    let _ = tx.send((auth, String::from_utf8_lossy(&body).into_owned()));
                    (status, reply)
                }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (addr, rx)
    }

    #[tokio::test]
    async fn disabled_uploader_fails() {
        let error = DisabledUploader
            .upload(b"x".to_vec(), ".jpg")
            .await
            .expect_err("disabled");
        assert!(matches!(error, IndexError::UploadFailed(_)));
    }

    #[test]
    fn backend_selection() {
        let timeout = Duration::from_secs(1);
        assert!(uploader_for(&UploadBackend::Disabled, timeout).is_ok());
        assert!(uploader_for(&UploadBackend::Catbox { userhash: None }, timeout).is_ok());
        assert!(uploader_for(
            &UploadBackend::Rustypaste {
                url: "http://127.0.0.1:1".to_string(),
                auth: None
            },
            timeout
        )
        .is_ok());
    }
}
