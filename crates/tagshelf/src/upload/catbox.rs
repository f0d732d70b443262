use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tagindex::{IndexError, Uploader};

use super::{http_client, upload_file_name, url_from_response};
use crate::error::ConfigError;

pub const CATBOX_API_URL: &str = "https://catbox.moe/user/api.php";

/// Uploads through the catbox.moe user API.
///
/// Without a userhash the file is uploaded anonymously.
#[derive(Debug, Clone)]
pub struct CatboxUploader {
    client: reqwest::Client,
    endpoint: String,
    userhash: Option<String>,
}

impl CatboxUploader {
    pub fn new(
        endpoint: impl Into<String>,
        userhash: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: endpoint.into(),
            userhash,
        })
    }
}

#[async_trait]
impl Uploader for CatboxUploader {
    async fn upload(&self, bytes: Vec<u8>, suffix: &str) -> tagindex::Result<String> {
        let mut form = Form::new().text("reqtype", "fileupload");
        if let Some(userhash) = &self.userhash {
            form = form.text("userhash", userhash.clone());
        }
        let form = form.part(
            "fileToUpload",
            Part::bytes(bytes).file_name(upload_file_name(suffix)),
        );
        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|error| IndexError::UploadFailed(format!("catbox request failed: {error}")))?;
        url_from_response("catbox", response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::tests::paste_host;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn sends_catbox_form() {
        let (addr, mut requests) =
            paste_host("https://files.catbox.test/x1.gif", StatusCode::OK).await;
        let uploader = CatboxUploader::new(
            format!("http://{addr}/"),
            Some("hash123".to_string()),
            Duration::from_secs(5),
        )
        .expect("client");

        let url = uploader.upload(b"gif".to_vec(), ".gif").await.expect("upload");
        assert_eq!(url, "https://files.catbox.test/x1.gif");

        let (auth, body) = requests.recv().await.expect("request");
        assert!(auth.is_none());
        assert!(body.contains("name=\"reqtype\""));
        assert!(body.contains("fileupload"));
        assert!(body.contains("hash123"));
        assert!(body.contains("name=\"fileToUpload\"; filename=\"upload.gif\""));
    }

    #[tokio::test]
    async fn non_url_body_fails() {
        let (addr, _requests) = paste_host("Internal error", StatusCode::OK).await;
        let uploader = CatboxUploader::new(format!("http://{addr}/"), None, Duration::from_secs(5))
            .expect("client");
        let error = uploader.upload(b"x".to_vec(), ".jpg").await.expect_err("bad body");
        assert!(matches!(error, IndexError::UploadFailed(_)));
    }
}
