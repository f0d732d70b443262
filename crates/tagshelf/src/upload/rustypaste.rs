use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use tagindex::{IndexError, Uploader};

use super::{http_client, upload_file_name, url_from_response};
use crate::error::ConfigError;

/// Uploads to a rustypaste server as a multipart `file` field.
#[derive(Debug, Clone)]
pub struct RustypasteUploader {
    client: reqwest::Client,
    url: String,
    auth: Option<String>,
}

impl RustypasteUploader {
    pub fn new(url: String, auth: Option<String>, timeout: Duration) -> Result<Self, ConfigError> {
        Ok(Self {
            client: http_client(timeout)?,
            url,
            auth,
        })
    }
}

#[async_trait]
impl Uploader for RustypasteUploader {
    async fn upload(&self, bytes: Vec<u8>, suffix: &str) -> tagindex::Result<String> {
        let form = Form::new().part("file", Part::bytes(bytes).file_name(upload_file_name(suffix)));
        let mut request = self.client.post(&self.url).multipart(form);
        if let Some(auth) = &self.auth {
            request = request.header(AUTHORIZATION, auth);
        }
        let response = request.send().await.map_err(|error| {
            IndexError::UploadFailed(format!("rustypaste request failed: {error}"))
        })?;
        url_from_response("rustypaste", response).await
    }
}
