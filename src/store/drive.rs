//! Google Drive uploads.
//!
//! Drive's multipart upload wants `multipart/related` with a JSON
//! metadata part followed by the media part. reqwest's multipart
//! support only produces `multipart/form-data`, so the body is
//! assembled by hand around a generated boundary. After the upload the
//! file gets an anyone-with-link read permission; the returned
//! webViewLink is only a durable reference if others can open it.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::MediaError;
use crate::store::BlobStore;

const DRIVE_BASE_URL: &str = "https://www.googleapis.com";

/// Blob store targeting one Drive folder.
pub struct DriveStore {
    client: reqwest::Client,
    access_token: SecretString,
    folder_id: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    #[serde(rename = "webViewLink")]
    web_view_link: String,
}

impl DriveStore {
    pub fn new(
        client: reqwest::Client,
        access_token: SecretString,
        folder_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            access_token,
            folder_id: folder_id.into(),
            base_url: DRIVE_BASE_URL.to_string(),
        }
    }

    /// Point the store at a different host. Used by tests to target a
    /// local stub server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/drive/v3/files", self.base_url)
    }

    fn permissions_url(&self, file_id: &str) -> String {
        format!("{}/drive/v3/files/{file_id}/permissions", self.base_url)
    }

    fn multipart_body(
        metadata: &serde_json::Value,
        mime_type: &str,
        bytes: &[u8],
        boundary: &str,
    ) -> Vec<u8> {
        let mut body = Vec::with_capacity(bytes.len() + 512);
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!("--{boundary}\r\nContent-Type: {mime_type}\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        body
    }

    async fn grant_link_read(&self, file_id: &str) -> Result<(), MediaError> {
        let response = self
            .client
            .post(self.permissions_url(file_id))
            .bearer_auth(self.access_token.expose_secret())
            .json(&serde_json::json!({ "type": "anyone", "role": "reader" }))
            .send()
            .await
            .map_err(|e| MediaError::UploadFailed(format!("permission grant: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::UploadFailed(format!(
                "permission grant returned {status}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for DriveStore {
    async fn upload(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, MediaError> {
        let metadata = serde_json::json!({
            "name": file_name,
            "parents": [self.folder_id]
        });
        let boundary = format!("ledgerhook-{}", Uuid::new_v4());
        let body = Self::multipart_body(&metadata, mime_type, &bytes, &boundary);

        let response = self
            .client
            .post(self.upload_url())
            .query(&[("uploadType", "multipart"), ("fields", "id,webViewLink")])
            .bearer_auth(self.access_token.expose_secret())
            .header(
                "Content-Type",
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| MediaError::UploadFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(MediaError::UploadFailed(format!(
                "upload returned {status}: {detail}"
            )));
        }

        let file: DriveFile = response
            .json()
            .await
            .map_err(|e| MediaError::UploadFailed(format!("upload body: {e}")))?;
        self.grant_link_read(&file.id).await?;
        Ok(file.web_view_link)
    }
}
