//! WhatsApp Cloud API client — media retrieval and replies.
//!
//! Media download is a two-step exchange: resolve the media id to a
//! short-lived CDN URL via the Graph API, then fetch the bytes from
//! that URL. Both calls carry the bearer token; the CDN rejects
//! anonymous fetches even though the URL looks self-contained.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::channels::Notifier;
use crate::error::{MediaError, NotifyError};

const GRAPH_BASE_URL: &str = "https://graph.facebook.com";
const GRAPH_API_VERSION: &str = "v20.0";

/// Graph API client for one WhatsApp Business number.
pub struct WhatsAppClient {
    client: reqwest::Client,
    access_token: SecretString,
    phone_number_id: Option<String>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct MediaLookup {
    url: String,
}

impl WhatsAppClient {
    pub fn new(
        client: reqwest::Client,
        access_token: SecretString,
        phone_number_id: Option<String>,
    ) -> Self {
        Self {
            client,
            access_token,
            phone_number_id,
            base_url: GRAPH_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different host. Used by tests to target a
    /// local stub server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Whether this client has a sending identity.
    pub fn can_send(&self) -> bool {
        self.phone_number_id.is_some()
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{GRAPH_API_VERSION}/{path}", self.base_url)
    }

    /// Resolve a media id to its download URL.
    pub async fn media_url(&self, media_ref: &str) -> Result<String, MediaError> {
        let response = self
            .client
            .get(self.api_url(media_ref))
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| MediaError::DownloadFailed(format!("media lookup: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::DownloadFailed(format!(
                "media lookup returned {status}"
            )));
        }

        let lookup: MediaLookup = response
            .json()
            .await
            .map_err(|e| MediaError::DownloadFailed(format!("media lookup body: {e}")))?;
        Ok(lookup.url)
    }

    /// Fetch media bytes. The URL comes from [`Self::media_url`] and
    /// expires after a few minutes, so callers chain the two.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, MediaError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| MediaError::DownloadFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::DownloadFailed(format!(
                "download returned {status}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| MediaError::DownloadFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    /// Send a plain text message to a user.
    pub async fn send_text(&self, to: &str, body: &str) -> Result<(), NotifyError> {
        let Some(phone_number_id) = &self.phone_number_id else {
            return Err(NotifyError::SendFailed {
                recipient: to.to_string(),
                reason: "no sending phone number configured".into(),
            });
        };

        let payload = serde_json::json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": body }
        });

        let response = self
            .client
            .post(self.api_url(&format!("{phone_number_id}/messages")))
            .bearer_auth(self.access_token.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::SendFailed {
                recipient: to.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(NotifyError::SendFailed {
                recipient: to.to_string(),
                reason: format!("status {status}: {detail}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WhatsAppClient {
    async fn notify(&self, recipient: &str, text: &str) -> Result<(), NotifyError> {
        self.send_text(recipient, text).await
    }
}
