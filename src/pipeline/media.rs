//! Media fetch-and-store.
//!
//! Two halves glued together: the platform side (resolve the media id,
//! download the bytes) and the blob side (upload, shareable link). A
//! failure in either half is terminal for the event; there is no
//! partial record for media that never made it to the store.

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::channels::WhatsAppClient;
use crate::error::MediaError;
use crate::pipeline::types::{MediaPayload, StoredMediaRef};
use crate::store::BlobStore;

/// Moves one platform-held binary into the blob store.
#[async_trait]
pub trait MediaClient: Send + Sync {
    async fn fetch_and_store(&self, payload: &MediaPayload)
    -> Result<StoredMediaRef, MediaError>;
}

/// Production implementation: Graph API fetch, Drive upload.
pub struct MediaIngest {
    platform: Arc<WhatsAppClient>,
    blobs: Arc<dyn BlobStore>,
}

impl MediaIngest {
    pub fn new(platform: Arc<WhatsAppClient>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { platform, blobs }
    }
}

#[async_trait]
impl MediaClient for MediaIngest {
    async fn fetch_and_store(
        &self,
        payload: &MediaPayload,
    ) -> Result<StoredMediaRef, MediaError> {
        let url = self.platform.media_url(&payload.media_ref).await?;
        let bytes = self.platform.download(&url).await?;
        let content_hash = hex::encode(Sha256::digest(&bytes));

        let file_name = object_name(payload);
        let external_url = self
            .blobs
            .upload(&file_name, &payload.mime_type, bytes)
            .await?;

        Ok(StoredMediaRef {
            external_url,
            content_hash: Some(content_hash),
        })
    }
}

/// Deterministic object name: the platform media id plus a mime-derived
/// extension. A redelivered event uploads under the same name, which
/// keeps duplicates recognizable in the folder.
fn object_name(payload: &MediaPayload) -> String {
    match extension_for(&payload.mime_type) {
        Some(ext) => format!("{}.{ext}", payload.media_ref),
        None => payload.media_ref.clone(),
    }
}

fn extension_for(mime_type: &str) -> Option<&'static str> {
    // strip parameters like "; codecs=..."
    let essence = mime_type.split(';').next().unwrap_or(mime_type).trim();
    match essence {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "application/pdf" => Some("pdf"),
        _ => None,
    }
}
