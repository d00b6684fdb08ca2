//! Persistence layer — Sheets-backed row store and Drive-backed blob store.

pub mod drive;
pub mod sheets;

pub use drive::DriveStore;
pub use sheets::SheetsSink;

use async_trait::async_trait;

use crate::error::{MediaError, StoreError};
use crate::pipeline::types::Record;

/// Append-only row store. At-least-once: a redelivered event appends a
/// duplicate row, and nothing here tries to detect that.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Append one record as one row, columns in fixed Record order.
    async fn append(&self, record: &Record) -> Result<(), StoreError>;
}

/// Binary object store. Uploads land in a configured folder and come
/// back as a shareable URL usable outside the pipeline.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `file_name`, returning the durable URL.
    async fn upload(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, MediaError>;
}
