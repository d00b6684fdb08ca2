//! Structured field extraction from free-form text.

mod gemini;

pub use gemini::GeminiExtractor;

use async_trait::async_trait;

use crate::error::ExtractionError;
use crate::pipeline::types::ExtractedFields;

/// Turns free-form text into the three ledger fields.
///
/// One outbound call per invocation, no local state, no retry — retry
/// is the platform redelivery's job, not this client's.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<ExtractedFields, ExtractionError>;
}
