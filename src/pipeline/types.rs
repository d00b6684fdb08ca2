//! Shared types for the webhook dispatch pipeline.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ── Normalized event ────────────────────────────────────────────────

/// One inbound platform delivery, decoded and classified.
///
/// The parser converts the platform envelope into this struct. The
/// dispatcher routes it by payload type and discards it after the
/// record is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Platform message id. Unique per delivery, not globally — the
    /// platform may redeliver the same id.
    pub event_id: String,
    /// Sender identifier (phone number in international format).
    pub sender_id: String,
    /// Platform send time, or arrival time when the envelope timestamp
    /// is unusable.
    pub received_at: DateTime<Utc>,
    /// What the message carries.
    pub payload: EventPayload,
}

/// Payload classification. Exactly one of these per event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    Text(TextPayload),
    Media(MediaPayload),
}

impl EventPayload {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Media(_) => "media",
        }
    }
}

/// Free-form text content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPayload {
    pub text: String,
}

/// A platform-held binary, referenced by id. The bytes live on the
/// platform until the media pipeline fetches them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaPayload {
    /// Platform-internal media handle.
    pub media_ref: String,
    /// As reported by the platform (e.g. "image/jpeg").
    pub mime_type: String,
}

// ── Extraction output ───────────────────────────────────────────────

/// Structured fields pulled out of free-form text by the AI service.
///
/// Fields the model cannot confidently extract stay at their sentinel
/// (empty string, zero amount) — never fabricated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub concept: String,
    pub amount: Decimal,
    pub category: String,
}

impl ExtractedFields {
    /// All-sentinel fields. Used for media records and as the base of
    /// the degraded text record.
    pub fn empty() -> Self {
        Self {
            concept: String::new(),
            amount: Decimal::ZERO,
            category: String::new(),
        }
    }
}

// ── Stored media ────────────────────────────────────────────────────

/// Durable reference to a media object after upload to the blob store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMediaRef {
    /// Shareable URL usable outside the pipeline.
    pub external_url: String,
    /// Lowercase hex SHA-256 of the stored bytes, for dedup audits.
    pub content_hash: Option<String>,
}

// ── Record ──────────────────────────────────────────────────────────

/// The unit of persistence. One record per normalized event, appended
/// to the tabular store and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub timestamp: DateTime<Utc>,
    pub sender_id: String,
    pub concept: String,
    pub amount: Decimal,
    pub category: String,
    pub media_url: Option<String>,
}

impl Record {
    /// Fixed column order for the tabular store. An absent media URL
    /// becomes an empty cell, not a literal "null".
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.timestamp.to_rfc3339(),
            self.sender_id.clone(),
            self.concept.clone(),
            self.amount.to_string(),
            self.category.clone(),
            self.media_url.clone().unwrap_or_default(),
        ]
    }
}

// ── Dispatch outcome ────────────────────────────────────────────────

/// Terminal state of one dispatch run. The HTTP layer maps this to a
/// response status; nothing past the dispatcher ever sees an error.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Signature verification failed. Nothing was parsed or called.
    Rejected,
    /// Acknowledged to the platform but deliberately not persisted
    /// (unparseable envelope, status ping, disallowed sender).
    Ignored { reason: String },
    /// The record reached the tabular store. `degraded` marks records
    /// written with raw text in place of extracted fields.
    Persisted { record: Record, degraded: bool },
    /// Media or store failure. Surfaced as a server error so the
    /// platform redelivers.
    Failed { stage: FailureStage, reason: String },
}

/// Which collaborator a failed dispatch died in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Media,
    Store,
}

impl DispatchOutcome {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Rejected => "rejected",
            Self::Ignored { .. } => "ignored",
            Self::Persisted { degraded: false, .. } => "persisted",
            Self::Persisted { degraded: true, .. } => "persisted_degraded",
            Self::Failed { .. } => "failed",
        }
    }
}
