//! Platform envelope decoding.
//!
//! Cloud API deliveries nest the interesting part four levels deep:
//! `entry[].changes[].value.messages[]`. Decoding is strict about the
//! wrapper (a wrong `object` is rejected) and tolerant about the rest:
//! collections default to empty, so status receipts, which share the
//! envelope shape but carry no messages, fall out as
//! [`ParseError::NoMessage`] instead of tripping the malformed path.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::ParseError;
use crate::pipeline::types::{EventPayload, MediaPayload, NormalizedEvent, TextPayload};

const EXPECTED_OBJECT: &str = "whatsapp_business_account";

#[derive(Debug, Deserialize)]
struct Envelope {
    object: String,
    #[serde(default)]
    entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
struct Change {
    #[serde(default)]
    value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
struct ChangeValue {
    #[serde(default)]
    messages: Vec<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    from: String,
    id: String,
    #[serde(default)]
    timestamp: String,
    #[serde(rename = "type", default)]
    kind: String,
    text: Option<TextBody>,
    image: Option<MediaBody>,
    document: Option<MediaBody>,
}

#[derive(Debug, Deserialize)]
struct TextBody {
    body: String,
}

#[derive(Debug, Deserialize)]
struct MediaBody {
    id: String,
    mime_type: String,
}

/// Decodes a raw delivery body into a [`NormalizedEvent`].
///
/// Takes the first message entry across all changes; the platform
/// batches at most a handful per delivery and each redelivery repeats
/// the batch whole. The envelope timestamp is unix seconds as a string;
/// an unusable value falls back to the arrival wall clock.
pub fn parse_event(raw_body: &[u8]) -> Result<NormalizedEvent, ParseError> {
    let envelope: Envelope = serde_json::from_slice(raw_body)
        .map_err(|e| ParseError::MalformedEnvelope(e.to_string()))?;

    if envelope.object != EXPECTED_OBJECT {
        return Err(ParseError::MalformedEnvelope(format!(
            "unexpected object field: {}",
            envelope.object
        )));
    }

    let message = envelope
        .entry
        .into_iter()
        .flat_map(|entry| entry.changes)
        .flat_map(|change| change.value.messages)
        .next()
        .ok_or(ParseError::NoMessage)?;

    let payload = classify(&message)?;
    let received_at = parse_timestamp(&message.timestamp).unwrap_or_else(Utc::now);

    Ok(NormalizedEvent {
        event_id: message.id,
        sender_id: message.from,
        received_at,
        payload,
    })
}

/// Presence-based classification: a text body wins, then the media
/// object kinds the pipeline stores. Anything else is unrecognized.
fn classify(message: &IncomingMessage) -> Result<EventPayload, ParseError> {
    if let Some(text) = &message.text {
        return Ok(EventPayload::Text(TextPayload {
            text: text.body.clone(),
        }));
    }
    if let Some(media) = message.image.as_ref().or(message.document.as_ref()) {
        return Ok(EventPayload::Media(MediaPayload {
            media_ref: media.id.clone(),
            mime_type: media.mime_type.clone(),
        }));
    }
    Err(ParseError::UnrecognizedPayload {
        message_type: if message.kind.is_empty() {
            "unknown".to_string()
        } else {
            message.kind.clone()
        },
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let seconds = raw.parse::<i64>().ok()?;
    DateTime::from_timestamp(seconds, 0)
}
