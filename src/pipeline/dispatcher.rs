//! Dispatcher — drives one delivery from raw bytes to a terminal state.
//!
//! **Core invariant: nothing propagates past the dispatcher.** Every
//! collaborator failure is folded into a terminal [`DispatchOutcome`]
//! that the HTTP layer maps to a status code. The platform's redelivery
//! is the only retry mechanism anywhere in the pipeline.
//!
//! Flow:
//! 1. Signature check on the raw bytes (reject, nothing else runs)
//! 2. Envelope parse → normalized event (unparseable → acknowledge)
//! 3. Sender allowlist
//! 4. Route by payload: text → extraction, media → fetch-and-store
//! 5. Append the record, then an optional confirmation reply

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, info, warn};

use crate::channels::Notifier;
use crate::error::ParseError;
use crate::extract::Extractor;
use crate::pipeline::media::MediaClient;
use crate::pipeline::types::{
    DispatchOutcome, EventPayload, ExtractedFields, FailureStage, Record,
};
use crate::store::RecordSink;
use crate::webhook::event::parse_event;
use crate::webhook::signature::verify_signature;

/// Reply sent to senders missing from the allowlist.
const NOT_AUTHORIZED_REPLY: &str = "This number is not authorized to log entries.";

/// Orchestrates verification, parsing, routing, and persistence for
/// one delivery at a time. Shared across requests behind an `Arc`;
/// holds no per-delivery state.
pub struct Dispatcher {
    app_secret: SecretString,
    allowed_senders: Vec<String>,
    extractor: Arc<dyn Extractor>,
    media: Arc<dyn MediaClient>,
    sink: Arc<dyn RecordSink>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new(
        app_secret: SecretString,
        allowed_senders: Vec<String>,
        extractor: Arc<dyn Extractor>,
        media: Arc<dyn MediaClient>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            app_secret,
            allowed_senders,
            extractor,
            media,
            sink,
            notifier: None,
        }
    }

    /// Attach a reply channel. Without one, dispatch runs reply-free.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Run one delivery to a terminal state. Total: never panics,
    /// never returns an error.
    pub async fn dispatch(
        &self,
        raw_body: &[u8],
        signature_header: Option<&str>,
    ) -> DispatchOutcome {
        if !verify_signature(
            raw_body,
            signature_header,
            self.app_secret.expose_secret().as_bytes(),
        ) {
            warn!("Rejected delivery with bad or missing signature");
            return DispatchOutcome::Rejected;
        }

        let event = match parse_event(raw_body) {
            Ok(event) => event,
            Err(ParseError::NoMessage) => {
                debug!("Acknowledged delivery without message entries");
                return DispatchOutcome::Ignored {
                    reason: "no message entries".into(),
                };
            }
            Err(e) => {
                warn!(error = %e, "Acknowledged unparseable delivery");
                return DispatchOutcome::Ignored {
                    reason: e.to_string(),
                };
            }
        };

        info!(
            event_id = %event.event_id,
            sender = %event.sender_id,
            payload = event.payload.label(),
            "Dispatching event"
        );

        if !sender_allowed(&self.allowed_senders, &event.sender_id) {
            warn!(sender = %event.sender_id, "Ignored event from disallowed sender");
            self.try_notify(&event.sender_id, NOT_AUTHORIZED_REPLY).await;
            return DispatchOutcome::Ignored {
                reason: format!("sender {} not allowed", event.sender_id),
            };
        }

        let (fields, media_url, degraded) = match &event.payload {
            EventPayload::Text(text) => match self.extractor.extract(&text.text).await {
                Ok(fields) => (fields, None, false),
                Err(e) => {
                    // Degrade rather than drop: the raw text survives as
                    // the concept, amount and category stay at sentinels.
                    warn!(
                        event_id = %event.event_id,
                        error = %e,
                        "Extraction failed; persisting degraded record"
                    );
                    let fields = ExtractedFields {
                        concept: text.text.clone(),
                        ..ExtractedFields::empty()
                    };
                    (fields, None, true)
                }
            },
            EventPayload::Media(media) => match self.media.fetch_and_store(media).await {
                Ok(stored) => (ExtractedFields::empty(), Some(stored.external_url), false),
                Err(e) => {
                    // Media is the whole content here. No record without
                    // it; a failure status makes the platform redeliver.
                    error!(
                        event_id = %event.event_id,
                        media_ref = %media.media_ref,
                        error = %e,
                        "Media pipeline failed"
                    );
                    return DispatchOutcome::Failed {
                        stage: FailureStage::Media,
                        reason: e.to_string(),
                    };
                }
            },
        };

        let record = Record {
            timestamp: event.received_at,
            sender_id: event.sender_id.clone(),
            concept: fields.concept,
            amount: fields.amount,
            category: fields.category,
            media_url,
        };

        if let Err(e) = self.sink.append(&record).await {
            error!(
                event_id = %event.event_id,
                error = %e,
                "Record append failed"
            );
            return DispatchOutcome::Failed {
                stage: FailureStage::Store,
                reason: e.to_string(),
            };
        }

        self.try_notify(&event.sender_id, &confirmation_text(&record))
            .await;

        info!(event_id = %event.event_id, degraded, "Event persisted");
        DispatchOutcome::Persisted { record, degraded }
    }

    async fn try_notify(&self, recipient: &str, text: &str) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        if let Err(e) = notifier.notify(recipient, text).await {
            warn!(error = %e, "Reply delivery failed");
        }
    }
}

/// `*` allows everyone; otherwise exact sender id match. An empty list
/// denies all.
fn sender_allowed(allowed: &[String], sender: &str) -> bool {
    allowed.iter().any(|entry| entry == "*" || entry == sender)
}

/// One-line receipt for the sender. Degraded records use the same
/// template; the user sees missing values, not an error message.
fn confirmation_text(record: &Record) -> String {
    match &record.media_url {
        Some(url) => format!("Media stored: {url}"),
        None => format!("Logged \"{}\" for {}.", record.concept, record.amount),
    }
}
