//! Integration tests for the webhook HTTP contract.
//!
//! Each test spins up an Axum server on a random port with stub
//! collaborators behind the dispatcher, then exercises the real
//! GET/POST surface exactly the way the platform does.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;
use serde_json::{Value, json};
use sha2::Sha256;
use tokio::net::TcpListener;
use tokio::time::timeout;

use ledgerhook::error::{ExtractionError, MediaError, StoreError};
use ledgerhook::extract::Extractor;
use ledgerhook::pipeline::types::{ExtractedFields, MediaPayload, Record, StoredMediaRef};
use ledgerhook::pipeline::{Dispatcher, MediaClient};
use ledgerhook::store::RecordSink;
use ledgerhook::webhook::webhook_routes;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const APP_SECRET: &str = "integration-app-secret";
const VERIFY_TOKEN: &str = "integration-verify-token";

// ── Stub collaborators ───────────────────────────────────────────────

/// Which stubs should fail. Default: everything succeeds.
#[derive(Clone, Copy, Default)]
struct StubBehavior {
    extractor_fails: bool,
    media_fails: bool,
}

/// Stub extractor for integration tests (no real API calls).
struct StubExtractor {
    fails: bool,
}

#[async_trait]
impl Extractor for StubExtractor {
    async fn extract(&self, _text: &str) -> Result<ExtractedFields, ExtractionError> {
        if self.fails {
            return Err(ExtractionError::MalformedResponse("stub refusal".into()));
        }
        Ok(ExtractedFields {
            concept: "Coffee".into(),
            amount: dec!(4.50),
            category: "Food".into(),
        })
    }
}

/// Stub media pipeline (no real downloads or uploads).
struct StubMedia {
    fails: bool,
}

#[async_trait]
impl MediaClient for StubMedia {
    async fn fetch_and_store(
        &self,
        payload: &MediaPayload,
    ) -> Result<StoredMediaRef, MediaError> {
        if self.fails {
            return Err(MediaError::DownloadFailed("stub outage".into()));
        }
        Ok(StoredMediaRef {
            external_url: format!("https://drive.example/view/{}", payload.media_ref),
            content_hash: None,
        })
    }
}

/// Recording sink: appended records land in a Vec the test can inspect.
#[derive(Default)]
struct StubSink {
    rows: Mutex<Vec<Record>>,
}

impl StubSink {
    fn rows(&self) -> Vec<Record> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSink for StubSink {
    async fn append(&self, record: &Record) -> Result<(), StoreError> {
        self.rows.lock().unwrap().push(record.clone());
        Ok(())
    }
}

// ── Server setup ─────────────────────────────────────────────────────

/// Start an Axum server on a random port, return (port, sink).
async fn start_server(behavior: StubBehavior) -> (u16, Arc<StubSink>) {
    let sink = Arc::new(StubSink::default());
    let dispatcher = Dispatcher::new(
        SecretString::from(APP_SECRET),
        vec!["*".to_string()],
        Arc::new(StubExtractor { fails: behavior.extractor_fails }),
        Arc::new(StubMedia { fails: behavior.media_fails }),
        Arc::clone(&sink) as Arc<dyn RecordSink>,
    );
    let app = webhook_routes(Arc::new(dispatcher), SecretString::from(VERIFY_TOKEN));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (port, sink)
}

/// Helper: sign a body the way the platform does.
fn sign(body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(APP_SECRET.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Helper: one-message platform envelope with a text body.
fn text_envelope(text: &str) -> Vec<u8> {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "changes": [{
                "field": "messages",
                "value": {
                    "messages": [{
                        "from": "15551234567",
                        "id": "wamid.integration-text",
                        "timestamp": "1712512800",
                        "type": "text",
                        "text": { "body": text }
                    }]
                }
            }]
        }]
    })
    .to_string()
    .into_bytes()
}

/// Helper: one-message platform envelope with an image.
fn media_envelope() -> Vec<u8> {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "changes": [{
                "field": "messages",
                "value": {
                    "messages": [{
                        "from": "15551234567",
                        "id": "wamid.integration-media",
                        "timestamp": "1712512800",
                        "type": "image",
                        "image": { "id": "media-789", "mime_type": "image/jpeg" }
                    }]
                }
            }]
        }]
    })
    .to_string()
    .into_bytes()
}

/// Helper: delivery receipt envelope (statuses, no messages).
fn status_envelope() -> Vec<u8> {
    json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "changes": [{
                "field": "messages",
                "value": {
                    "statuses": [{ "id": "wamid.x", "status": "delivered" }]
                }
            }]
        }]
    })
    .to_string()
    .into_bytes()
}

async fn post_event(port: u16, body: Vec<u8>, signature: Option<String>) -> reqwest::Response {
    let client = reqwest::Client::new();
    let mut request = client
        .post(format!("http://127.0.0.1:{port}/webhook"))
        .body(body);
    if let Some(signature) = signature {
        request = request.header("x-hub-signature-256", signature);
    }
    request.send().await.unwrap()
}

// ── Handshake Tests ──────────────────────────────────────────────────

#[tokio::test]
async fn handshake_echoes_challenge() {
    timeout(TEST_TIMEOUT, async {
        let (port, _sink) = start_server(StubBehavior::default()).await;

        let resp = reqwest::get(format!(
            "http://127.0.0.1:{port}/webhook?hub.mode=subscribe&hub.verify_token={VERIFY_TOKEN}&hub.challenge=1158201444"
        ))
        .await
        .unwrap();

        assert_eq!(resp.status(), 200);
        assert_eq!(resp.text().await.unwrap(), "1158201444");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn handshake_echoes_empty_challenge() {
    timeout(TEST_TIMEOUT, async {
        let (port, _sink) = start_server(StubBehavior::default()).await;

        let resp = reqwest::get(format!(
            "http://127.0.0.1:{port}/webhook?hub.mode=subscribe&hub.verify_token={VERIFY_TOKEN}&hub.challenge="
        ))
        .await
        .unwrap();

        assert_eq!(resp.status(), 200);
        assert_eq!(resp.text().await.unwrap(), "");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn handshake_rejects_wrong_token() {
    timeout(TEST_TIMEOUT, async {
        let (port, _sink) = start_server(StubBehavior::default()).await;

        let resp = reqwest::get(format!(
            "http://127.0.0.1:{port}/webhook?hub.mode=subscribe&hub.verify_token=guessed&hub.challenge=42"
        ))
        .await
        .unwrap();

        assert_eq!(resp.status(), 403);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn handshake_rejects_wrong_mode() {
    timeout(TEST_TIMEOUT, async {
        let (port, _sink) = start_server(StubBehavior::default()).await;

        let resp = reqwest::get(format!(
            "http://127.0.0.1:{port}/webhook?hub.mode=unsubscribe&hub.verify_token={VERIFY_TOKEN}&hub.challenge=42"
        ))
        .await
        .unwrap();

        assert_eq!(resp.status(), 403);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn handshake_rejects_missing_params() {
    timeout(TEST_TIMEOUT, async {
        let (port, _sink) = start_server(StubBehavior::default()).await;

        let resp = reqwest::get(format!(
            "http://127.0.0.1:{port}/webhook?hub.mode=subscribe"
        ))
        .await
        .unwrap();

        assert_eq!(resp.status(), 403);
    })
    .await
    .expect("test timed out");
}

// ── Event Tests ──────────────────────────────────────────────────────

#[tokio::test]
async fn signed_text_event_is_persisted() {
    timeout(TEST_TIMEOUT, async {
        let (port, sink) = start_server(StubBehavior::default()).await;

        let body = text_envelope("Coffee 4.50");
        let signature = sign(&body);
        let resp = post_event(port, body, Some(signature)).await;

        assert_eq!(resp.status(), 200);
        let json: Value = resp.json().await.unwrap();
        assert_eq!(json["status"], "ok");

        let rows = sink.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].concept, "Coffee");
        assert_eq!(rows[0].amount, dec!(4.50));
        assert_eq!(rows[0].category, "Food");
        assert_eq!(rows[0].media_url, None);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unsigned_event_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let (port, sink) = start_server(StubBehavior::default()).await;

        let resp = post_event(port, text_envelope("Coffee 4.50"), None).await;

        assert_eq!(resp.status(), 401);
        assert!(sink.rows().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn tampered_body_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let (port, sink) = start_server(StubBehavior::default()).await;

        let signature = sign(&text_envelope("Coffee 4.50"));
        let resp = post_event(port, text_envelope("Coffee 999.00"), Some(signature)).await;

        assert_eq!(resp.status(), 401);
        assert!(sink.rows().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn extraction_outage_still_returns_200() {
    timeout(TEST_TIMEOUT, async {
        let behavior = StubBehavior { extractor_fails: true, ..Default::default() };
        let (port, sink) = start_server(behavior).await;

        let body = text_envelope("spent some money on things");
        let signature = sign(&body);
        let resp = post_event(port, body, Some(signature)).await;

        // Degraded, not failed: the raw text survives as the concept.
        assert_eq!(resp.status(), 200);
        let rows = sink.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].concept, "spent some money on things");
        assert_eq!(rows[0].amount, Decimal::ZERO);
        assert_eq!(rows[0].category, "");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn media_event_is_stored_and_persisted() {
    timeout(TEST_TIMEOUT, async {
        let (port, sink) = start_server(StubBehavior::default()).await;

        let body = media_envelope();
        let signature = sign(&body);
        let resp = post_event(port, body, Some(signature)).await;

        assert_eq!(resp.status(), 200);
        let rows = sink.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].media_url,
            Some("https://drive.example/view/media-789".to_string())
        );
        assert_eq!(rows[0].concept, "");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn media_outage_returns_500_for_redelivery() {
    timeout(TEST_TIMEOUT, async {
        let behavior = StubBehavior { media_fails: true, ..Default::default() };
        let (port, sink) = start_server(behavior).await;

        let body = media_envelope();
        let signature = sign(&body);
        let resp = post_event(port, body, Some(signature)).await;

        assert_eq!(resp.status(), 500);
        assert!(sink.rows().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn status_ping_is_acknowledged() {
    timeout(TEST_TIMEOUT, async {
        let (port, sink) = start_server(StubBehavior::default()).await;

        let body = status_envelope();
        let signature = sign(&body);
        let resp = post_event(port, body, Some(signature)).await;

        assert_eq!(resp.status(), 200);
        assert!(sink.rows().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn redelivered_event_appends_twice() {
    timeout(TEST_TIMEOUT, async {
        let (port, sink) = start_server(StubBehavior::default()).await;

        let body = text_envelope("Coffee 4.50");
        let signature = sign(&body);

        let first = post_event(port, body.clone(), Some(signature.clone())).await;
        let second = post_event(port, body, Some(signature)).await;

        assert_eq!(first.status(), 200);
        assert_eq!(second.status(), 200);
        assert_eq!(sink.rows().len(), 2);
    })
    .await
    .expect("test timed out");
}

// ── Health ───────────────────────────────────────────────────────────

#[tokio::test]
async fn health_endpoint_reports_ok() {
    timeout(TEST_TIMEOUT, async {
        let (port, _sink) = start_server(StubBehavior::default()).await;

        let resp = reqwest::get(format!("http://127.0.0.1:{port}/health"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "ledgerhook");
    })
    .await
    .expect("test timed out");
}
