//! Gemini-backed extraction.
//!
//! Speaks the REST `generateContent` surface directly: JSON response
//! mode plus a system instruction hold the model to a machine-parseable
//! three-field object. The response is still parsed defensively — a
//! model that wraps its answer in markdown or prose gets one chance at
//! a recoverable object, anything worse is a malformed response, never
//! a guess.

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value, json};

use super::Extractor;
use crate::error::ExtractionError;
use crate::pipeline::types::ExtractedFields;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// System instruction the model answers under. Kept strict: sentinels
/// for unknowns, no invented values, no conversation.
const SYSTEM_INSTRUCTION: &str = "You are a bookkeeping assistant. Extract the expense described in the user's message.\n\n\
     Respond with ONLY a JSON object:\n\
     {\"concept\": \"...\", \"amount\": 0.0, \"category\": \"...\"}\n\n\
     Rules:\n\
     - concept: short description of what was paid for\n\
     - amount: numeric amount without currency symbols\n\
     - category: a single word such as Food, Transport, Housing, Health, Leisure, Other\n\
     - Use \"\" (or 0 for amount) for anything you cannot determine. Never invent values.";

/// Extraction client for the Gemini REST API.
pub struct GeminiExtractor {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl GeminiExtractor {
    pub fn new(client: reqwest::Client, api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            client,
            api_key,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different host. Used by tests to target a
    /// local stub server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl Extractor for GeminiExtractor {
    async fn extract(&self, text: &str) -> Result<ExtractedFields, ExtractionError> {
        let body = json!({
            "system_instruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
            "contents": [{ "role": "user", "parts": [{ "text": text }] }],
            "generationConfig": { "responseMimeType": "application/json" }
        });

        let response = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| ExtractionError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ExtractionError::RequestFailed(format!(
                "status {status}: {detail}"
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ExtractionError::RequestFailed(e.to_string()))?;
        let raw = candidate_text(&payload).ok_or_else(|| {
            ExtractionError::MalformedResponse("no candidate text in response".into())
        })?;
        parse_fields(&raw)
    }
}

/// Concatenated text of the first candidate's parts.
fn candidate_text(payload: &Value) -> Option<String> {
    let parts = payload
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if text.is_empty() { None } else { Some(text) }
}

/// Parse the model's answer into `ExtractedFields`.
///
/// All three keys must be present; a null or empty value means the
/// model declined the field and keeps the sentinel. A missing key is a
/// contract violation, not a sentinel.
fn parse_fields(raw: &str) -> Result<ExtractedFields, ExtractionError> {
    let json_str = extract_json_object(raw);
    let value: Value = serde_json::from_str(&json_str)
        .map_err(|e| ExtractionError::MalformedResponse(format!("JSON parse error: {e}")))?;
    let Some(fields) = value.as_object() else {
        return Err(ExtractionError::MalformedResponse(
            "response is not a JSON object".into(),
        ));
    };

    Ok(ExtractedFields {
        concept: string_field(fields, "concept")?,
        amount: amount_field(fields)?,
        category: string_field(fields, "category")?,
    })
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Result<String, ExtractionError> {
    match fields.get(key) {
        None => Err(ExtractionError::MalformedResponse(format!(
            "missing field: {key}"
        ))),
        Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(other) => Err(ExtractionError::MalformedResponse(format!(
            "field {key} is not a string: {other}"
        ))),
    }
}

fn amount_field(fields: &Map<String, Value>) -> Result<Decimal, ExtractionError> {
    match fields.get("amount") {
        None => Err(ExtractionError::MalformedResponse(
            "missing field: amount".into(),
        )),
        Some(Value::Null) => Ok(Decimal::ZERO),
        Some(Value::Number(n)) => {
            parse_decimal(&n.to_string()).ok_or_else(|| ExtractionError::InvalidAmount(n.to_string()))
        }
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(Decimal::ZERO)
            } else {
                parse_decimal(trimmed).ok_or_else(|| ExtractionError::InvalidAmount(s.clone()))
            }
        }
        Some(other) => Err(ExtractionError::InvalidAmount(other.to_string())),
    }
}

/// Plain decimal first, scientific notation as fallback (serde_json
/// prints very large floats with an exponent).
fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str_exact(raw)
        .ok()
        .or_else(|| Decimal::from_scientific(raw).ok())
}

/// Extract a JSON object from model output (handles markdown wrapping).
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}
