//! Google Sheets row append.
//!
//! One logical row per call against the `values:append` endpoint.
//! `USER_ENTERED` lets the sheet coerce the decimal string into a
//! number cell. Auth is an OAuth2 bearer token supplied by the
//! deployment environment.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::StoreError;
use crate::pipeline::types::Record;
use crate::store::RecordSink;

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";

/// Row sink targeting one spreadsheet range.
pub struct SheetsSink {
    client: reqwest::Client,
    access_token: SecretString,
    sheet_id: String,
    range: String,
    base_url: String,
}

impl SheetsSink {
    pub fn new(
        client: reqwest::Client,
        access_token: SecretString,
        sheet_id: impl Into<String>,
        range: impl Into<String>,
    ) -> Self {
        Self {
            client,
            access_token,
            sheet_id: sheet_id.into(),
            range: range.into(),
            base_url: SHEETS_BASE_URL.to_string(),
        }
    }

    /// Point the sink at a different host. Used by tests to target a
    /// local stub server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn append_url(&self) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}:append",
            self.base_url, self.sheet_id, self.range
        )
    }
}

#[async_trait]
impl RecordSink for SheetsSink {
    async fn append(&self, record: &Record) -> Result<(), StoreError> {
        let body = serde_json::json!({ "values": [record.to_row()] });

        let response = self
            .client
            .post(self.append_url())
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .bearer_auth(self.access_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::AppendFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}
