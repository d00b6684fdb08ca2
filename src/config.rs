//! Service configuration.
//!
//! Everything is read from the environment once at startup and passed
//! into components by value. Nothing in the crate reaches for ambient
//! env vars after boot, which keeps every component constructible with
//! fake configuration in tests.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_SHEET_RANGE: &str = "Sheet1!A1";

/// Service configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the webhook listener binds on.
    pub port: u16,
    /// Timeout applied to every outbound HTTP client.
    pub http_timeout: Duration,
    /// Token echoed back during the platform's subscription handshake.
    pub verify_token: SecretString,
    /// App secret the platform signs delivery bodies with.
    pub app_secret: SecretString,
    /// Graph API bearer token (media lookup, download, replies).
    pub whatsapp_access_token: SecretString,
    /// Sending phone number id. Unset disables confirmation replies.
    pub whatsapp_phone_number_id: Option<String>,
    /// Sender ids allowed to log entries. `*` allows everyone.
    pub allowed_senders: Vec<String>,
    /// Gemini API key for field extraction.
    pub gemini_api_key: SecretString,
    /// Gemini model name.
    pub gemini_model: String,
    /// OAuth2 access token for the Sheets and Drive APIs, supplied by
    /// the deployment environment (workload identity or a token
    /// refresher in front of the process).
    pub google_access_token: SecretString,
    /// Spreadsheet that receives one row per event.
    pub sheet_id: String,
    /// A1-notation range the append targets.
    pub sheet_range: String,
    /// Drive folder that receives media uploads.
    pub drive_folder_id: String,
}

impl Config {
    /// Build config from environment variables. Missing required vars
    /// name the variable; invalid optional vars fail rather than
    /// silently falling back.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = parsed_or("LEDGERHOOK_PORT", DEFAULT_PORT)?;
        let timeout_secs = parsed_or("LEDGERHOOK_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;

        let allowed_senders: Vec<String> = std::env::var("WHATSAPP_ALLOWED_SENDERS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            port,
            http_timeout: Duration::from_secs(timeout_secs),
            verify_token: SecretString::from(required("WHATSAPP_VERIFY_TOKEN")?),
            app_secret: SecretString::from(required("WHATSAPP_APP_SECRET")?),
            whatsapp_access_token: SecretString::from(required("WHATSAPP_ACCESS_TOKEN")?),
            whatsapp_phone_number_id: std::env::var("WHATSAPP_PHONE_NUMBER_ID")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            allowed_senders,
            gemini_api_key: SecretString::from(required("GEMINI_API_KEY")?),
            gemini_model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string()),
            google_access_token: SecretString::from(required("GOOGLE_ACCESS_TOKEN")?),
            sheet_id: required("GOOGLE_SHEET_ID")?,
            sheet_range: std::env::var("GOOGLE_SHEET_RANGE")
                .unwrap_or_else(|_| DEFAULT_SHEET_RANGE.to_string()),
            drive_folder_id: required("GOOGLE_DRIVE_FOLDER_ID")?,
        })
    }
}

fn required(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Parses an optional env var, defaulting when absent but refusing a
/// value that is present and unparseable.
fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("cannot parse {raw:?}"),
        }),
        Err(_) => Ok(default),
    }
}
