//! Error types for ledgerhook.

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Notify error: {0}")]
    Notify(#[from] NotifyError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Envelope decoding errors. Every kind is acknowledged to the platform
/// with a success status so a bad payload cannot trigger a redelivery storm.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Unrecognized payload type: {message_type}")]
    UnrecognizedPayload { message_type: String },

    #[error("Delivery carries no message entries")]
    NoMessage,
}

/// Errors from the AI extraction call. All of them degrade the record
/// rather than failing the event.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Extraction request failed: {0}")]
    RequestFailed(String),

    #[error("Malformed extraction response: {0}")]
    MalformedResponse(String),

    #[error("Non-numeric amount in extraction response: {0}")]
    InvalidAmount(String),
}

/// Errors from the media fetch-and-store path. Terminal for the event;
/// the platform is told to redeliver.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Media download failed: {0}")]
    DownloadFailed(String),

    #[error("Media upload failed: {0}")]
    UploadFailed(String),
}

/// Tabular store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Row append failed: {0}")]
    AppendFailed(String),

    #[error("Tabular store rejected the append: status {status}: {message}")]
    Rejected { status: u16, message: String },
}

/// Reply delivery errors. Never affect the dispatch outcome.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to send reply to {recipient}: {reason}")]
    SendFailed { recipient: String, reason: String },
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
