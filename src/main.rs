use std::sync::Arc;

use ledgerhook::channels::{Notifier, WhatsAppClient};
use ledgerhook::config::Config;
use ledgerhook::extract::GeminiExtractor;
use ledgerhook::pipeline::{Dispatcher, MediaIngest};
use ledgerhook::store::{BlobStore, DriveStore, SheetsSink};
use ledgerhook::webhook::webhook_routes;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    eprintln!("📒 Ledgerhook v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Webhook: http://0.0.0.0:{}/webhook", config.port);
    eprintln!("   Model: {}", config.gemini_model);
    eprintln!("   Sheet: {} ({})", config.sheet_id, config.sheet_range);
    eprintln!(
        "   Senders: {}",
        if config.allowed_senders.iter().any(|s| s == "*") {
            "everyone".to_string()
        } else if config.allowed_senders.is_empty() {
            "none (deny all)".to_string()
        } else {
            config.allowed_senders.join(", ")
        }
    );

    // One pooled HTTP client with the configured timeout; every
    // integration gets a cheap clone of it.
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;

    // ── Platform client ──────────────────────────────────────────────────
    let whatsapp = Arc::new(WhatsAppClient::new(
        http.clone(),
        config.whatsapp_access_token.clone(),
        config.whatsapp_phone_number_id.clone(),
    ));

    // ── Extraction ───────────────────────────────────────────────────────
    let extractor = Arc::new(GeminiExtractor::new(
        http.clone(),
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
    ));

    // ── Storage ──────────────────────────────────────────────────────────
    let sink = Arc::new(SheetsSink::new(
        http.clone(),
        config.google_access_token.clone(),
        config.sheet_id.clone(),
        config.sheet_range.clone(),
    ));
    let blobs: Arc<dyn BlobStore> = Arc::new(DriveStore::new(
        http.clone(),
        config.google_access_token.clone(),
        config.drive_folder_id.clone(),
    ));
    let media = Arc::new(MediaIngest::new(Arc::clone(&whatsapp), blobs));

    // ── Dispatcher ───────────────────────────────────────────────────────
    let mut dispatcher = Dispatcher::new(
        config.app_secret.clone(),
        config.allowed_senders.clone(),
        extractor,
        media,
        sink,
    );
    if whatsapp.can_send() {
        eprintln!("   Replies: enabled\n");
        dispatcher = dispatcher.with_notifier(Arc::clone(&whatsapp) as Arc<dyn Notifier>);
    } else {
        eprintln!("   Replies: disabled (no sending phone number)\n");
    }

    let app = webhook_routes(Arc::new(dispatcher), config.verify_token.clone());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "Webhook server started");
    axum::serve(listener, app).await?;

    Ok(())
}
