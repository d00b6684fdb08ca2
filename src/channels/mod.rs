//! Outbound messaging-platform clients.

pub mod whatsapp;

pub use whatsapp::WhatsAppClient;

use async_trait::async_trait;

use crate::error::NotifyError;

/// Sends a short reply to a platform user.
///
/// Wired as an optional collaborator: without a sending identity
/// configured the pipeline runs reply-free. A failed reply is logged
/// and never changes a dispatch outcome.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient: &str, text: &str) -> Result<(), NotifyError>;
}
