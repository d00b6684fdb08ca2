//! Webhook edge: signature verification, envelope parsing, HTTP routes.

pub mod event;
pub mod routes;
pub mod signature;

pub use event::parse_event;
pub use routes::webhook_routes;
pub use signature::{SIGNATURE_HEADER, verify_signature};
