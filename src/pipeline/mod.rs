//! Webhook ingestion pipeline.
//!
//! Every delivery from the messaging platform flows through:
//! 1. `verify_signature()` — HMAC check on the raw bytes
//! 2. `parse_event()` — platform envelope → [`types::NormalizedEvent`]
//! 3. `Dispatcher::dispatch()` — route by payload, persist the record
//!
//! **Every delivery reaches a terminal [`types::DispatchOutcome`].**
//! The HTTP layer only maps outcomes to status codes.

pub mod dispatcher;
pub mod media;
pub mod types;

pub use dispatcher::Dispatcher;
pub use media::{MediaClient, MediaIngest};
