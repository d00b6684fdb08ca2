//! Ledgerhook — webhook-to-ledger ingestion service.

pub mod channels;
pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod store;
pub mod webhook;
