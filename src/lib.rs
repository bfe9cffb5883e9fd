//! Session log ingestion, storage, and search.
//!
//! Extracts AI coding-assistant session logs (append-only JSONL files) into
//! a local SQLite store with full-text search, thread reconstruction, and a
//! lightweight relationship graph over sessions, topics, and projects.

pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod hook;
pub mod source;
pub mod store;
pub mod sync;
pub mod topics;

pub use config::Config;
pub use error::{Error, Result};
pub use store::Store;
