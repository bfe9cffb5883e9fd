//! Command implementations.

pub mod hook;
pub mod list;
pub mod related;
pub mod search;
pub mod show;
pub mod stats;
pub mod sync;

use crate::config::Config;
use crate::error::Result;
use crate::store::Store;

/// Open the configured store with the configured lock timeout.
pub fn open_store(config: &Config) -> Result<Store> {
    Store::open(&config.database_path(), config.database.busy_timeout_ms)
}
