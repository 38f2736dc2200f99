//! CLI command implementations.

pub mod audit;
pub mod queue;
pub mod status;

use possync_core::{DatabaseConfig, LocalDatabase};
use possync_storage::FileStore;
use std::path::Path;
use std::sync::Arc;

/// Opens the local database stored under `path`.
///
/// Refuses to create a new store: the commands only inspect existing data.
pub fn open(path: &Path) -> Result<LocalDatabase, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No terminal data found at {:?}", path).into());
    }
    let store = FileStore::open(path)?;
    Ok(LocalDatabase::open(Arc::new(store), DatabaseConfig::default()))
}
