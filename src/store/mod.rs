pub mod disk;
pub mod memory;

use crate::core::config::{AppConfig, StorageKind};
use crate::core::storage::DurableStorage;
use anyhow::Result;
use disk::FjallStorage;
use memory::MemoryStorage;
use std::sync::Arc;
use tracing::info;

/// Builds the durable storage selected by the configuration.
pub fn open_storage(config: &AppConfig) -> Result<Arc<dyn DurableStorage>> {
    match config.storage.kind {
        StorageKind::Disk => {
            let path = config.default_data_path()?.join("rates");
            info!(path = %path.display(), "Using disk storage");
            Ok(Arc::new(FjallStorage::new(path)))
        }
        StorageKind::Memory => {
            info!("Using memory storage");
            Ok(Arc::new(MemoryStorage::new()))
        }
    }
}
