//! Server state shared by all handlers
//!
//! The collection (dataset + query cache) is built once at startup and only read
//! afterwards; the pin store is injected so tests can swap in memory storage.

use crate::settings::Settings;
use crate::storage::{FileStorage, MemoryStorage, PinStore, StorageResult};
use redlining_lib::{Config, GeoDataset, RedliningCollection};
use std::sync::Arc;

/// Shared server state
pub struct AppState {
    /// Loaded redlining zones and the box-query cache
    pub collection: RedliningCollection,

    /// User pins, independent of the collection
    pub pins: Arc<dyn PinStore>,
}

impl AppState {
    pub fn new(collection: RedliningCollection, pins: Arc<dyn PinStore>) -> Self {
        Self { collection, pins }
    }

    /// Load the dataset and open the pin file named by `settings`
    ///
    /// A missing or corrupt dataset gives an empty collection; a pin file that
    /// cannot be opened or parsed is an error.
    pub fn from_settings(settings: &Settings) -> StorageResult<Self> {
        let collection =
            RedliningCollection::load_file(&settings.dataset, settings.collection_config());
        let pins = FileStorage::new_with_path(settings.pins_file.clone())?;

        let info = collection.get_info();
        tracing::info!(
            "Loaded {} features ({} points), cache capacity {}",
            info.feature_count,
            info.total_points,
            info.cache.capacity
        );

        Ok(Self::new(collection, Arc::new(pins)))
    }

    /// State over an in-memory dataset with memory-only pins
    pub fn in_memory(dataset: GeoDataset, config: Config) -> Self {
        Self::new(
            RedliningCollection::new(dataset, config),
            Arc::new(MemoryStorage::new()),
        )
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}
