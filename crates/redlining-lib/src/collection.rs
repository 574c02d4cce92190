//! RedliningCollection - Top-level manager for the dataset, cache, and queries
//!
//! This module provides the high-level API used by the server: it owns the shared
//! dataset and the query cache and is the only place where the box filter and the
//! cache meet.

use crate::{
    BoundingBox, CacheKey, CacheStats, DEFAULT_CACHE_CAPACITY, GeoDataset, QueryCache, Result,
    SearchResults, filter, search,
};

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Configuration for the redlining collection
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of box queries kept in the result cache.
    /// Default: 20
    pub cache_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Information about the collection
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionInfo {
    /// Number of features loaded
    pub feature_count: usize,
    /// Total number of coordinate points
    pub total_points: usize,
    /// Result cache counters
    pub cache: CacheStats,
}

/// Which path a box query took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served verbatim from the cache
    Hit,
    /// Filtered, serialized and inserted into the cache
    Miss,
}

/// Serialized payload of a box query plus how it was produced
#[derive(Debug, Clone)]
pub struct BoxQueryResult {
    pub key: CacheKey,
    pub payload: Arc<str>,
    pub status: CacheStatus,
}

/// Top-level manager for the dataset and queries
#[derive(Debug)]
pub struct RedliningCollection {
    /// The loaded dataset, read-only for the collection's lifetime
    dataset: Arc<GeoDataset>,
    /// Cache of serialized box-query results
    cache: QueryCache,
    /// Configuration settings
    config: Config,
    /// Cached point count (computed once at construction)
    total_points: usize,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl RedliningCollection {
    /// Create a collection over an already loaded dataset
    pub fn new(dataset: GeoDataset, config: Config) -> Self {
        Self::from_shared(Arc::new(dataset), config)
    }

    /// Create a collection over a shared dataset
    pub fn from_shared(dataset: Arc<GeoDataset>, config: Config) -> Self {
        let total_points = dataset.features().iter().map(|f| f.positions().count()).sum();
        Self {
            cache: QueryCache::new(config.cache_capacity),
            dataset,
            config,
            total_points,
        }
    }

    /// Load the dataset file and build a collection over it
    ///
    /// Uses the fail-soft loader: an unreadable file gives an empty collection.
    pub fn load_file<P: AsRef<Path>>(path: P, config: Config) -> Self {
        Self::new(GeoDataset::load_file(path), config)
    }

    /// Answer a box query, from the cache when possible
    ///
    /// On a miss the dataset is filtered, the subset serialized and the payload
    /// cached under the box's canonical key. Two concurrent misses on the same key
    /// may both compute; the payloads are identical.
    pub fn query_box(&self, bbox: &BoundingBox) -> Result<BoxQueryResult> {
        let key = bbox.cache_key();

        if let Some(payload) = self.cache.get(&key) {
            tracing::debug!("Cache hit for key: {key}");
            return Ok(BoxQueryResult {
                key,
                payload,
                status: CacheStatus::Hit,
            });
        }

        tracing::debug!("Cache miss for key: {key}, filtering data...");
        let subset = filter(&self.dataset, bbox);
        let payload: Arc<str> = subset.to_json()?.into();
        self.cache.put(key.clone(), Arc::clone(&payload));

        Ok(BoxQueryResult {
            key,
            payload,
            status: CacheStatus::Miss,
        })
    }

    /// Keyword search over the dataset (never cached)
    #[inline]
    pub fn search(&self, keyword: &str) -> Result<SearchResults> {
        search(&self.dataset, keyword)
    }

    /// The loaded dataset
    #[inline]
    pub fn dataset(&self) -> &GeoDataset {
        &self.dataset
    }

    /// Shared handle to the loaded dataset
    #[inline]
    pub fn shared_dataset(&self) -> Arc<GeoDataset> {
        Arc::clone(&self.dataset)
    }

    /// The query cache
    #[inline]
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    #[inline]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Get number of features
    #[inline]
    pub fn feature_count(&self) -> usize {
        self.dataset.len()
    }

    /// Check if the collection is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// Get a reference to the configuration
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get collection information
    pub fn get_info(&self) -> CollectionInfo {
        CollectionInfo {
            feature_count: self.dataset.len(),
            total_points: self.total_points,
            cache: self.cache.stats(),
        }
    }

    /// Get the combined bounding box of all features
    ///
    /// Returns `None` if no feature has usable coordinates.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.dataset.extent().map(BoundingBox::from)
    }
}
