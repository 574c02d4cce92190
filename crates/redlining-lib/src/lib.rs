//! Redlining Library - Core Data Structures for Redlining Zone Queries
//!
//! This library provides loading, filtering, caching and searching of the historical
//! redlining (HOLC) zone dataset. The dataset is a GeoJSON feature collection of
//! multipolygons that is parsed once at startup and shared read-only afterwards.
//!
//! # Architecture
//!
//! - **[`GeoDataset`]**: Immutable storage for the parsed feature collection
//! - **[`BoundingBox`]**: Query rectangle with its canonical [`CacheKey`]
//! - **[`filter`]**: Full-containment bounding-box filter
//! - **[`QueryCache`]**: Bounded LRU cache of serialized box-query results
//! - **[`search`]**: Case-insensitive keyword search over area descriptions
//! - **[`RedliningCollection`]**: High-level manager tying the dataset and cache together
//!
//! # Performance Characteristics
//!
//! - **Load**: O(N) in the size of the source document, done once
//! - **Box query**: O(P) over all coordinate points on a miss, O(1) on a cache hit
//! - **Keyword search**: O(T) over all description text, never cached

mod bbox;
mod cache;
mod collection;
mod dataset;
mod search;

// Public API exports
pub use bbox::{BoundingBox, CacheKey, FeatureSubset, filter};
pub use cache::{CacheStats, DEFAULT_CACHE_CAPACITY, QueryCache};
pub use collection::{BoxQueryResult, CacheStatus, CollectionInfo, Config, RedliningCollection};
pub use dataset::{Feature, GeoDataset, Geometry, Polygon, Position, Properties, Ring};
pub use search::{SearchResults, normalize_keyword, search};

/// Error types for the data module
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GeoJSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Search keyword is required")]
    EmptyKeyword,
}

pub type Result<T> = std::result::Result<T, DataError>;
