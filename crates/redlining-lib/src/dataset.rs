//! Dataset storage and loading module
//!
//! This module provides the GeoJSON-shaped data model for redlining zones and the
//! fail-soft loader that builds a [`GeoDataset`] once at startup.
//!
//! The types mirror the source document so that a filtered subset serializes back
//! into exactly the shape it was read from.

use crate::Result;
use geo::{Coord, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

/// A single `[longitude, latitude]` position (extra ordinates are carried but ignored)
pub type Position = Vec<f64>;

/// A linear ring of positions
pub type Ring = Vec<Position>;

/// A polygon: an exterior ring followed by any interior rings
pub type Polygon = Vec<Ring>;

const FEATURE_COLLECTION: &str = "FeatureCollection";
const FEATURE: &str = "Feature";

fn default_collection_type() -> String {
    FEATURE_COLLECTION.to_string()
}

fn default_feature_type() -> String {
    FEATURE.to_string()
}

/// The whole feature collection, immutable after load
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoDataset {
    /// Top-level type tag (normally "FeatureCollection")
    #[serde(rename = "type", default = "default_collection_type")]
    kind: String,
    /// All features in document order
    #[serde(default)]
    features: Vec<Feature>,
}

/// One redlining zone
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default = "default_feature_type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    geometry: Option<Geometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    properties: Option<Properties>,
}

/// MultiPolygon geometry: multipolygon -> polygon -> ring -> position
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    coordinates: Option<Vec<Polygon>>,
}

/// Descriptive attributes of a zone
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    holc_grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    area_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    area_description_data: Option<BTreeMap<String, Option<String>>>,
}

/// Convert a position into a `geo` coordinate (x = longitude, y = latitude)
///
/// Returns `None` for positions with fewer than two ordinates.
#[inline]
pub(crate) fn position_coord(position: &[f64]) -> Option<Coord<f64>> {
    match position {
        [lng, lat, ..] => Some(Coord { x: *lng, y: *lat }),
        _ => None,
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl GeoDataset {
    /// Create a dataset from already-built features
    pub fn new(kind: impl Into<String>, features: Vec<Feature>) -> Self {
        Self {
            kind: kind.into(),
            features,
        }
    }

    /// An empty feature collection, served when the source cannot be loaded
    pub fn empty() -> Self {
        Self::new(FEATURE_COLLECTION, Vec::new())
    }

    /// Parse a dataset from raw GeoJSON bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Read the whole source and parse it, propagating any failure
    pub fn from_reader<R: Read>(mut source: R) -> Result<Self> {
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes)?;
        Self::from_slice(&bytes)
    }

    /// Load a dataset from a byte source
    ///
    /// Never fails: on any read or parse error a warning is logged and an empty
    /// dataset is returned so the caller can keep serving.
    pub fn load<R: Read>(source: R) -> Self {
        #[cfg(feature = "profiling")]
        profiling::scope!("dataset::load");

        match Self::from_reader(source) {
            Ok(dataset) => {
                tracing::info!(
                    "Successfully loaded GeoJSON data with {} features",
                    dataset.len()
                );
                dataset
            }
            Err(e) => {
                tracing::warn!("Error loading GeoJSON data, serving empty dataset: {e}");
                Self::empty()
            }
        }
    }

    /// Load a dataset from a file path, with the same fail-soft policy as [`GeoDataset::load`]
    pub fn load_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match std::fs::File::open(path) {
            Ok(file) => {
                tracing::info!("Loading GeoJSON data from {}", path.display());
                Self::load(std::io::BufReader::new(file))
            }
            Err(e) => {
                tracing::warn!(
                    "GeoJSON file not found at {}, serving empty dataset: {e}",
                    path.display()
                );
                Self::empty()
            }
        }
    }

    /// Top-level type tag
    #[inline]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// All features in document order
    #[inline]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Number of features
    #[inline]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Check if the dataset has no features
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Bounding rectangle of every valid coordinate in the dataset
    ///
    /// Returns `None` if no feature carries a usable position.
    pub fn extent(&self) -> Option<Rect<f64>> {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        let mut found_valid_point = false;

        for coord in self.features.iter().flat_map(Feature::coords) {
            min_x = min_x.min(coord.x);
            min_y = min_y.min(coord.y);
            max_x = max_x.max(coord.x);
            max_y = max_y.max(coord.y);
            found_valid_point = true;
        }

        found_valid_point.then(|| {
            Rect::new(
                Coord { x: min_x, y: min_y },
                Coord { x: max_x, y: max_y },
            )
        })
    }
}

impl Default for GeoDataset {
    fn default() -> Self {
        Self::empty()
    }
}

impl Feature {
    /// Build a MultiPolygon feature
    pub fn multi_polygon(polygons: Vec<Polygon>, properties: Properties) -> Self {
        Self {
            kind: default_feature_type(),
            geometry: Some(Geometry {
                kind: "MultiPolygon".to_string(),
                coordinates: Some(polygons),
            }),
            properties: Some(properties),
        }
    }

    /// Build a feature without any geometry
    pub fn without_geometry(properties: Properties) -> Self {
        Self {
            kind: default_feature_type(),
            geometry: None,
            properties: Some(properties),
        }
    }

    #[inline]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[inline]
    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    #[inline]
    pub fn properties(&self) -> Option<&Properties> {
        self.properties.as_ref()
    }

    /// Geometry type tag, expected to be "MultiPolygon"
    #[inline]
    pub fn geometry_type(&self) -> Option<&str> {
        self.geometry.as_ref().map(|g| g.kind.as_str())
    }

    /// Polygons of the geometry, `None` when geometry or coordinates are absent
    #[inline]
    pub fn polygons(&self) -> Option<&[Polygon]> {
        self.geometry.as_ref()?.coordinates.as_deref()
    }

    /// Every raw position of every ring of every polygon, in document order
    pub fn positions(&self) -> impl Iterator<Item = &Position> + '_ {
        self.polygons()
            .unwrap_or_default()
            .iter()
            .flatten()
            .flatten()
    }

    /// Every usable coordinate of the geometry (malformed positions are skipped)
    pub fn coords(&self) -> impl Iterator<Item = Coord<f64>> + '_ {
        self.positions().filter_map(|p| position_coord(p))
    }
}

impl Geometry {
    #[inline]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[inline]
    pub fn coordinates(&self) -> Option<&[Polygon]> {
        self.coordinates.as_deref()
    }
}

impl Properties {
    /// Create properties for a zone with the given city and HOLC grade
    pub fn new(city: impl Into<String>, holc_grade: impl Into<String>) -> Self {
        Self {
            city: Some(city.into()),
            holc_grade: Some(holc_grade.into()),
            ..Self::default()
        }
    }

    /// Add one free-text description field
    pub fn with_description(mut self, field: impl Into<String>, text: impl Into<String>) -> Self {
        self.area_description_data
            .get_or_insert_with(BTreeMap::new)
            .insert(field.into(), Some(text.into()));
        self
    }

    /// Set the single top-level description text
    pub fn with_area_description(mut self, text: impl Into<String>) -> Self {
        self.area_description = Some(text.into());
        self
    }

    #[inline]
    pub fn city(&self) -> Option<&str> {
        self.city.as_deref()
    }

    #[inline]
    pub fn holc_grade(&self) -> Option<&str> {
        self.holc_grade.as_deref()
    }

    #[inline]
    pub fn area_description(&self) -> Option<&str> {
        self.area_description.as_deref()
    }

    /// Description fields as `(name, text)` pairs; null values are skipped
    pub fn description_fields(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.area_description_data
            .iter()
            .flatten()
            .filter_map(|(name, text)| Some((name.as_str(), text.as_deref()?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_GEOJSON: &str = r#"{"type":"FeatureCollection","features":[{"type":"Feature","geometry":{"type":"MultiPolygon","coordinates":[[[[100.0, 0.0],[101.0, 0.0],[101.0, 1.0],[100.0, 1.0],[100.0, 0.0]]]]},"properties":{"city":"TestCity","holc_grade":"A","area_description_data":{"key1":"This is test data about housing conditions"}}}]}"#;

    #[test]
    fn test_parse_minimal_collection() {
        let dataset = GeoDataset::from_slice(MINIMAL_GEOJSON.as_bytes()).unwrap();

        assert_eq!(dataset.kind(), "FeatureCollection");
        assert_eq!(dataset.len(), 1);

        let feature = &dataset.features()[0];
        assert_eq!(feature.geometry_type(), Some("MultiPolygon"));
        assert_eq!(feature.positions().count(), 5);

        let properties = feature.properties().unwrap();
        assert_eq!(properties.city(), Some("TestCity"));
        assert_eq!(properties.holc_grade(), Some("A"));
        assert_eq!(properties.description_fields().count(), 1);
    }

    #[test]
    fn test_load_malformed_is_empty() {
        let dataset = GeoDataset::load("{ not json".as_bytes());
        assert!(dataset.is_empty());
        assert_eq!(dataset.kind(), "FeatureCollection");
    }

    #[test]
    fn test_load_wrong_shape_is_empty() {
        // Polygon nesting instead of MultiPolygon nesting
        let json = r#"{"type":"FeatureCollection","features":[{"type":"Feature","geometry":{"type":"Polygon","coordinates":[[[1.0,2.0]]]}}]}"#;
        let dataset = GeoDataset::load(json.as_bytes());
        assert!(dataset.is_empty());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = GeoDataset::load_file(dir.path().join("missing.json"));
        assert!(dataset.is_empty());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zones.json");
        std::fs::write(&path, MINIMAL_GEOJSON).unwrap();

        let dataset = GeoDataset::load_file(&path);
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn test_null_geometry_and_values() {
        let json = r#"{"type":"FeatureCollection","features":[{"type":"Feature","geometry":null,"properties":{"city":null,"area_description_data":{"a":null,"b":"text"}}}]}"#;
        let dataset = GeoDataset::from_slice(json.as_bytes()).unwrap();

        let feature = &dataset.features()[0];
        assert!(feature.polygons().is_none());
        assert_eq!(feature.positions().count(), 0);

        let properties = feature.properties().unwrap();
        assert!(properties.city().is_none());
        let fields: Vec<_> = properties.description_fields().collect();
        assert_eq!(fields, vec![("b", "text")]);
    }

    #[test]
    fn test_serialization_omits_absent_values() {
        let feature = Feature::without_geometry(Properties::new("Providence", "B"));
        let json = serde_json::to_value(&feature).unwrap();

        assert_eq!(json["type"], "Feature");
        assert!(json.get("geometry").is_none());
        assert_eq!(json["properties"]["holc_grade"], "B");
        assert!(json["properties"].get("area_description").is_none());
    }

    #[test]
    fn test_reserialize_mirrors_input() {
        let dataset = GeoDataset::from_slice(MINIMAL_GEOJSON.as_bytes()).unwrap();
        let json = serde_json::to_string(&dataset).unwrap();
        let reparsed = GeoDataset::from_slice(json.as_bytes()).unwrap();
        assert_eq!(dataset, reparsed);
    }

    #[test]
    fn test_extent() {
        let dataset = GeoDataset::from_slice(MINIMAL_GEOJSON.as_bytes()).unwrap();
        let extent = dataset.extent().unwrap();

        assert_eq!(extent.min(), Coord { x: 100.0, y: 0.0 });
        assert_eq!(extent.max(), Coord { x: 101.0, y: 1.0 });
        assert!(GeoDataset::empty().extent().is_none());
    }

    #[test]
    fn test_short_position_has_no_coord() {
        assert!(position_coord(&[1.0]).is_none());
        assert_eq!(position_coord(&[1.0, 2.0, 3.0]), Some(Coord { x: 1.0, y: 2.0 }));
    }
}
