//! Bounding boxes, canonical cache keys and the full-containment filter

use crate::dataset::position_coord;
use crate::{Feature, GeoDataset, Result};
use geo::{Coord, Rect};
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;

/// World bounds used for any box parameter that is not supplied
pub const WORLD_MIN_LAT: f64 = -90.0;
pub const WORLD_MIN_LNG: f64 = -180.0;
pub const WORLD_MAX_LAT: f64 = 90.0;
pub const WORLD_MAX_LNG: f64 = 180.0;

/// Separator between the four coordinates of a cache key
const KEY_SEPARATOR: &str = ":";

/// Axis-aligned latitude/longitude rectangle used as a query filter
///
/// Inverted boxes (min > max) are accepted as-is and simply match nothing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

/// Canonical string form of a [`BoundingBox`]
///
/// Each coordinate is rounded to 6 decimals so that numerically equal boxes
/// written with different precision share one key. Values that round to zero,
/// negative zero included, render as `0.000000`; a plain `%.6f` rendering would
/// give `-0.000000` and a separate entry for the same box.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

/// Features of a dataset that lie fully inside a box
///
/// Borrows from the dataset and serializes to the same shape as [`GeoDataset`].
#[derive(Clone, Debug, Serialize)]
pub struct FeatureSubset<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    features: Vec<&'a Feature>,
}

impl BoundingBox {
    /// The whole world, (-90, -180, 90, 180)
    pub const WORLD: Self = Self {
        min_lat: WORLD_MIN_LAT,
        min_lng: WORLD_MIN_LNG,
        max_lat: WORLD_MAX_LAT,
        max_lng: WORLD_MAX_LNG,
    };

    pub fn new(min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64) -> Self {
        Self {
            min_lat,
            min_lng,
            max_lat,
            max_lng,
        }
    }

    /// Build a box from raw query parameters
    ///
    /// Each parameter that is absent, empty, unparsable or non-finite falls back
    /// to the matching world bound. This never fails.
    pub fn from_params(
        min_lat: Option<&str>,
        min_lng: Option<&str>,
        max_lat: Option<&str>,
        max_lng: Option<&str>,
    ) -> Self {
        Self {
            min_lat: parse_bound(min_lat, WORLD_MIN_LAT),
            min_lng: parse_bound(min_lng, WORLD_MIN_LNG),
            max_lat: parse_bound(max_lat, WORLD_MAX_LAT),
            max_lng: parse_bound(max_lng, WORLD_MAX_LNG),
        }
    }

    /// Check if a coordinate (x = longitude, y = latitude) lies inside, bounds inclusive
    #[inline(always)]
    pub fn contains(&self, coord: Coord<f64>) -> bool {
        self.min_lat <= coord.y
            && coord.y <= self.max_lat
            && self.min_lng <= coord.x
            && coord.x <= self.max_lng
    }

    /// Full containment: every point of every ring of every polygon must be inside
    ///
    /// Features without geometry, without coordinates, or with a malformed
    /// position are never contained. Stops at the first point outside.
    pub fn contains_feature(&self, feature: &Feature) -> bool {
        if feature.polygons().is_none() {
            return false;
        }
        feature
            .positions()
            .all(|position| position_coord(position).is_some_and(|c| self.contains(c)))
    }

    /// Check if min exceeds max on either axis
    #[inline]
    pub fn is_inverted(&self) -> bool {
        self.min_lat > self.max_lat || self.min_lng > self.max_lng
    }

    /// Canonical cache key for this box
    #[inline]
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::from(self)
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::WORLD
    }
}

impl From<Rect<f64>> for BoundingBox {
    fn from(rect: Rect<f64>) -> Self {
        Self::new(rect.min().y, rect.min().x, rect.max().y, rect.max().x)
    }
}

fn parse_bound(value: Option<&str>, default: f64) -> f64 {
    value
        .map(str::trim)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

impl CacheKey {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&BoundingBox> for CacheKey {
    fn from(bbox: &BoundingBox) -> Self {
        let key = [bbox.min_lat, bbox.min_lng, bbox.max_lat, bbox.max_lng]
            .map(canonical_coordinate)
            .join(KEY_SEPARATOR);
        Self(key)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Format a coordinate with 6 decimals; anything that rounds to zero is "0.000000"
fn canonical_coordinate(value: f64) -> String {
    let formatted = format!("{value:.6}");
    match formatted.strip_prefix('-') {
        Some(magnitude) if magnitude.bytes().all(|b| b == b'0' || b == b'.') => {
            magnitude.to_string()
        }
        _ => formatted,
    }
}

impl<'a> FeatureSubset<'a> {
    /// Type tag copied from the source dataset
    #[inline]
    pub fn kind(&self) -> &'a str {
        self.kind
    }

    /// Retained features in dataset order
    #[inline]
    pub fn features(&self) -> &[&'a Feature] {
        &self.features
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Serialize to the GeoJSON payload served to clients
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Clone the retained features into an owned dataset
    pub fn into_owned(self) -> GeoDataset {
        GeoDataset::new(self.kind, self.features.into_iter().cloned().collect())
    }
}

/// Select the features of `dataset` that lie fully inside `bbox`
///
/// Features are tested in parallel; the result keeps the dataset order.
pub fn filter<'a>(dataset: &'a GeoDataset, bbox: &BoundingBox) -> FeatureSubset<'a> {
    #[cfg(feature = "profiling")]
    profiling::scope!("bbox::filter");

    let features = dataset
        .features()
        .par_iter()
        .filter(|feature| bbox.contains_feature(feature))
        .collect();

    FeatureSubset {
        kind: dataset.kind(),
        features,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Polygon, Properties};

    fn rectangle(min_lng: f64, min_lat: f64, max_lng: f64, max_lat: f64) -> Vec<Polygon> {
        vec![vec![vec![
            vec![min_lng, min_lat],
            vec![max_lng, min_lat],
            vec![max_lng, max_lat],
            vec![min_lng, max_lat],
            vec![min_lng, min_lat],
        ]]]
    }

    fn zone(city: &str, polygons: Vec<Polygon>) -> Feature {
        Feature::multi_polygon(polygons, Properties::new(city, "A"))
    }

    fn create_test_dataset() -> GeoDataset {
        GeoDataset::new(
            "FeatureCollection",
            vec![
                zone("Inside", rectangle(100.0, 0.0, 101.0, 1.0)),
                zone("Straddling", rectangle(100.5, 0.5, 102.0, 1.5)),
                zone("Far", rectangle(-71.5, 41.8, -71.3, 41.9)),
                Feature::without_geometry(Properties::new("NoGeometry", "D")),
                zone("Small", rectangle(100.6, 0.6, 100.7, 0.7)),
            ],
        )
    }

    fn cities(subset: &FeatureSubset<'_>) -> Vec<String> {
        subset
            .features()
            .iter()
            .filter_map(|f| f.properties()?.city().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_world_box_keeps_every_feature_with_geometry() {
        let dataset = create_test_dataset();
        let subset = filter(&dataset, &BoundingBox::WORLD);
        assert_eq!(cities(&subset), vec!["Inside", "Straddling", "Far", "Small"]);
        assert_eq!(subset.kind(), "FeatureCollection");
    }

    #[test]
    fn test_full_containment_drops_straddling_feature() {
        let dataset = create_test_dataset();
        let subset = filter(&dataset, &BoundingBox::new(0.0, 100.0, 1.0, 101.0));
        assert_eq!(cities(&subset), vec!["Inside", "Small"]);
    }

    #[test]
    fn test_boundary_points_are_inside() {
        let dataset = GeoDataset::new(
            "FeatureCollection",
            vec![zone("Edge", rectangle(100.0, 0.0, 101.0, 1.0))],
        );
        let exact = BoundingBox::new(0.0, 100.0, 1.0, 101.0);
        assert_eq!(filter(&dataset, &exact).len(), 1);

        let shrunk = BoundingBox::new(0.0, 100.0, 1.0, 100.999_999);
        assert!(filter(&dataset, &shrunk).is_empty());
    }

    #[test]
    fn test_subset_of_world_and_order_preserving() {
        let dataset = create_test_dataset();
        let world = filter(&dataset, &BoundingBox::WORLD);
        let boxes = [
            BoundingBox::new(0.0, 100.0, 1.0, 101.0),
            BoundingBox::new(0.5, 100.5, 0.8, 100.8),
            BoundingBox::new(41.0, -72.0, 42.0, -71.0),
            BoundingBox::new(-10.0, -10.0, 10.0, 10.0),
        ];

        for bbox in boxes {
            let subset = filter(&dataset, &bbox);
            let positions: Vec<usize> = subset
                .features()
                .iter()
                .map(|f| {
                    world
                        .features()
                        .iter()
                        .position(|w| std::ptr::eq(*w, *f))
                        .unwrap()
                })
                .collect();
            assert!(positions.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_filter_is_deterministic() {
        let dataset = create_test_dataset();
        let bbox = BoundingBox::new(0.0, 100.0, 2.0, 102.0);
        let first = filter(&dataset, &bbox).to_json().unwrap();
        let second = filter(&dataset, &bbox).to_json().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_inverted_box_matches_nothing() {
        let dataset = create_test_dataset();
        let inverted = BoundingBox::new(1.0, 101.0, 0.0, 100.0);
        assert!(inverted.is_inverted());
        assert!(filter(&dataset, &inverted).is_empty());
    }

    #[test]
    fn test_malformed_position_excludes_feature() {
        let mut polygons = rectangle(100.0, 0.0, 101.0, 1.0);
        polygons[0][0].push(vec![100.5]);
        let dataset = GeoDataset::new("FeatureCollection", vec![zone("Broken", polygons)]);
        assert!(filter(&dataset, &BoundingBox::WORLD).is_empty());
    }

    #[test]
    fn test_empty_coordinates_are_vacuously_contained() {
        let dataset = GeoDataset::new("FeatureCollection", vec![zone("Empty", Vec::new())]);
        assert_eq!(filter(&dataset, &BoundingBox::new(0.0, 0.0, 0.0, 0.0)).len(), 1);
    }

    #[test]
    fn test_absent_coordinates_excluded() {
        let json = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"MultiPolygon"},"properties":{"city":"NoCoords"}},
            {"type":"Feature","geometry":{"type":"MultiPolygon","coordinates":null},"properties":{"city":"NullCoords"}},
            {"type":"Feature","geometry":null,"properties":{"city":"NullGeometry"}},
            {"type":"Feature","properties":{"city":"NoGeometry"}}
        ]}"#;
        let dataset = GeoDataset::from_slice(json.as_bytes()).unwrap();
        assert_eq!(dataset.len(), 4);
        assert!(dataset.features()[0].geometry().is_some());
        assert!(dataset.features()[0].polygons().is_none());

        assert!(filter(&dataset, &BoundingBox::WORLD).is_empty());
    }

    #[test]
    fn test_from_params_defaults() {
        let bbox = BoundingBox::from_params(None, Some(""), Some("abc"), Some("NaN"));
        assert_eq!(bbox, BoundingBox::WORLD);

        let bbox = BoundingBox::from_params(Some("0"), Some(" 100.5 "), Some("1"), None);
        assert_eq!(bbox, BoundingBox::new(0.0, 100.5, 1.0, WORLD_MAX_LNG));
    }

    #[test]
    fn test_cache_key_format() {
        assert_eq!(
            BoundingBox::WORLD.cache_key().as_str(),
            "-90.000000:-180.000000:90.000000:180.000000"
        );
    }

    #[test]
    fn test_cache_key_canonicalization() {
        let a = BoundingBox::new(0.0, 100.0, 1.0, 101.0);
        let b = BoundingBox::new(0.0000001, 100.0000004, 1.0, 101.0);
        assert_eq!(a.cache_key(), b.cache_key());

        let c = BoundingBox::new(0.000001, 100.0, 1.0, 101.0);
        assert_ne!(a.cache_key(), c.cache_key());
    }

    #[test]
    fn test_cache_key_negative_zero() {
        let a = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let b = BoundingBox::new(-0.0, -0.0000001, 1.0, 1.0);
        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(canonical_coordinate(-0.5), "-0.500000");
    }

    #[test]
    fn test_into_owned() {
        let dataset = create_test_dataset();
        let owned = filter(&dataset, &BoundingBox::new(0.0, 100.0, 1.0, 101.0)).into_owned();
        assert_eq!(owned.len(), 2);
        assert_eq!(owned.features()[0], dataset.features()[0]);
    }

    #[test]
    fn test_from_rect() {
        let rect = Rect::new(Coord { x: 100.0, y: 0.0 }, Coord { x: 101.0, y: 1.0 });
        assert_eq!(BoundingBox::from(rect), BoundingBox::new(0.0, 100.0, 1.0, 101.0));
    }
}
