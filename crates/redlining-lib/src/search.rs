//! Keyword search over area descriptions
//!
//! A linear, case-insensitive substring scan. Results are never cached.
//!
//! Match identifiers have the form `<city>-<grade>-<ordinal>`, where the ordinal is the
//! 0-based position among the matches of one call. They are unique within a result but
//! are not stable feature IDs: the same zone can get a different ordinal for another keyword.

use crate::{DataError, Feature, GeoDataset, Result};
use rayon::prelude::*;
use serde::Serialize;

/// Outcome of a keyword search
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    /// Normalized (trimmed, lower-case) keyword
    pub keyword: String,
    /// Identifiers of matching features in dataset order
    pub matching_features: Vec<String>,
    pub total_matches: usize,
}

/// Trim and lower-case a keyword, rejecting blank input
pub fn normalize_keyword(keyword: &str) -> Result<String> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(DataError::EmptyKeyword);
    }
    Ok(keyword.to_lowercase())
}

/// Find every feature whose description text contains `keyword`, ignoring case
///
/// Fails with [`DataError::EmptyKeyword`] before scanning when the keyword is blank.
pub fn search(dataset: &GeoDataset, keyword: &str) -> Result<SearchResults> {
    #[cfg(feature = "profiling")]
    profiling::scope!("search::search");

    let keyword = normalize_keyword(keyword)?;

    let matches: Vec<&Feature> = dataset
        .features()
        .par_iter()
        .filter(|feature| feature_matches(feature, &keyword))
        .collect();

    let matching_features: Vec<String> = matches
        .iter()
        .enumerate()
        .map(|(ordinal, feature)| match_identifier(feature, ordinal))
        .collect();

    tracing::debug!(
        "Found {} matches for keyword: {keyword}",
        matching_features.len()
    );

    Ok(SearchResults {
        total_matches: matching_features.len(),
        matching_features,
        keyword,
    })
}

/// Description fields first, then the top-level description; first hit wins
fn feature_matches(feature: &Feature, keyword: &str) -> bool {
    let Some(properties) = feature.properties() else {
        return false;
    };

    properties
        .description_fields()
        .any(|(_, text)| contains_ignore_case(text, keyword))
        || properties
            .area_description()
            .is_some_and(|text| contains_ignore_case(text, keyword))
}

/// Lower-cases `text` on every call, so a search costs O(total description text)
#[inline]
fn contains_ignore_case(text: &str, lowercase_keyword: &str) -> bool {
    text.to_lowercase().contains(lowercase_keyword)
}

fn match_identifier(feature: &Feature, ordinal: usize) -> String {
    let properties = feature.properties();
    let city = properties.and_then(|p| p.city()).unwrap_or_default();
    let grade = properties.and_then(|p| p.holc_grade()).unwrap_or_default();
    format!("{city}-{grade}-{ordinal}")
}
