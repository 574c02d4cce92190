//! HTTP handlers
//!
//! Filtering, searching and pin storage run on the blocking pool; handlers only
//! parse query parameters and shape the JSON responses.
//!
//! Query strings are read through [`QueryParams`], which keeps the first value of a
//! repeated parameter instead of rejecting the request.

use axum::{
    Json,
    extract::{FromRequestParts, Query, State},
    http::{StatusCode, header::CONTENT_TYPE, request::Parts},
    response::{IntoResponse, Response},
};
use redlining_lib::{BoundingBox, SearchResults};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::AppError;
use crate::state::AppState;
use crate::storage::Pin;

type SharedState = Arc<AppState>;

async fn run_blocking<T, F>(task: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}

/// Decoded query string; a repeated name keeps its first value
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueryParams(HashMap<String, String>);

impl QueryParams {
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut map = HashMap::new();
        for (name, value) in pairs {
            map.entry(name).or_insert(value);
        }
        Self(map)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn take(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }
}

impl<S> FromRequestParts<S> for QueryParams
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::InvalidQuery(rejection.body_text()))?;
        Ok(Self::from_pairs(pairs))
    }
}

#[derive(Debug, Default)]
pub struct BoxParams {
    min_lat: Option<String>,
    min_lng: Option<String>,
    max_lat: Option<String>,
    max_lng: Option<String>,
}

impl From<QueryParams> for BoxParams {
    fn from(mut query: QueryParams) -> Self {
        Self {
            min_lat: query.take("minLat"),
            min_lng: query.take("minLng"),
            max_lat: query.take("maxLat"),
            max_lng: query.take("maxLng"),
        }
    }
}

impl BoxParams {
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_params(
            self.min_lat.as_deref(),
            self.min_lng.as_deref(),
            self.max_lat.as_deref(),
            self.max_lng.as_deref(),
        )
    }
}

/// `GET /get-redlining-data`
pub async fn redlining_data_handler(
    State(state): State<SharedState>,
    query: QueryParams,
) -> Result<Response, AppError> {
    let bbox = BoxParams::from(query).bounding_box();
    tracing::debug!("Box query {bbox:?}");

    let result = run_blocking(move || Ok(state.collection.query_box(&bbox)?)).await?;

    Ok((
        StatusCode::OK,
        [(CONTENT_TYPE, "application/json")],
        result.payload.to_string(),
    )
        .into_response())
}


#[derive(Debug, Serialize)]
struct SearchResponse {
    result: &'static str,
    #[serde(flatten)]
    results: SearchResults,
}

/// `GET /search-redlining`
pub async fn search_handler(
    State(state): State<SharedState>,
    mut query: QueryParams,
) -> Result<Json<serde_json::Value>, AppError> {
    let keyword = query.take("keyword").ok_or(AppError::MissingKeyword)?;
    if keyword.trim().is_empty() {
        return Err(AppError::MissingKeyword);
    }

    let results = run_blocking(move || Ok(state.collection.search(&keyword)?)).await?;
    let body = serde_json::to_value(SearchResponse {
        result: "success",
        results,
    })
    .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(body))
}

#[derive(Debug, Default)]
pub struct AddPinParams {
    user_id: Option<String>,
    pin_id: Option<String>,
    latitude: Option<String>,
    longitude: Option<String>,
    timestamp: Option<String>,
}

fn required(value: Option<String>) -> Result<String, AppError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(AppError::MissingParameters)
}

fn parse_coordinate(value: &str, name: &'static str) -> Result<f64, AppError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or(AppError::InvalidParameter(name))
}

impl From<QueryParams> for AddPinParams {
    fn from(mut query: QueryParams) -> Self {
        Self {
            user_id: query.take("userId"),
            pin_id: query.take("pinId"),
            latitude: query.take("latitude"),
            longitude: query.take("longitude"),
            timestamp: query.take("timestamp"),
        }
    }
}

impl AddPinParams {
    /// Validate and build the pin; every parameter is required
    pub fn into_pin(self) -> Result<Pin, AppError> {
        let user_id = required(self.user_id)?;
        let pin_id = required(self.pin_id)?;
        let latitude = required(self.latitude)?;
        let longitude = required(self.longitude)?;
        let timestamp = required(self.timestamp)?;

        Ok(Pin {
            latitude: parse_coordinate(&latitude, "latitude")?,
            longitude: parse_coordinate(&longitude, "longitude")?,
            timestamp: timestamp
                .trim()
                .parse::<i64>()
                .map_err(|_| AppError::InvalidParameter("timestamp"))?,
            id: pin_id,
            user_id,
        })
    }
}

/// `GET /add-pin`
pub async fn add_pin_handler(
    State(state): State<SharedState>,
    query: QueryParams,
) -> Result<Json<serde_json::Value>, AppError> {
    let pin = AddPinParams::from(query).into_pin()?;
    tracing::info!("Adding pin {} for user {}", pin.id, pin.user_id);

    let pin = run_blocking(move || {
        state.pins.add_document(&pin.user_id, &pin.id, &pin)?;
        Ok(pin)
    })
    .await?;

    Ok(Json(json!({
        "result": "success",
        "pin": pin,
    })))
}

/// `GET /get-all-pins`
pub async fn get_all_pins_handler(
    State(state): State<SharedState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let pins = run_blocking(move || Ok(state.pins.get_all_pins()?)).await?;

    Ok(Json(json!({
        "result": "success",
        "pins": pins,
    })))
}

/// `GET /drop-pins`
pub async fn drop_pins_handler(
    State(state): State<SharedState>,
    mut query: QueryParams,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = query
        .take("userId")
        .filter(|id| !id.trim().is_empty())
        .ok_or(AppError::MissingUserId)?;
    tracing::info!("Clearing pins for user {user_id}");

    let user_id = run_blocking(move || {
        state.pins.clear_user(&user_id)?;
        Ok(user_id)
    })
    .await?;

    Ok(Json(json!({
        "result": "success",
        "message": format!("All pins for user {user_id} have been cleared"),
    })))
}
