//! Google Places API (v1) client for text and nearby search.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use wayfinder_core::{GeoPoint, PlaceResult, TravelError};

use crate::config::GOOGLE_MAPS_KEY_VAR;
use crate::http::{build_client, trim_base_url, ServiceCodes};
use crate::PlacesProvider;

const DEFAULT_BASE_URL: &str = "https://places.googleapis.com/v1";
const TEXT_SEARCH_MAX_RESULTS: u32 = 5;
const FIELD_MASK: &str = "places.id,places.displayName,places.formattedAddress,places.location,\
places.rating,places.userRatingCount,places.priceLevel,places.currentOpeningHours,\
places.primaryTypeDisplayName,places.types";

const CODES: ServiceCodes = ServiceCodes {
    service: "google places",
    status: "GOOGLE_PLACES_ERROR",
    timeout: "GOOGLE_PLACES_TIMEOUT",
    network: "GOOGLE_PLACES_NETWORK_ERROR",
};

#[derive(Debug, Clone)]
pub struct GooglePlacesClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    places: Vec<RawPlace>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlace {
    id: Option<String>,
    display_name: Option<LocalizedText>,
    formatted_address: Option<String>,
    rating: Option<f64>,
    price_level: Option<String>,
    current_opening_hours: Option<OpeningHours>,
}

#[derive(Debug, Deserialize)]
struct LocalizedText {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpeningHours {
    open_now: Option<bool>,
}

impl GooglePlacesClient {
    pub fn new(api_key: Option<String>) -> Result<Self, TravelError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: Option<String>, base_url: &str) -> Result<Self, TravelError> {
        Ok(Self {
            client: build_client(Duration::from_secs(30))?,
            api_key,
            base_url: trim_base_url(base_url),
        })
    }

    fn api_key(&self) -> Result<&str, TravelError> {
        self.api_key.as_deref().ok_or(TravelError::Configuration {
            credential: GOOGLE_MAPS_KEY_VAR,
        })
    }

    async fn post_search(&self, endpoint: &str, body: Value) -> Result<Vec<PlaceResult>, TravelError> {
        let response = self
            .client
            .post(format!("{}/{endpoint}", self.base_url))
            .header("X-Goog-Api-Key", self.api_key()?)
            .header("X-Goog-FieldMask", FIELD_MASK)
            .json(&body)
            .send()
            .await
            .map_err(|e| CODES.transport(e))?;

        if !response.status().is_success() {
            return Err(CODES.upstream(response).await);
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| CODES.transport(e))?;
        Ok(parsed.places.into_iter().map(map_place).collect())
    }
}

impl PlacesProvider for GooglePlacesClient {
    async fn text_search(
        &self,
        query: &str,
        bias: Option<GeoPoint>,
        radius_m: u32,
    ) -> Result<Vec<PlaceResult>, TravelError> {
        info!(query, has_location = bias.is_some(), radius_m, "places text search");

        let mut body = json!({
            "textQuery": query,
            "languageCode": "en",
            "maxResultCount": TEXT_SEARCH_MAX_RESULTS,
        });
        if let Some(center) = bias {
            body["locationBias"] = circle(center, radius_m);
        }

        let places = self.post_search("places:searchText", body).await?;
        info!(count = places.len(), "places text search finished");
        Ok(places)
    }

    async fn nearby_search(
        &self,
        query: &str,
        center: GeoPoint,
        radius_m: u32,
    ) -> Result<Vec<PlaceResult>, TravelError> {
        let mut body = json!({
            "languageCode": "en",
            "locationRestriction": circle(center, radius_m),
        });
        if let Some(place_type) = place_type_for(query) {
            body["includedTypes"] = json!([place_type]);
        }
        debug!(query, radius_m, "places nearby search");

        self.post_search("places:searchNearby", body).await
    }
}

fn circle(center: GeoPoint, radius_m: u32) -> Value {
    json!({
        "circle": {
            "center": { "latitude": center.lat(), "longitude": center.lng() },
            "radius": radius_m,
        }
    })
}

/// Nearby search filters by place type rather than free text; descriptors
/// without a known type search the whole circle.
pub fn place_type_for(term: &str) -> Option<&'static str> {
    match term.trim().to_lowercase().as_str() {
        "restaurant" | "food" | "dinner" | "lunch" => Some("restaurant"),
        "breakfast" => Some("breakfast_restaurant"),
        "coffee" | "cafe" | "coffee shop" => Some("cafe"),
        "hotel" => Some("lodging"),
        "shop" | "store" => Some("store"),
        "mall" => Some("shopping_mall"),
        "park" => Some("park"),
        "museum" => Some("museum"),
        "bar" => Some("bar"),
        "club" => Some("night_club"),
        "gym" => Some("gym"),
        _ => None,
    }
}

fn map_place(raw: RawPlace) -> PlaceResult {
    let url = raw
        .id
        .as_ref()
        .map(|id| format!("https://www.google.com/maps/place/?q=place_id:{id}"));

    PlaceResult {
        name: raw
            .display_name
            .and_then(|name| name.text)
            .unwrap_or_else(|| "Unknown".to_string()),
        place_id: raw.id,
        address: raw.formatted_address,
        rating: raw.rating,
        price_level: raw.price_level.as_deref().and_then(price_level_from_enum),
        open_now: raw.current_opening_hours.and_then(|hours| hours.open_now),
        url,
        ..PlaceResult::default()
    }
}

fn price_level_from_enum(value: &str) -> Option<u8> {
    match value {
        "PRICE_LEVEL_FREE" => Some(0),
        "PRICE_LEVEL_INEXPENSIVE" => Some(1),
        "PRICE_LEVEL_MODERATE" => Some(2),
        "PRICE_LEVEL_EXPENSIVE" => Some(3),
        "PRICE_LEVEL_VERY_EXPENSIVE" => Some(4),
        _ => None,
    }
}
