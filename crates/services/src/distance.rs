use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use wayfinder_core::{DistanceDestination, DistanceRow, GeoPoint, TravelError};

use crate::config::GOOGLE_MAPS_KEY_VAR;
use crate::http::{build_client, trim_base_url, ServiceCodes};
use crate::DistanceProvider;

const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com";

const CODES: ServiceCodes = ServiceCodes {
    service: "distance matrix",
    status: "DISTANCE_MATRIX_HTTP_ERROR",
    timeout: "DISTANCE_MATRIX_TIMEOUT",
    network: "DISTANCE_MATRIX_NETWORK_ERROR",
};

/// Google Distance Matrix JSON API, one origin against many destinations.
#[derive(Debug, Clone)]
pub struct DistanceMatrixClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    status: String,
    #[serde(default)]
    rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    #[serde(default)]
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: Option<String>,
    distance: Option<TextValue>,
    duration: Option<TextValue>,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    text: Option<String>,
    value: Option<u64>,
}

impl DistanceMatrixClient {
    pub fn new(api_key: Option<String>) -> Result<Self, TravelError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: Option<String>, base_url: &str) -> Result<Self, TravelError> {
        Ok(Self {
            client: build_client(Duration::from_secs(20))?,
            api_key,
            base_url: trim_base_url(base_url),
        })
    }
}

impl DistanceProvider for DistanceMatrixClient {
    async fn distance_matrix(
        &self,
        origin: GeoPoint,
        destinations: &[DistanceDestination],
    ) -> Result<Vec<DistanceRow>, TravelError> {
        let api_key = self.api_key.as_deref().ok_or(TravelError::Configuration {
            credential: GOOGLE_MAPS_KEY_VAR,
        })?;
        if destinations.is_empty() {
            return Ok(Vec::new());
        }

        let destinations = destinations
            .iter()
            .map(DistanceDestination::as_param)
            .collect::<Vec<_>>()
            .join("|");
        let origin = origin.as_param();

        let response = self
            .client
            .get(format!("{}/maps/api/distancematrix/json", self.base_url))
            .query(&[
                ("origins", origin.as_str()),
                ("destinations", destinations.as_str()),
                ("mode", "driving"),
                ("units", "metric"),
                ("key", api_key),
            ])
            .send()
            .await
            .map_err(|e| CODES.transport(e))?;

        if !response.status().is_success() {
            return Err(CODES.upstream(response).await);
        }

        let payload: MatrixResponse = response.json().await.map_err(|e| CODES.transport(e))?;
        if payload.status != "OK" {
            return Err(TravelError::Upstream {
                service: CODES.service,
                code: "DISTANCE_MATRIX_STATUS_ERROR",
                status: None,
                detail: payload.status,
            });
        }

        let rows = payload
            .rows
            .into_iter()
            .next()
            .map(|row| row.elements)
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(index, element)| {
                let (distance_text, distance_value) = split(element.distance);
                let (duration_text, duration_value) = split(element.duration);
                DistanceRow {
                    index,
                    status: element.status.unwrap_or_else(|| "UNKNOWN_ERROR".to_string()),
                    distance_text,
                    distance_value,
                    duration_text,
                    duration_value,
                }
            })
            .collect();

        Ok(rows)
    }
}

fn split(value: Option<TextValue>) -> (Option<String>, Option<u64>) {
    match value {
        Some(tv) => (tv.text, tv.value),
        None => (None, None),
    }
}
