//! Tool-server transport. Every capability becomes a `POST /tools/{name}`
//! carrying `{"arguments": ...}` and answering `{"result": ...}`.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use wayfinder_core::{
    DistanceDestination, DistanceRow, GeoPoint, PlaceResult, TranslationResult, TravelError,
    WebSearchResponse,
};

use crate::http::{build_client, trim_base_url, ServiceCodes};
use crate::{DistanceProvider, PlacesProvider, Translator, WebSearch};

const CODES: ServiceCodes = ServiceCodes {
    service: "tool server",
    status: "TOOL_SERVER_ERROR",
    timeout: "TOOL_SERVER_TIMEOUT",
    network: "TOOL_SERVER_NETWORK_ERROR",
};

#[derive(Debug, Clone)]
pub struct RemoteToolClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ToolEnvelope<T> {
    result: T,
}

impl RemoteToolClient {
    pub fn new(base_url: &str) -> Result<Self, TravelError> {
        Ok(Self {
            client: build_client(Duration::from_secs(30))?,
            base_url: trim_base_url(base_url),
        })
    }

    pub async fn call<T: DeserializeOwned>(
        &self,
        tool: &str,
        arguments: Value,
    ) -> Result<T, TravelError> {
        debug!(tool, "calling tool server");
        let response = self
            .client
            .post(format!("{}/tools/{tool}", self.base_url))
            .json(&json!({ "arguments": arguments }))
            .send()
            .await
            .map_err(|e| CODES.transport(e))?;

        if !response.status().is_success() {
            return Err(CODES.upstream(response).await);
        }

        let envelope: ToolEnvelope<T> = response.json().await.map_err(|e| CODES.transport(e))?;
        Ok(envelope.result)
    }
}

impl PlacesProvider for RemoteToolClient {
    async fn text_search(
        &self,
        query: &str,
        bias: Option<GeoPoint>,
        radius_m: u32,
    ) -> Result<Vec<PlaceResult>, TravelError> {
        self.call(
            "places_text_search",
            json!({ "query": query, "location": bias, "radius_m": radius_m }),
        )
        .await
    }

    async fn nearby_search(
        &self,
        query: &str,
        center: GeoPoint,
        radius_m: u32,
    ) -> Result<Vec<PlaceResult>, TravelError> {
        self.call(
            "places_nearby_search",
            json!({ "query": query, "location": center, "radius_m": radius_m }),
        )
        .await
    }
}

impl DistanceProvider for RemoteToolClient {
    async fn distance_matrix(
        &self,
        origin: GeoPoint,
        destinations: &[DistanceDestination],
    ) -> Result<Vec<DistanceRow>, TravelError> {
        if destinations.is_empty() {
            return Ok(Vec::new());
        }
        let destinations: Vec<String> = destinations.iter().map(DistanceDestination::as_param).collect();
        self.call(
            "distance_matrix",
            json!({ "origin": origin, "destinations": destinations }),
        )
        .await
    }
}

impl WebSearch for RemoteToolClient {
    async fn search(&self, query: &str) -> Result<WebSearchResponse, TravelError> {
        self.call("web_search", json!({ "query": query })).await
    }
}

impl Translator for RemoteToolClient {
    async fn ensure_language_consistency(
        &self,
        user_text: &str,
        response: &str,
    ) -> Result<TranslationResult, TravelError> {
        self.call(
            "ensure_language_consistency",
            json!({ "user_text": user_text, "response": response }),
        )
        .await
    }
}

/// A capability served either by a direct API client or by the tool server.
#[derive(Debug, Clone)]
pub enum ToolBackend<L> {
    Local(L),
    Remote(RemoteToolClient),
}

impl<L: PlacesProvider> PlacesProvider for ToolBackend<L> {
    async fn text_search(
        &self,
        query: &str,
        bias: Option<GeoPoint>,
        radius_m: u32,
    ) -> Result<Vec<PlaceResult>, TravelError> {
        match self {
            Self::Local(local) => local.text_search(query, bias, radius_m).await,
            Self::Remote(remote) => remote.text_search(query, bias, radius_m).await,
        }
    }

    async fn nearby_search(
        &self,
        query: &str,
        center: GeoPoint,
        radius_m: u32,
    ) -> Result<Vec<PlaceResult>, TravelError> {
        match self {
            Self::Local(local) => local.nearby_search(query, center, radius_m).await,
            Self::Remote(remote) => remote.nearby_search(query, center, radius_m).await,
        }
    }
}

impl<L: DistanceProvider> DistanceProvider for ToolBackend<L> {
    async fn distance_matrix(
        &self,
        origin: GeoPoint,
        destinations: &[DistanceDestination],
    ) -> Result<Vec<DistanceRow>, TravelError> {
        match self {
            Self::Local(local) => local.distance_matrix(origin, destinations).await,
            Self::Remote(remote) => remote.distance_matrix(origin, destinations).await,
        }
    }
}

impl<L: WebSearch> WebSearch for ToolBackend<L> {
    async fn search(&self, query: &str) -> Result<WebSearchResponse, TravelError> {
        match self {
            Self::Local(local) => local.search(query).await,
            Self::Remote(remote) => remote.search(query).await,
        }
    }
}

impl<L: Translator> Translator for ToolBackend<L> {
    async fn ensure_language_consistency(
        &self,
        user_text: &str,
        response: &str,
    ) -> Result<TranslationResult, TravelError> {
        match self {
            Self::Local(local) => local.ensure_language_consistency(user_text, response).await,
            Self::Remote(remote) => remote.ensure_language_consistency(user_text, response).await,
        }
    }
}
