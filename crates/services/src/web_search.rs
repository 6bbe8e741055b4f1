use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use wayfinder_core::{TravelError, WebDocument, WebSearchResponse};

use crate::config::TAVILY_KEY_VAR;
use crate::http::{build_client, trim_base_url, ServiceCodes};
use crate::WebSearch;

const DEFAULT_BASE_URL: &str = "https://api.tavily.com";
const MAX_RESULTS: u32 = 5;

const CODES: ServiceCodes = ServiceCodes {
    service: "tavily",
    status: "TAVILY_API_ERROR",
    timeout: "TAVILY_TIMEOUT",
    network: "TAVILY_NETWORK_ERROR",
};

#[derive(Debug, Clone)]
pub struct TavilyClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
    answer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: Option<String>,
    url: Option<String>,
    content: Option<String>,
}

impl TavilyClient {
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
}

impl WebSearch for TavilyClient {
    async fn search(&self, query: &str) -> Result<WebSearchResponse, TravelError> {
        let api_key = self.api_key.as_deref().ok_or(TravelError::Configuration {
            credential: TAVILY_KEY_VAR,
        })?;

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&json!({
                "api_key": api_key,
                "query": query,
                "max_results": MAX_RESULTS,
                "search_depth": "basic",
                "include_answer": true,
            }))
            .send()
            .await
            .map_err(|e| CODES.transport(e))?;

        if !response.status().is_success() {
            return Err(CODES.upstream(response).await);
        }

        let parsed: TavilyResponse = response.json().await.map_err(|e| CODES.transport(e))?;
        let results = parsed
            .results
            .into_iter()
            .map(|item| WebDocument {
                title: item.title.unwrap_or_else(|| "Untitled".to_string()),
                url: item.url.unwrap_or_default(),
                content: item.content.unwrap_or_default(),
            })
            .collect();

        Ok(WebSearchResponse {
            query: query.to_string(),
            results,
            answer: parsed.answer.filter(|answer| !answer.trim().is_empty()),
        })
    }
}
