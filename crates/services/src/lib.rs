//! External collaborators for a travel turn: places search, distance matrix,
//! web search, language handling and the chat-completions model behind the
//! classifier.
//!
//! Each capability is a trait so the orchestrator can run against local API
//! clients, a remote tool server, or test fakes.

use std::future::Future;

use wayfinder_core::{
    DistanceDestination, DistanceRow, GeoPoint, PlaceResult, TranslationResult, TravelError,
    WebSearchResponse,
};

pub mod config;
pub mod distance;
mod http;
pub mod llm;
pub mod places;
pub mod remote;
pub mod translation;
pub mod web_search;

pub use config::{
    ClassifierMode, Settings, GOOGLE_MAPS_KEY_VAR, GROQ_KEY_VAR, OPENAI_KEY_VAR, TAVILY_KEY_VAR,
};
pub use distance::DistanceMatrixClient;
pub use llm::{ChatCompletionsClient, CompletionRequest, LlmMessage};
pub use places::{place_type_for, GooglePlacesClient};
pub use remote::{RemoteToolClient, ToolBackend};
pub use translation::LanguageService;
pub use web_search::TavilyClient;

pub trait ChatModel: Send + Sync {
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<String, TravelError>> + Send;
}

pub trait PlacesProvider: Send + Sync {
    /// Free-text search, optionally biased towards a circle.
    fn text_search(
        &self,
        query: &str,
        bias: Option<GeoPoint>,
        radius_m: u32,
    ) -> impl Future<Output = Result<Vec<PlaceResult>, TravelError>> + Send;

    /// Search restricted to a circle around `center`.
    fn nearby_search(
        &self,
        query: &str,
        center: GeoPoint,
        radius_m: u32,
    ) -> impl Future<Output = Result<Vec<PlaceResult>, TravelError>> + Send;
}

pub trait DistanceProvider: Send + Sync {
    /// Rows come back in destination order; `DistanceRow::index` points into
    /// `destinations`.
    fn distance_matrix(
        &self,
        origin: GeoPoint,
        destinations: &[DistanceDestination],
    ) -> impl Future<Output = Result<Vec<DistanceRow>, TravelError>> + Send;
}

pub trait WebSearch: Send + Sync {
    fn search(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<WebSearchResponse, TravelError>> + Send;
}

pub trait Translator: Send + Sync {
    /// Rewrites `response` into the language `user_text` was written in.
    fn ensure_language_consistency(
        &self,
        user_text: &str,
        response: &str,
    ) -> impl Future<Output = Result<TranslationResult, TravelError>> + Send;
}

/// Every tool a turn may call, wired from [`Settings`].
#[derive(Debug, Clone)]
pub struct ServiceHub {
    places: ToolBackend<GooglePlacesClient>,
    distance: ToolBackend<DistanceMatrixClient>,
    web: ToolBackend<TavilyClient>,
    language: ToolBackend<LanguageService>,
}

impl ServiceHub {
    /// Routes every tool through the tool server when one is configured and
    /// through the direct API clients otherwise.
    pub fn from_settings(settings: &Settings) -> Result<Self, TravelError> {
        if let Some(url) = settings.tool_server_url.as_deref() {
            let remote = RemoteToolClient::new(url)?;
            return Ok(Self {
                places: ToolBackend::Remote(remote.clone()),
                distance: ToolBackend::Remote(remote.clone()),
                web: ToolBackend::Remote(remote.clone()),
                language: ToolBackend::Remote(remote),
            });
        }

        let translator = settings
            .openai_api_key
            .as_deref()
            .map(|key| {
                ChatCompletionsClient::new(
                    "openai",
                    key,
                    &settings.openai_model,
                    &settings.openai_base_url,
                )
            })
            .transpose()?;

        Ok(Self {
            places: ToolBackend::Local(GooglePlacesClient::new(
                settings.google_maps_api_key.clone(),
            )?),
            distance: ToolBackend::Local(DistanceMatrixClient::new(
                settings.google_maps_api_key.clone(),
            )?),
            web: ToolBackend::Local(TavilyClient::new(settings.tavily_api_key.clone())?),
            language: ToolBackend::Local(LanguageService::new(
                translator,
                settings.debug_language,
            )),
        })
    }
}

/// Builds the classifier's chat model from the Groq settings, or `None` when
/// no key is configured.
pub fn classifier_model(settings: &Settings) -> Result<Option<ChatCompletionsClient>, TravelError> {
    settings
        .groq_api_key
        .as_deref()
        .map(|key| {
            ChatCompletionsClient::new("groq", key, &settings.groq_model, &settings.groq_base_url)
        })
        .transpose()
}

impl PlacesProvider for ServiceHub {
    async fn text_search(
        &self,
        query: &str,
        bias: Option<GeoPoint>,
        radius_m: u32,
    ) -> Result<Vec<PlaceResult>, TravelError> {
        self.places.text_search(query, bias, radius_m).await
    }

    async fn nearby_search(
        &self,
        query: &str,
        center: GeoPoint,
        radius_m: u32,
    ) -> Result<Vec<PlaceResult>, TravelError> {
        self.places.nearby_search(query, center, radius_m).await
    }
}

impl DistanceProvider for ServiceHub {
    async fn distance_matrix(
        &self,
        origin: GeoPoint,
        destinations: &[DistanceDestination],
    ) -> Result<Vec<DistanceRow>, TravelError> {
        self.distance.distance_matrix(origin, destinations).await
    }
}

impl WebSearch for ServiceHub {
    async fn search(&self, query: &str) -> Result<WebSearchResponse, TravelError> {
        self.web.search(query).await
    }
}

impl Translator for ServiceHub {
    async fn ensure_language_consistency(
        &self,
        user_text: &str,
        response: &str,
    ) -> Result<TranslationResult, TravelError> {
        self.language
            .ensure_language_consistency(user_text, response)
            .await
    }
}
