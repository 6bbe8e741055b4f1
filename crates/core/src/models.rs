use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TravelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Places,
    Other,
}

impl IntentKind {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "places" | "place" => Self::Places,
            _ => Self::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Places => "places",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Proximity {
    NearMe,
}

impl Proximity {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "near_me" | "near me" | "nearby" => Some(Self::NearMe),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ranking {
    Prominence,
    Best,
}

impl Ranking {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "prominence" => Some(Self::Prominence),
            "best" => Some(Self::Best),
            _ => None,
        }
    }
}

/// Budget tier the classifier extracts from phrasing like "cheap" or
/// "fancy". Carried on the intent and reported in debug output only; the
/// search and ranking stages do not consult it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTier {
    Low,
    Mid,
    High,
}

impl PriceTier {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" | "cheap" | "budget" => Some(Self::Low),
            "mid" | "medium" | "moderate" => Some(Self::Mid),
            "high" | "expensive" | "premium" => Some(Self::High),
            _ => None,
        }
    }
}

/// Structured reading of one user turn. Deserializing rejects a
/// `confidence` outside [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ExtractedIntentRepr")]
pub struct ExtractedIntent {
    pub intent: IntentKind,
    #[serde(default)]
    pub descriptor: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub proximity: Option<Proximity>,
    #[serde(default)]
    pub ranking: Option<Ranking>,
    #[serde(default)]
    pub open_now: Option<bool>,
    #[serde(default)]
    pub price: Option<PriceTier>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub confidence: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractedIntentRepr {
    intent: IntentKind,
    #[serde(default)]
    descriptor: Option<String>,
    #[serde(default)]
    brand: Option<String>,
    #[serde(default)]
    proximity: Option<Proximity>,
    #[serde(default)]
    ranking: Option<Ranking>,
    #[serde(default)]
    open_now: Option<bool>,
    #[serde(default)]
    price: Option<PriceTier>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    confidence: f32,
}

impl TryFrom<ExtractedIntentRepr> for ExtractedIntent {
    type Error = TravelError;

    fn try_from(value: ExtractedIntentRepr) -> Result<Self, Self::Error> {
        if !(0.0..=1.0).contains(&value.confidence) {
            return Err(TravelError::InvalidInput(format!(
                "intent confidence {} outside [0, 1]",
                value.confidence
            )));
        }
        Ok(Self {
            intent: value.intent,
            descriptor: value.descriptor,
            brand: value.brand,
            proximity: value.proximity,
            ranking: value.ranking,
            open_now: value.open_now,
            price: value.price,
            language: value.language,
            confidence: value.confidence,
        })
    }
}

pub const DEFAULT_SEARCH_TERM: &str = "restaurant";

impl ExtractedIntent {
    pub fn other(confidence: f32) -> Self {
        Self {
            intent: IntentKind::Other,
            descriptor: None,
            brand: None,
            proximity: None,
            ranking: None,
            open_now: None,
            price: None,
            language: None,
            confidence,
        }
    }

    pub fn places(descriptor: impl Into<String>) -> Self {
        Self {
            intent: IntentKind::Places,
            descriptor: Some(descriptor.into()),
            ..Self::other(0.7)
        }
    }

    pub fn is_places(&self) -> bool {
        self.intent == IntentKind::Places
    }

    pub fn has_subject(&self) -> bool {
        self.descriptor.is_some() || self.brand.is_some()
    }

    pub fn wants_near(&self) -> bool {
        self.proximity == Some(Proximity::NearMe)
    }

    /// Brand beats descriptor; with neither the search falls back to
    /// [`DEFAULT_SEARCH_TERM`].
    pub fn search_term(&self) -> &str {
        self.brand
            .as_deref()
            .or(self.descriptor.as_deref())
            .unwrap_or(DEFAULT_SEARCH_TERM)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GeoPointRepr")]
pub struct GeoPoint {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct GeoPointRepr {
    lat: f64,
    lng: f64,
}

impl TryFrom<GeoPointRepr> for GeoPoint {
    type Error = TravelError;

    fn try_from(value: GeoPointRepr) -> Result<Self, Self::Error> {
        Self::new(value.lat, value.lng)
    }
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Result<Self, TravelError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(TravelError::InvalidInput(format!(
                "latitude {lat} outside [-90, 90]"
            )));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(TravelError::InvalidInput(format!(
                "longitude {lng} outside [-180, 180]"
            )));
        }
        Ok(Self { lat, lng })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }

    pub fn as_param(&self) -> String {
        format!("{},{}", self.lat, self.lng)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceResult {
    pub name: String,
    #[serde(default)]
    pub place_id: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub price_level: Option<u8>,
    #[serde(default)]
    pub open_now: Option<bool>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub distance_text: Option<String>,
    #[serde(default)]
    pub duration_text: Option<String>,
    #[serde(default)]
    pub distance_value: Option<u64>,
    #[serde(default)]
    pub duration_value: Option<u64>,
}

impl PlaceResult {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_enriched(&self) -> bool {
        self.distance_text.is_some() || self.duration_text.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceDestination {
    Coordinates(GeoPoint),
    PlaceId(String),
}

impl DistanceDestination {
    pub fn as_param(&self) -> String {
        match self {
            Self::Coordinates(point) => point.as_param(),
            Self::PlaceId(id) => format!("place_id:{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceRow {
    pub index: usize,
    pub status: String,
    #[serde(default)]
    pub distance_text: Option<String>,
    #[serde(default)]
    pub distance_value: Option<u64>,
    #[serde(default)]
    pub duration_text: Option<String>,
    #[serde(default)]
    pub duration_value: Option<u64>,
}

impl DistanceRow {
    pub fn is_ok(&self) -> bool {
        self.status == "OK"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageGuess {
    pub language: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
    pub confidence: f32,
    pub needs_translation: bool,
}

impl TranslationResult {
    pub fn passthrough(text: &str, language: &str, confidence: f32) -> Self {
        Self {
            translated_text: text.to_string(),
            source_language: language.to_string(),
            target_language: language.to_string(),
            confidence,
            needs_translation: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebDocument {
    pub title: String,
    pub url: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSearchResponse {
    pub query: String,
    pub results: Vec<WebDocument>,
    #[serde(default)]
    pub answer: Option<String>,
}

impl WebSearchResponse {
    pub fn empty(query: &str) -> Self {
        Self {
            query: query.to_string(),
            results: Vec::new(),
            answer: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
    System,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnRequest {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub previous_intent: Option<ExtractedIntent>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnReply {
    pub content: String,
    pub debug: Option<Value>,
    pub usage: TokenUsage,
}
