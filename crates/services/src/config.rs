use std::env::VarError;

use wayfinder_core::{GeoPoint, TravelError};

pub const GROQ_KEY_VAR: &str = "WAYFINDER_GROQ_API_KEY";
pub const OPENAI_KEY_VAR: &str = "WAYFINDER_OPENAI_API_KEY";
pub const GOOGLE_MAPS_KEY_VAR: &str = "WAYFINDER_GOOGLE_MAPS_API_KEY";
pub const TAVILY_KEY_VAR: &str = "WAYFINDER_TAVILY_API_KEY";

const DEFAULT_GROQ_MODEL: &str = "llama-3.1-8b-instant";
const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

// Kuwait City
const DEFAULT_LAT: f64 = 29.3759;
const DEFAULT_LNG: f64 = 47.9774;

/// Which classifier tier a turn goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierMode {
    /// LLM tier when a credential is present, heuristic otherwise.
    Auto,
    /// LLM tier only; a missing credential fails the turn.
    Llm,
    Heuristic,
}

impl ClassifierMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "" | "auto" => Some(Self::Auto),
            "llm" | "groq" | "remote" => Some(Self::Llm),
            "heuristic" | "rules" | "offline" => Some(Self::Heuristic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub groq_api_key: Option<String>,
    pub groq_model: String,
    pub groq_base_url: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub google_maps_api_key: Option<String>,
    pub tavily_api_key: Option<String>,
    pub classifier_mode: ClassifierMode,
    pub debug_language: bool,
    pub tool_server_url: Option<String>,
    pub default_location: GeoPoint,
}

impl Settings {
    /// Loads `.env` (when present) and then reads the process environment.
    pub fn load() -> Result<Self, TravelError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key))
    }

    /// Parses settings through `lookup`, so tests can feed a map instead of
    /// mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, TravelError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let optional = |key: &str| {
            lookup(key)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let or_default = |key: &str, default: &str| optional(key).unwrap_or_else(|| default.to_string());

        let classifier_mode = match optional("WAYFINDER_CLASSIFIER") {
            Some(raw) => ClassifierMode::parse(&raw).ok_or_else(|| {
                TravelError::InvalidInput(format!(
                    "WAYFINDER_CLASSIFIER must be auto, llm or heuristic (got {raw})"
                ))
            })?,
            None => ClassifierMode::Auto,
        };

        let parse_coord = |key: &str, default: f64| -> Result<f64, TravelError> {
            match optional(key) {
                Some(raw) => raw
                    .parse::<f64>()
                    .map_err(|e| TravelError::InvalidInput(format!("{key}: {e}"))),
                None => Ok(default),
            }
        };
        let default_location = GeoPoint::new(
            parse_coord("WAYFINDER_DEFAULT_LAT", DEFAULT_LAT)?,
            parse_coord("WAYFINDER_DEFAULT_LNG", DEFAULT_LNG)?,
        )?;

        let debug_language = optional("WAYFINDER_DEBUG_LANGUAGE")
            .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);

        Ok(Self {
            groq_api_key: optional(GROQ_KEY_VAR),
            groq_model: or_default("WAYFINDER_GROQ_MODEL", DEFAULT_GROQ_MODEL),
            groq_base_url: or_default("WAYFINDER_GROQ_BASE_URL", DEFAULT_GROQ_BASE_URL),
            openai_api_key: optional(OPENAI_KEY_VAR),
            openai_model: or_default("WAYFINDER_OPENAI_MODEL", DEFAULT_OPENAI_MODEL),
            openai_base_url: or_default("WAYFINDER_OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
            google_maps_api_key: optional(GOOGLE_MAPS_KEY_VAR),
            tavily_api_key: optional(TAVILY_KEY_VAR),
            classifier_mode,
            debug_language,
            tool_server_url: optional("WAYFINDER_TOOL_SERVER_URL"),
            default_location,
        })
    }
}
