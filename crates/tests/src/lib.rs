//! Shared fixtures for the end-to-end tests under `tests/`.

use std::collections::HashMap;
use std::env::VarError;

use axum::Router;
use wayfinder_api::{build_app, ApiConfig};
use wayfinder_services::Settings;

/// Builds the full router from an explicit environment map; nothing is read
/// from the process environment.
pub fn app_with_env(pairs: &[(&str, &str)]) -> Router {
    let env: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    let lookup = |key: &str| env.get(key).cloned().ok_or(VarError::NotPresent);

    let settings = Settings::from_lookup(lookup).expect("test settings should parse");
    build_app(&settings, ApiConfig::from_lookup(lookup)).expect("app should build")
}

/// Offline app: heuristic classifier and no credentials at all.
pub fn offline_app() -> Router {
    app_with_env(&[("WAYFINDER_CLASSIFIER", "heuristic")])
}
