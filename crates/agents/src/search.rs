use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use wayfinder_core::{ExtractedIntent, GeoPoint, PlaceResult, TravelError};
use wayfinder_observability::AppMetrics;
use wayfinder_services::PlacesProvider;

/// Radii tried in order until one returns something.
pub const RADIUS_LADDER_M: [u32; 4] = [2500, 5000, 10_000, 15_000];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Nearby,
    Text,
}

impl SearchMode {
    pub fn tool_name(self) -> &'static str {
        match self {
            Self::Nearby => "places_nearby_search",
            Self::Text => "places_text_search",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub query: String,
    pub mode: SearchMode,
    pub radii_attempted: Vec<u32>,
    pub places: Vec<PlaceResult>,
}

/// A search that ended on an error, with the ladder position it reached.
#[derive(Debug)]
pub struct SearchFailure {
    pub mode: SearchMode,
    pub radii_attempted: Vec<u32>,
    pub error: TravelError,
}

pub struct PlaceSearchStrategy<P> {
    provider: Arc<P>,
    metrics: Arc<AppMetrics>,
}

impl<P: PlacesProvider> PlaceSearchStrategy<P> {
    pub fn new(provider: Arc<P>, metrics: Arc<AppMetrics>) -> Self {
        Self { provider, metrics }
    }

    /// Walks [`RADIUS_LADDER_M`] and stops at the first radius with results.
    ///
    /// Nearby search is used for `near_me` intents when a location is known.
    /// Its upstream and transport failures count as an empty radius, while
    /// text search failures end the walk.
    pub async fn search(
        &self,
        intent: &ExtractedIntent,
        location: Option<GeoPoint>,
    ) -> Result<SearchOutcome, SearchFailure> {
        let query = intent.search_term().to_string();
        let center = location.filter(|_| intent.wants_near());
        let mode = if center.is_some() {
            SearchMode::Nearby
        } else {
            SearchMode::Text
        };
        self.metrics.inc_places_search();

        let mut radii_attempted = Vec::with_capacity(RADIUS_LADDER_M.len());
        let mut places = Vec::new();
        for radius in RADIUS_LADDER_M {
            radii_attempted.push(radius);
            let attempt = match center {
                Some(center) => self.provider.nearby_search(&query, center, radius).await,
                None => self.provider.text_search(&query, location, radius).await,
            };
            let found = match attempt {
                Ok(found) => found,
                Err(err) if mode == SearchMode::Nearby && !err.is_configuration() => {
                    warn!(error = %err, radius, "nearby search failed, widening");
                    Vec::new()
                }
                Err(error) => {
                    self.metrics.add_radius_attempts(radii_attempted.len());
                    return Err(SearchFailure {
                        mode,
                        radii_attempted,
                        error,
                    });
                }
            };
            if !found.is_empty() {
                places = found;
                break;
            }
        }
        self.metrics.add_radius_attempts(radii_attempted.len());

        info!(
            query = %query,
            mode = mode.tool_name(),
            radii = radii_attempted.len(),
            found = places.len(),
            "place search finished"
        );
        Ok(SearchOutcome {
            query,
            mode,
            radii_attempted,
            places,
        })
    }
}
