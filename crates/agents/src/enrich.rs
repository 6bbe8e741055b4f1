use std::sync::Arc;

use tracing::{debug, warn};
use wayfinder_core::{DistanceDestination, DistanceRow, GeoPoint, PlaceResult, TravelError};
use wayfinder_observability::AppMetrics;
use wayfinder_services::DistanceProvider;

/// Adds driving distance and duration to search results with one batched
/// distance-matrix call.
pub struct DistanceEnricher<D> {
    provider: Arc<D>,
    metrics: Arc<AppMetrics>,
}

impl<D: DistanceProvider> DistanceEnricher<D> {
    pub fn new(provider: Arc<D>, metrics: Arc<AppMetrics>) -> Self {
        Self { provider, metrics }
    }

    /// Never fails and never drops or reorders places. Only rows with status
    /// `OK` are copied; on any failure the input comes back untouched.
    pub async fn enrich(&self, mut places: Vec<PlaceResult>, origin: GeoPoint) -> Vec<PlaceResult> {
        if places.is_empty() {
            return places;
        }

        // Id-less places measure against the origin itself.
        let destinations: Vec<DistanceDestination> = places
            .iter()
            .map(|place| match &place.place_id {
                Some(id) => DistanceDestination::PlaceId(id.clone()),
                None => DistanceDestination::Coordinates(origin),
            })
            .collect();

        let outcome = match self.provider.distance_matrix(origin, &destinations).await {
            Ok(rows) => apply_rows(&mut places, &rows),
            Err(err) => Err(TravelError::Enrichment(err.to_string())),
        };
        if let Err(err) = outcome {
            warn!(error = %err, "returning places without distances");
            self.metrics.inc_enrichment_failure();
        }
        places
    }
}

fn apply_rows(places: &mut [PlaceResult], rows: &[DistanceRow]) -> Result<(), TravelError> {
    if let Some(row) = rows.iter().find(|row| row.index >= places.len()) {
        return Err(TravelError::Enrichment(format!(
            "row index {} outside {} destinations",
            row.index,
            places.len()
        )));
    }

    for row in rows {
        if !row.is_ok() {
            debug!(index = row.index, status = %row.status, "no distance for place");
            continue;
        }
        let place = &mut places[row.index];
        place.distance_text = row.distance_text.clone();
        place.duration_text = row.duration_text.clone();
        place.distance_value = row.distance_value;
        place.duration_value = row.duration_value;
    }
    Ok(())
}
