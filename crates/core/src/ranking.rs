use crate::models::{ExtractedIntent, PlaceResult};

/// Applies the open-now filter, then the rating sort when the intent asks
/// for the best places. Both stages are order-preserving for ties, so the
/// transform is idempotent.
pub fn refine(places: Vec<PlaceResult>, intent: &ExtractedIntent) -> Vec<PlaceResult> {
    let mut places = filter_open_now(places, intent.open_now);
    if intent.ranking.is_some() {
        rank_by_rating(&mut places);
    }
    places
}

fn filter_open_now(places: Vec<PlaceResult>, wanted: Option<bool>) -> Vec<PlaceResult> {
    match wanted {
        Some(wanted) => places
            .into_iter()
            .filter(|place| place.open_now == Some(wanted))
            .collect(),
        None => places,
    }
}

fn rank_by_rating(places: &mut [PlaceResult]) {
    // sort_by is stable; equal ratings keep search order.
    places.sort_by(|a, b| {
        let a = a.rating.unwrap_or(0.0);
        let b = b.rating.unwrap_or(0.0);
        b.total_cmp(&a)
    });
}
