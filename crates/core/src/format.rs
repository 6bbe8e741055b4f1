use crate::models::{PlaceResult, WebDocument, WebSearchResponse};

pub const GREETING_REPLY: &str =
    "Hi there! I can recommend places, events, or general travel tips. What are you in the mood for?";
pub const NO_PLACES_REPLY: &str = "I couldn't find matching places right now.";
pub const NO_SEARCH_REPLY: &str = "I couldn't find any helpful information yet.";

const PLACES_HEADER: &str = "Here are some places you might like:\n";
const SEARCH_HEADER: &str = "Here is what I found:\n";

pub fn compose_places_reply(places: &[PlaceResult]) -> String {
    if places.is_empty() {
        return NO_PLACES_REPLY.to_string();
    }

    let body = places
        .iter()
        .enumerate()
        .map(|(idx, place)| format_place(idx + 1, place))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{PLACES_HEADER}{body}")
}

pub fn compose_search_reply(response: &WebSearchResponse) -> String {
    if response.results.is_empty() {
        return NO_SEARCH_REPLY.to_string();
    }

    let body = response
        .results
        .iter()
        .enumerate()
        .map(|(idx, doc)| format_document(idx + 1, doc))
        .collect::<Vec<_>>()
        .join("\n\n");

    match response.answer.as_deref().filter(|a| !a.trim().is_empty()) {
        Some(answer) => format!("{answer}\n\n{SEARCH_HEADER}{body}"),
        None => format!("{SEARCH_HEADER}{body}"),
    }
}

pub fn format_place(index: usize, place: &PlaceResult) -> String {
    let rating = place
        .rating
        .map(|r| format!("{r:.1}★"))
        .unwrap_or_else(|| "Rating unavailable".to_string());
    let status = match place.open_now {
        Some(true) => "Open now",
        Some(false) => "Closed now",
        None => "Hours unavailable",
    };
    let distance_line = match (&place.duration_text, &place.distance_text) {
        (Some(duration), Some(distance)) => format!("\n  ⏱ {duration} · 📍 {distance}"),
        _ => String::new(),
    };

    format!(
        "{index}. {}\n  {}\n  Rating: {rating}\n  Budget: {}\n  Status: {status}{distance_line}\n  Map: {}",
        place.name,
        place.address.as_deref().unwrap_or("Address unavailable"),
        price_label(place.price_level),
        place.url.as_deref().unwrap_or("N/A"),
    )
}

fn format_document(index: usize, doc: &WebDocument) -> String {
    format!("{index}. {}\n   {}\n   {}", doc.title, doc.content, doc.url)
}

fn price_label(level: Option<u8>) -> &'static str {
    match level {
        Some(0) => "free",
        Some(1) => "low",
        Some(2) => "mid",
        Some(3) => "high",
        Some(4) => "premium",
        _ => "unknown",
    }
}
