pub mod error;
pub mod format;
pub mod intent;
pub mod models;
pub mod ranking;

pub use error::TravelError;
pub use format::{compose_places_reply, compose_search_reply};
pub use intent::{classify_heuristic, detect_language, is_small_talk, normalize_text, parse_intent_json};
pub use models::*;
pub use ranking::refine;
