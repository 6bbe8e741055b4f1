use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::error::TravelError;
use crate::models::{
    ExtractedIntent, IntentKind, LanguageGuess, PriceTier, Proximity, Ranking,
};

const PLACE_KEYWORDS: &[&str] = &[
    "restaurant",
    "coffee",
    "cafe",
    "hotel",
    "shop",
    "store",
    "mall",
    "park",
    "museum",
    "food",
    "dinner",
    "lunch",
    "breakfast",
    "bar",
    "club",
    "gym",
];

const QUESTION_WORDS: &[&str] = &[
    "what", "where", "when", "who", "why", "how", "which", "find", "show", "list",
];

static BRAND_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z][a-zA-Z]+").expect("brand token pattern"));
static NEAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)near\s+(me|by|here|[a-z ]+)").expect("near pattern"));
static BEST_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)best|top|popular|famous").expect("best pattern"));
static OPEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)open now|open late").expect("open pattern"));

static GREETING_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(hi|hello|hey|yo|salam|salaam|مرحبا|هلا|أهلين|good (morning|afternoon|evening))\b",
    )
    .expect("greeting pattern")
});
static ACK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(how are you|thanks|thank you|ok|okay|got it|شكرا|تسلم)\b")
        .expect("acknowledgement pattern")
});

pub fn normalize_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Greetings and short acknowledgements, English plus a few Arabic tokens.
pub fn is_small_talk(text: &str) -> bool {
    let text = text.trim();
    GREETING_PATTERN.is_match(text) || ACK_PATTERN.is_match(text)
}

pub fn detect_language(text: &str) -> LanguageGuess {
    let mut hebrew_count = 0usize;
    let mut arabic_count = 0usize;
    let mut cyrillic_count = 0usize;
    let mut latin_count = 0usize;

    for ch in text.chars() {
        let code = ch as u32;
        if (0x0590..=0x05FF).contains(&code) {
            hebrew_count += 1;
        } else if (0x0600..=0x06FF).contains(&code) {
            arabic_count += 1;
        } else if (0x0400..=0x04FF).contains(&code) {
            cyrillic_count += 1;
        } else if ch.is_ascii_alphabetic() {
            latin_count += 1;
        }
    }

    let (language, confidence) = if arabic_count > 0 {
        ("ar", 0.9)
    } else if hebrew_count > latin_count {
        ("he", 0.9)
    } else if cyrillic_count > latin_count {
        ("ru", 0.9)
    } else if text.trim().is_empty() {
        ("en", 0.0)
    } else {
        ("en", 0.6)
    };

    LanguageGuess {
        language: language.to_string(),
        confidence,
    }
}

/// Deterministic, offline reading of a user turn.
///
/// The first place keyword becomes the descriptor and the first capitalized
/// token outside [`QUESTION_WORDS`] becomes the brand. When the new text names
/// neither, the previous turn's descriptor and brand stay in effect.
pub fn classify_heuristic(query: &str, previous: Option<&ExtractedIntent>) -> ExtractedIntent {
    let normalized = query.trim().to_lowercase();
    if normalized.is_empty() {
        return ExtractedIntent::other(0.0);
    }

    let keyword = normalized
        .split(|ch: char| !(ch.is_ascii_lowercase() || ch.is_ascii_digit()))
        .find(|word| PLACE_KEYWORDS.contains(word))
        .map(ToString::to_string);

    let brand_token = BRAND_TOKEN
        .find_iter(query)
        .map(|m| m.as_str())
        .find(|token| !QUESTION_WORDS.contains(&token.to_lowercase().as_str()))
        .map(ToString::to_string);

    let carries_context = keyword.is_none() && brand_token.is_none();
    let descriptor = keyword.or_else(|| previous.and_then(|p| p.descriptor.clone()));
    let brand = match brand_token {
        Some(token) => Some(token),
        None if carries_context => previous.and_then(|p| p.brand.clone()),
        None => None,
    };

    let proximity = NEAR_PATTERN
        .is_match(&normalized)
        .then_some(Proximity::NearMe);
    let ranking = BEST_PATTERN
        .is_match(&normalized)
        .then_some(Ranking::Prominence);
    let open_now = OPEN_PATTERN.is_match(&normalized).then_some(true);

    let is_places = descriptor.is_some() || brand.is_some();
    let mut confidence: f32 = if is_places { 0.7 } else { 0.4 };
    if let Some(prev) = previous {
        if prev.is_places() && is_places {
            confidence = confidence.max(prev.confidence * 0.9).clamp(0.0, 1.0);
        }
    }

    ExtractedIntent {
        intent: if is_places {
            IntentKind::Places
        } else {
            IntentKind::Other
        },
        descriptor,
        brand,
        proximity,
        ranking,
        open_now,
        price: None,
        language: None,
        confidence,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIntent {
    intent: Option<String>,
    descriptor: Option<String>,
    brand: Option<String>,
    proximity: Option<String>,
    ranking: Option<String>,
    #[serde(alias = "open_now")]
    open_now: Option<bool>,
    price: Option<String>,
    language: Option<String>,
    confidence: Option<f64>,
}

/// Reads the JSON object the LLM tier was asked to produce.
///
/// Unknown enum strings become `None` rather than failing the parse; only a
/// missing `intent` field or malformed JSON is an error.
pub fn parse_intent_json(content: &str) -> Result<ExtractedIntent, TravelError> {
    let raw: RawIntent =
        serde_json::from_str(content.trim()).map_err(|e| TravelError::parse("intent JSON", e))?;

    let intent = raw
        .intent
        .as_deref()
        .map(IntentKind::parse)
        .ok_or_else(|| TravelError::parse("intent JSON", "missing `intent` field"))?;

    Ok(ExtractedIntent {
        intent,
        descriptor: clean(raw.descriptor),
        brand: clean(raw.brand),
        proximity: raw.proximity.as_deref().and_then(Proximity::parse),
        ranking: raw.ranking.as_deref().and_then(Ranking::parse),
        open_now: raw.open_now,
        price: raw.price.as_deref().and_then(PriceTier::parse),
        language: clean(raw.language),
        confidence: raw.confidence.unwrap_or(0.0).clamp(0.0, 1.0) as f32,
    })
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
}
