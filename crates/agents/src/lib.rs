use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use wayfinder_core::format::GREETING_REPLY;
use wayfinder_core::{
    compose_places_reply, compose_search_reply, is_small_talk, normalize_text, refine, ChatMessage,
    ChatRole, ExtractedIntent, GeoPoint, TokenUsage, TravelError, TurnReply, TurnRequest,
    WebSearchResponse,
};
use wayfinder_observability::AppMetrics;
use wayfinder_services::{
    ChatCompletionsClient, ChatModel, DistanceProvider, PlacesProvider, Translator, WebSearch,
};

pub mod classifier;
pub mod enrich;
pub mod search;

pub use classifier::{IntentClassifier, RemoteClassification};
pub use enrich::DistanceEnricher;
pub use search::{PlaceSearchStrategy, SearchFailure, SearchMode, SearchOutcome, RADIUS_LADDER_M};

const WEB_SEARCH_TOOL: &str = "web_search";

/// Everything a turn may reach out to.
pub trait TravelTools: PlacesProvider + DistanceProvider + WebSearch + Translator {}

impl<T> TravelTools for T where T: PlacesProvider + DistanceProvider + WebSearch + Translator {}

/// Runs one conversational turn: small-talk short-circuit, intent
/// classification, then either the places pipeline or a web search, and
/// finally a language-consistency pass.
pub struct TravelAgent<B, M = ChatCompletionsClient> {
    classifier: IntentClassifier<M>,
    search: PlaceSearchStrategy<B>,
    enricher: DistanceEnricher<B>,
    tools: Arc<B>,
    metrics: Arc<AppMetrics>,
    default_location: GeoPoint,
}

/// What one branch of a turn produced before translation.
struct Drafted {
    content: String,
    debug: Value,
}

impl<B, M> TravelAgent<B, M>
where
    B: TravelTools,
    M: ChatModel,
{
    pub fn new(
        tools: Arc<B>,
        classifier: IntentClassifier<M>,
        metrics: Arc<AppMetrics>,
        default_location: GeoPoint,
    ) -> Self {
        Self {
            classifier,
            search: PlaceSearchStrategy::new(tools.clone(), metrics.clone()),
            enricher: DistanceEnricher::new(tools.clone(), metrics.clone()),
            tools,
            metrics,
            default_location,
        }
    }

    #[instrument(skip(self, request), fields(debug = request.debug, history = request.messages.len()))]
    pub async fn handle_turn(&self, request: TurnRequest) -> Result<TurnReply, TravelError> {
        let started = Instant::now();
        self.metrics.inc_turn();
        let reply = self.run_turn(request).await;
        self.metrics.observe_latency(started.elapsed());
        reply
    }

    async fn run_turn(&self, request: TurnRequest) -> Result<TurnReply, TravelError> {
        let text = utterance(&request);
        if is_small_talk(&text) {
            self.metrics.inc_small_talk();
            info!("small talk answered");
            return Ok(TurnReply {
                content: GREETING_REPLY.to_string(),
                debug: request.debug.then(|| json!({ "mode": "greeting" })),
                usage: TokenUsage::default(),
            });
        }

        let previous = match request.previous_intent.clone() {
            Some(previous) => Some(previous),
            None => self.intent_from_history(&request.messages).await?,
        };
        let intent = self.classifier.classify(&text, previous.as_ref()).await?;
        let location = request.location.unwrap_or(self.default_location);

        let drafted = if intent.is_places() {
            self.places_branch(&intent, location).await?
        } else {
            self.search_branch(&text).await
        };

        let consistency = self
            .tools
            .ensure_language_consistency(&text, &drafted.content)
            .await;
        let (content, translation) = match consistency {
            Ok(translation) => (
                translation.translated_text.clone(),
                json!({
                    "sourceLanguage": translation.source_language,
                    "targetLanguage": translation.target_language,
                    "needsTranslation": translation.needs_translation,
                    "confidence": translation.confidence,
                }),
            ),
            Err(err) => {
                warn!(error = %err, "language pass failed, keeping drafted reply");
                (drafted.content, Value::Null)
            }
        };

        info!(
            intent = intent.intent.as_str(),
            confidence = intent.confidence,
            classifier = ?self.classifier.mode(),
            "turn handled"
        );

        let debug = request.debug.then(|| {
            let mut payload = drafted.debug;
            payload["intent"] = json!(intent);
            payload["location"] = json!(location);
            payload["translation"] = translation;
            payload
        });

        Ok(TurnReply {
            content,
            debug,
            usage: TokenUsage::default(),
        })
    }

    /// Reads the latest user message in the history without any context of
    /// its own, so it can serve as the previous turn.
    async fn intent_from_history(
        &self,
        messages: &[ChatMessage],
    ) -> Result<Option<ExtractedIntent>, TravelError> {
        let Some(last_user) = messages.iter().rev().find(|m| m.role == ChatRole::User) else {
            return Ok(None);
        };
        self.classifier
            .classify(&last_user.content, None)
            .await
            .map(Some)
    }

    async fn places_branch(
        &self,
        intent: &ExtractedIntent,
        location: GeoPoint,
    ) -> Result<Drafted, TravelError> {
        let outcome = match self.search.search(intent, Some(location)).await {
            Ok(outcome) => outcome,
            Err(failure) if failure.error.is_configuration() => return Err(failure.error),
            Err(failure) => {
                let err = &failure.error;
                warn!(error = %err, code = err.code(), "place search failed");
                return Ok(Drafted {
                    content: compose_places_reply(&[]),
                    debug: json!({
                        "tool": failure.mode.tool_name(),
                        "search_mode": failure.mode,
                        "query": intent.search_term(),
                        "radii_attempted": failure.radii_attempted,
                        "result_count": 0,
                        "results": [],
                        "error": err.code(),
                    }),
                });
            }
        };

        let places = if outcome.places.is_empty() {
            outcome.places
        } else {
            self.enricher.enrich(outcome.places, location).await
        };
        let places = refine(places, intent);

        Ok(Drafted {
            content: compose_places_reply(&places),
            debug: json!({
                "tool": outcome.mode.tool_name(),
                "search_mode": outcome.mode,
                "query": outcome.query,
                "radii_attempted": outcome.radii_attempted,
                "result_count": places.len(),
                "results": places,
            }),
        })
    }

    async fn search_branch(&self, text: &str) -> Drafted {
        let response = match self.tools.search(text).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, code = err.code(), "web search failed");
                self.metrics.inc_web_search_failure();
                WebSearchResponse::empty(text)
            }
        };

        Drafted {
            content: compose_search_reply(&response),
            debug: json!({
                "tool": WEB_SEARCH_TOOL,
                "result_count": response.results.len(),
                "answer": response.answer,
            }),
        }
    }
}

/// The text this turn is about: the input, else the newest history message,
/// else a greeting.
fn utterance(request: &TurnRequest) -> String {
    let text = normalize_text(&request.input);
    if !text.is_empty() {
        return text;
    }
    request
        .messages
        .last()
        .map(|message| normalize_text(&message.content))
        .filter(|content| !content.is_empty())
        .unwrap_or_else(|| "hello".to_string())
}

#[cfg(test)]
mod tests;
