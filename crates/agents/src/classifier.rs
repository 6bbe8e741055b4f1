use std::sync::Arc;

use tracing::{debug, warn};
use wayfinder_core::{classify_heuristic, parse_intent_json, ExtractedIntent, TravelError};
use wayfinder_observability::AppMetrics;
use wayfinder_services::{ChatModel, ClassifierMode, CompletionRequest, LlmMessage, GROQ_KEY_VAR};

const INTENT_PROMPT: &str = "You classify travel questions. Reply with one JSON object with keys: \
intent (\"places\" or \"other\"), descriptor (generic place category such as \"coffee\" or null), \
brand (proper-noun brand or venue name or null), proximity (\"near_me\" or null), \
ranking (\"prominence\" or null), openNow (true, false or null), \
price (\"low\", \"mid\", \"high\" or null), language (ISO 639-1 code of the user text) and \
confidence (0-1). Use \"places\" whenever the user wants somewhere to go, eat, stay or shop.";

/// Outcome of the LLM tier. `NeedsFallback` hands the turn to the heuristic
/// tier instead of failing it.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteClassification {
    Resolved(ExtractedIntent),
    NeedsFallback(String),
}

pub struct IntentClassifier<M> {
    model: Option<M>,
    mode: ClassifierMode,
    metrics: Arc<AppMetrics>,
}

impl<M: ChatModel> IntentClassifier<M> {
    pub fn new(model: Option<M>, mode: ClassifierMode, metrics: Arc<AppMetrics>) -> Self {
        Self {
            model,
            mode,
            metrics,
        }
    }

    pub fn mode(&self) -> ClassifierMode {
        self.mode
    }

    /// Reads `text` in the light of the previous turn.
    ///
    /// Blank text is `other` with zero confidence. The only error is a
    /// missing credential when the LLM tier is required.
    pub async fn classify(
        &self,
        text: &str,
        previous: Option<&ExtractedIntent>,
    ) -> Result<ExtractedIntent, TravelError> {
        if text.trim().is_empty() {
            return Ok(ExtractedIntent::other(0.0));
        }

        let model = match (self.mode, self.model.as_ref()) {
            (ClassifierMode::Heuristic, _) | (ClassifierMode::Auto, None) => {
                return Ok(classify_heuristic(text, previous));
            }
            (ClassifierMode::Llm, None) => {
                return Err(TravelError::Configuration {
                    credential: GROQ_KEY_VAR,
                });
            }
            (_, Some(model)) => model,
        };

        match classify_remote(model, text, previous).await {
            RemoteClassification::Resolved(intent) => Ok(carry_context(intent, previous)),
            RemoteClassification::NeedsFallback(reason) => {
                warn!(reason = %reason, "classifier fell back to heuristics");
                self.metrics.inc_classifier_fallback();
                Ok(classify_heuristic(text, previous))
            }
        }
    }
}

pub async fn classify_remote<M: ChatModel>(
    model: &M,
    text: &str,
    previous: Option<&ExtractedIntent>,
) -> RemoteClassification {
    let mut messages = vec![LlmMessage::system(INTENT_PROMPT)];
    if let Some(note) = previous.and_then(context_note) {
        messages.push(LlmMessage::system(note));
    }
    messages.push(LlmMessage::user(text));

    let request = CompletionRequest {
        messages,
        temperature: 0.1,
        json_object: true,
    };

    let content = match model.complete(request).await {
        Ok(content) => content,
        Err(err) => return RemoteClassification::NeedsFallback(err.to_string()),
    };
    match parse_intent_json(&content) {
        Ok(intent) => {
            debug!(intent = intent.intent.as_str(), confidence = intent.confidence, "llm intent");
            RemoteClassification::Resolved(intent)
        }
        Err(err) => RemoteClassification::NeedsFallback(err.to_string()),
    }
}

fn context_note(previous: &ExtractedIntent) -> Option<String> {
    if !previous.has_subject() {
        return None;
    }
    Some(format!(
        "Previous turn context: descriptor={}, brand={}. Reuse it when the user refers back to it.",
        previous.descriptor.as_deref().unwrap_or("none"),
        previous.brand.as_deref().unwrap_or("none"),
    ))
}

/// A follow-up like "the cheap one" names no subject; keep the previous one.
fn carry_context(mut intent: ExtractedIntent, previous: Option<&ExtractedIntent>) -> ExtractedIntent {
    if intent.has_subject() {
        return intent;
    }
    if let Some(previous) = previous.filter(|p| p.has_subject()) {
        intent.descriptor = previous.descriptor.clone();
        intent.brand = previous.brand.clone();
    }
    intent
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use wayfinder_core::{IntentKind, Proximity};

    use super::*;

    struct ScriptedModel {
        replies: Mutex<Vec<Result<String, TravelError>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedModel {
        fn replying(reply: Result<String, TravelError>) -> Self {
            Self {
                replies: Mutex::new(vec![reply]),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl ChatModel for ScriptedModel {
        async fn complete(&self, request: CompletionRequest) -> Result<String, TravelError> {
            self.requests.lock().unwrap().push(request);
            self.replies.lock().unwrap().remove(0)
        }
    }

    fn sushi() -> ExtractedIntent {
        ExtractedIntent::places("sushi")
    }

    #[tokio::test]
    async fn blank_text_skips_every_tier() {
        let classifier: IntentClassifier<ScriptedModel> =
            IntentClassifier::new(None, ClassifierMode::Llm, AppMetrics::shared());
        let intent = classifier.classify("  ", None).await.unwrap();
        assert_eq!(intent, ExtractedIntent::other(0.0));
    }

    #[tokio::test]
    async fn llm_mode_without_credential_is_configuration_error() {
        let classifier: IntentClassifier<ScriptedModel> =
            IntentClassifier::new(None, ClassifierMode::Llm, AppMetrics::shared());
        let err = classifier.classify("coffee near me", None).await.unwrap_err();
        assert!(matches!(
            err,
            TravelError::Configuration { credential } if credential == GROQ_KEY_VAR
        ));
    }

    #[tokio::test]
    async fn auto_mode_without_credential_uses_heuristics() {
        let classifier: IntentClassifier<ScriptedModel> =
            IntentClassifier::new(None, ClassifierMode::Auto, AppMetrics::shared());
        let intent = classifier.classify("coffee near me", None).await.unwrap();
        assert_eq!(intent.descriptor.as_deref(), Some("coffee"));
        assert_eq!(intent.proximity, Some(Proximity::NearMe));
    }

    #[tokio::test]
    async fn llm_answer_is_used_and_previous_context_is_sent() {
        let model = ScriptedModel::replying(Ok(
            r#"{"intent":"places","descriptor":"ramen","ranking":"prominence","confidence":0.92}"#
                .to_string(),
        ));
        let classifier = IntentClassifier::new(Some(model), ClassifierMode::Llm, AppMetrics::shared());

        let intent = classifier
            .classify("best ramen instead", Some(&sushi()))
            .await
            .unwrap();
        assert_eq!(intent.descriptor.as_deref(), Some("ramen"));
        assert!((intent.confidence - 0.92).abs() < 1e-6);

        let model = classifier.model.as_ref().unwrap();
        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[0].messages.len(), 3);
        assert!(requests[0].messages[1].content.contains("descriptor=sushi"));
        assert!(requests[0].json_object);
    }

    #[tokio::test]
    async fn subjectless_llm_answer_inherits_previous_subject() {
        let model = ScriptedModel::replying(Ok(
            r#"{"intent":"places","descriptor":null,"brand":null,"price":"low","confidence":0.8}"#
                .to_string(),
        ));
        let classifier = IntentClassifier::new(Some(model), ClassifierMode::Auto, AppMetrics::shared());

        let intent = classifier
            .classify("the cheap one", Some(&sushi()))
            .await
            .unwrap();
        assert_eq!(intent.descriptor.as_deref(), Some("sushi"));
        assert_eq!(intent.brand, None);
    }

    #[tokio::test]
    async fn malformed_llm_reply_falls_back_and_counts() {
        let metrics = AppMetrics::shared();
        let model = ScriptedModel::replying(Ok("sure! here you go".to_string()));
        let classifier = IntentClassifier::new(Some(model), ClassifierMode::Llm, metrics.clone());

        let intent = classifier.classify("any gym around", None).await.unwrap();
        assert_eq!(intent.intent, IntentKind::Places);
        assert_eq!(intent.descriptor.as_deref(), Some("gym"));
        assert_eq!(metrics.snapshot().classifier_fallback_total, 1);
    }

    #[tokio::test]
    async fn transport_failure_is_needs_fallback() {
        let model = ScriptedModel::replying(Err(TravelError::Transport {
            service: "groq",
            code: "LLM_TIMEOUT",
            timed_out: true,
            detail: "deadline elapsed".to_string(),
        }));
        let outcome = classify_remote(&model, "museum", None).await;
        assert!(matches!(outcome, RemoteClassification::NeedsFallback(reason) if reason.contains("LLM_TIMEOUT")));
    }
}
