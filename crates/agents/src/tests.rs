use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use wayfinder_core::format::{NO_PLACES_REPLY, NO_SEARCH_REPLY};
use wayfinder_core::{
    DistanceDestination, DistanceRow, PlaceResult, TranslationResult, WebDocument,
};
use wayfinder_services::{ClassifierMode, CompletionRequest, GOOGLE_MAPS_KEY_VAR, GROQ_KEY_VAR};

use super::*;

#[derive(Default)]
struct FakeTools {
    places_by_radius: Vec<(u32, Vec<PlaceResult>)>,
    text_error: Option<fn() -> TravelError>,
    distances_fail: bool,
    web: Option<WebSearchResponse>,
    translation_fails: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeTools {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn at_radius(&self, radius: u32) -> Vec<PlaceResult> {
        self.places_by_radius
            .iter()
            .find(|(r, _)| *r == radius)
            .map(|(_, places)| places.clone())
            .unwrap_or_default()
    }
}

impl PlacesProvider for FakeTools {
    async fn text_search(
        &self,
        query: &str,
        _bias: Option<GeoPoint>,
        radius_m: u32,
    ) -> Result<Vec<PlaceResult>, TravelError> {
        self.record(format!("text:{query}:{radius_m}"));
        if let Some(error) = self.text_error {
            return Err(error());
        }
        Ok(self.at_radius(radius_m))
    }

    async fn nearby_search(
        &self,
        query: &str,
        _center: GeoPoint,
        radius_m: u32,
    ) -> Result<Vec<PlaceResult>, TravelError> {
        self.record(format!("nearby:{query}:{radius_m}"));
        Ok(self.at_radius(radius_m))
    }
}

impl DistanceProvider for FakeTools {
    async fn distance_matrix(
        &self,
        _origin: GeoPoint,
        destinations: &[DistanceDestination],
    ) -> Result<Vec<DistanceRow>, TravelError> {
        self.record(format!("distance:{}", destinations.len()));
        if self.distances_fail {
            return Err(TravelError::Upstream {
                service: "distance matrix",
                code: "DISTANCE_MATRIX_HTTP_ERROR",
                status: Some(500),
                detail: String::new(),
            });
        }
        Ok((0..destinations.len())
            .map(|index| DistanceRow {
                index,
                status: "OK".to_string(),
                distance_text: Some(format!("{} km", index + 1)),
                distance_value: Some((index as u64 + 1) * 1000),
                duration_text: Some(format!("{} mins", (index + 1) * 4)),
                duration_value: Some((index as u64 + 1) * 240),
            })
            .collect())
    }
}

impl WebSearch for FakeTools {
    async fn search(&self, query: &str) -> Result<WebSearchResponse, TravelError> {
        self.record(format!("web:{query}"));
        self.web.clone().ok_or(TravelError::Configuration {
            credential: "WAYFINDER_TAVILY_API_KEY",
        })
    }
}

impl Translator for FakeTools {
    async fn ensure_language_consistency(
        &self,
        _user_text: &str,
        response: &str,
    ) -> Result<TranslationResult, TravelError> {
        self.record("translate".to_string());
        if self.translation_fails {
            return Err(TravelError::parse("translation", "bad payload"));
        }
        Ok(TranslationResult::passthrough(response, "en", 0.9))
    }
}

/// Counts calls and always fails, which sends the classifier to heuristics.
#[derive(Default, Clone)]
struct CountingModel {
    calls: Arc<AtomicUsize>,
}

impl ChatModel for CountingModel {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, TravelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(TravelError::parse("completion", "offline"))
    }
}

fn kuwait() -> GeoPoint {
    GeoPoint::new(29.37, 47.97).unwrap()
}

fn agent_with(
    tools: FakeTools,
    classifier: IntentClassifier<CountingModel>,
    metrics: Arc<AppMetrics>,
) -> (TravelAgent<FakeTools, CountingModel>, Arc<FakeTools>) {
    let tools = Arc::new(tools);
    let agent = TravelAgent::new(tools.clone(), classifier, metrics, kuwait());
    (agent, tools)
}

fn heuristic_agent(tools: FakeTools) -> (TravelAgent<FakeTools, CountingModel>, Arc<FakeTools>) {
    let metrics = AppMetrics::shared();
    let classifier = IntentClassifier::new(None, ClassifierMode::Heuristic, metrics.clone());
    agent_with(tools, classifier, metrics)
}

fn place(id: &str, name: &str, rating: f64, open_now: Option<bool>) -> PlaceResult {
    PlaceResult {
        place_id: Some(id.to_string()),
        rating: Some(rating),
        open_now,
        ..PlaceResult::named(name)
    }
}

fn turn(input: &str) -> TurnRequest {
    TurnRequest {
        input: input.to_string(),
        debug: true,
        ..TurnRequest::default()
    }
}

#[tokio::test]
async fn open_coffee_near_me_widens_once_and_keeps_open_places() {
    let (agent, tools) = heuristic_agent(FakeTools {
        places_by_radius: vec![(
            5000,
            vec![
                place("a", "Bean There", 4.1, Some(true)),
                place("b", "Shut Cafe", 4.9, Some(false)),
                place("c", "Late Latte", 4.5, Some(true)),
            ],
        )],
        ..FakeTools::default()
    });

    let reply = agent
        .handle_turn(TurnRequest {
            location: Some(kuwait()),
            ..turn("coffee near me open now")
        })
        .await
        .unwrap();

    let debug = reply.debug.unwrap();
    assert_eq!(debug["result_count"], 2);
    assert_eq!(debug["search_mode"], "nearby");
    assert_eq!(debug["radii_attempted"], json!([2500, 5000]));
    let results = debug["results"].as_array().unwrap();
    assert!(results.iter().all(|place| place["open_now"] == true));
    assert_eq!(results[0]["distance_text"], "1 km");

    assert!(reply.content.contains("Bean There"));
    assert!(reply.content.contains("Late Latte"));
    assert!(!reply.content.contains("Shut Cafe"));
    assert_eq!(
        tools.calls(),
        vec![
            "nearby:coffee:2500",
            "nearby:coffee:5000",
            "distance:3",
            "translate"
        ]
    );
}

#[tokio::test]
async fn greeting_touches_no_tool_and_no_classifier() {
    let metrics = AppMetrics::shared();
    let model = CountingModel::default();
    let classifier = IntentClassifier::new(Some(model.clone()), ClassifierMode::Llm, metrics.clone());
    let (agent, tools) = agent_with(FakeTools::default(), classifier, metrics.clone());

    let reply = agent.handle_turn(turn("hello")).await.unwrap();

    assert_eq!(reply.content, GREETING_REPLY);
    assert_eq!(reply.debug, Some(json!({ "mode": "greeting" })));
    assert_eq!(reply.usage, TokenUsage::default());
    assert!(tools.calls().is_empty());
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    assert_eq!(metrics.snapshot().small_talk_total, 1);
}

#[tokio::test]
async fn empty_turn_is_treated_as_hello() {
    let (agent, tools) = heuristic_agent(FakeTools::default());

    let reply = agent.handle_turn(TurnRequest::default()).await.unwrap();
    assert_eq!(reply.content, GREETING_REPLY);
    assert!(reply.debug.is_none());
    assert!(tools.calls().is_empty());
}

#[tokio::test]
async fn explicit_previous_intent_carries_descriptor() {
    let (agent, tools) = heuristic_agent(FakeTools {
        places_by_radius: vec![(2500, vec![place("s", "Sushi Ten", 4.4, None)])],
        ..FakeTools::default()
    });

    let reply = agent
        .handle_turn(TurnRequest {
            previous_intent: Some(ExtractedIntent::places("sushi")),
            ..turn("what about a cheaper one")
        })
        .await
        .unwrap();

    assert!(reply.content.contains("Sushi Ten"));
    assert_eq!(tools.calls()[0], "text:sushi:2500");
    assert_eq!(reply.debug.unwrap()["intent"]["descriptor"], "sushi");
}

#[tokio::test]
async fn previous_intent_is_derived_from_history() {
    let (agent, tools) = heuristic_agent(FakeTools::default());

    let reply = agent
        .handle_turn(TurnRequest {
            messages: vec![
                ChatMessage::user("is there a museum downtown"),
                ChatMessage::assistant("Here are some places you might like:"),
            ],
            ..turn("which one is open now")
        })
        .await
        .unwrap();

    assert_eq!(reply.content, NO_PLACES_REPLY);
    let calls = tools.calls();
    assert_eq!(calls[0], "text:museum:2500");
    assert_eq!(calls.len(), RADIUS_LADDER_M.len() + 1);
    assert_eq!(calls.last().map(String::as_str), Some("translate"));
}

#[tokio::test]
async fn text_search_failure_becomes_canned_reply() {
    let (agent, tools) = heuristic_agent(FakeTools {
        text_error: Some(|| TravelError::Transport {
            service: "google places",
            code: "GOOGLE_PLACES_TIMEOUT",
            timed_out: true,
            detail: "deadline".to_string(),
        }),
        ..FakeTools::default()
    });

    let reply = agent.handle_turn(turn("best hotel in town")).await.unwrap();
    assert_eq!(reply.content, NO_PLACES_REPLY);
    let debug = reply.debug.unwrap();
    assert_eq!(debug["error"], "GOOGLE_PLACES_TIMEOUT");
    assert_eq!(debug["tool"], "places_text_search");
    assert_eq!(debug["query"], "hotel");
    assert_eq!(debug["radii_attempted"], json!([2500]));
    assert_eq!(tools.calls(), vec!["text:hotel:2500", "translate"]);
}

#[tokio::test]
async fn missing_places_credential_fails_the_turn() {
    let (agent, _) = heuristic_agent(FakeTools {
        text_error: Some(|| TravelError::Configuration {
            credential: GOOGLE_MAPS_KEY_VAR,
        }),
        ..FakeTools::default()
    });

    let err = agent.handle_turn(turn("any good restaurant")).await.unwrap_err();
    assert!(matches!(
        err,
        TravelError::Configuration { credential } if credential == GOOGLE_MAPS_KEY_VAR
    ));
}

#[tokio::test]
async fn llm_mode_without_key_fails_the_turn() {
    let metrics = AppMetrics::shared();
    let classifier = IntentClassifier::new(None, ClassifierMode::Llm, metrics.clone());
    let (agent, tools) = agent_with(FakeTools::default(), classifier, metrics.clone());

    let err = agent.handle_turn(turn("coffee please")).await.unwrap_err();
    assert!(matches!(
        err,
        TravelError::Configuration { credential } if credential == GROQ_KEY_VAR
    ));
    assert!(tools.calls().is_empty());

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.turns_total, 1);
    assert_eq!(snapshot.latency_samples_total, 1);
}

#[tokio::test]
async fn failing_classifier_model_falls_back_to_heuristics() {
    let metrics = AppMetrics::shared();
    let classifier = IntentClassifier::new(
        Some(CountingModel::default()),
        ClassifierMode::Auto,
        metrics.clone(),
    );
    let (agent, tools) = agent_with(
        FakeTools {
            places_by_radius: vec![(2500, vec![place("g", "Iron Gym", 4.0, None)])],
            ..FakeTools::default()
        },
        classifier,
        metrics.clone(),
    );

    let reply = agent.handle_turn(turn("late night gym")).await.unwrap();
    assert!(reply.content.contains("Iron Gym"));
    assert_eq!(tools.calls()[0], "text:gym:2500");
    assert_eq!(metrics.snapshot().classifier_fallback_total, 1);
}

#[tokio::test]
async fn web_search_failure_degrades_to_empty_answer() {
    let metrics = AppMetrics::shared();
    let classifier = IntentClassifier::new(None, ClassifierMode::Heuristic, metrics.clone());
    let (agent, tools) = agent_with(FakeTools::default(), classifier, metrics.clone());

    let reply = agent
        .handle_turn(turn("do i need a visa for kuwait"))
        .await
        .unwrap();

    assert_eq!(reply.content, NO_SEARCH_REPLY);
    assert_eq!(reply.debug.unwrap()["tool"], "web_search");
    assert_eq!(
        tools.calls(),
        vec!["web:do i need a visa for kuwait", "translate"]
    );
    assert_eq!(metrics.snapshot().web_search_failures_total, 1);
}

#[tokio::test]
async fn web_answer_leads_the_reply() {
    let (agent, _) = heuristic_agent(FakeTools {
        web: Some(WebSearchResponse {
            query: "weather".to_string(),
            results: vec![WebDocument {
                title: "Forecast".to_string(),
                url: "https://example.org/forecast".to_string(),
                content: "Sunny, 41C".to_string(),
            }],
            answer: Some("It will be hot.".to_string()),
        }),
        ..FakeTools::default()
    });

    let reply = agent.handle_turn(turn("weather tomorrow")).await.unwrap();
    assert!(reply.content.starts_with("It will be hot.\n\nHere is what I found:"));
    assert!(reply.content.contains("https://example.org/forecast"));
}

#[tokio::test]
async fn enrichment_failure_keeps_results() {
    let (agent, _) = heuristic_agent(FakeTools {
        places_by_radius: vec![(2500, vec![place("p", "City Park", 4.2, Some(true))])],
        distances_fail: true,
        ..FakeTools::default()
    });

    let reply = agent.handle_turn(turn("a park to walk in")).await.unwrap();
    let debug = reply.debug.unwrap();
    assert_eq!(debug["result_count"], 1);
    assert!(debug["results"][0]["distance_text"].is_null());
    assert!(reply.content.contains("City Park"));
}

#[tokio::test]
async fn translator_failure_keeps_drafted_content() {
    let (agent, _) = heuristic_agent(FakeTools {
        translation_fails: true,
        ..FakeTools::default()
    });

    let reply = agent.handle_turn(turn("tell me about kuwait")).await.unwrap();
    assert_eq!(reply.content, NO_SEARCH_REPLY);
    assert!(reply.debug.unwrap()["translation"].is_null());
}
