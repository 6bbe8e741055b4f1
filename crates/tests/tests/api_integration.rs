use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use wayfinder_tests::{app_with_env, offline_app};

fn agent_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/agent")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, parsed)
}

#[tokio::test]
async fn health_reports_capabilities() {
    let app = offline_app();

    let (status, body) = send(
        app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["capabilities"]["places"], false);
    assert_eq!(body["capabilities"]["llm_classifier"], false);
    assert_eq!(body["metrics"]["turns_total"], 0);
}

#[tokio::test]
async fn greeting_returns_canned_assistant_message() {
    let app = offline_app();

    let (status, body) = send(app, agent_request(json!({ "input": "hello", "debug": true }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"]["role"], "assistant");
    assert!(body["message"]["content"]
        .as_str()
        .unwrap()
        .starts_with("Hi there!"));
    assert_eq!(body["debug"], json!({ "mode": "greeting" }));
    assert_eq!(body["usage"]["total_tokens"], 0);
}

#[tokio::test]
async fn general_question_without_search_key_degrades() {
    let app = offline_app();

    let (status, body) = send(
        app,
        agent_request(json!({
            "input": "what is the weather like in march",
            "messages": [],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["message"]["content"],
        "I couldn't find any helpful information yet."
    );
    assert!(body["debug"].is_null());
}

#[tokio::test]
async fn places_question_without_maps_key_names_the_credential() {
    let app = offline_app();

    let (status, body) = send(
        app,
        agent_request(json!({ "input": "find a coffee shop", "location": { "lat": 29.37, "lng": 47.97 } })),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "missing_credential");
    assert_eq!(body["credential"], "WAYFINDER_GOOGLE_MAPS_API_KEY");
}

#[tokio::test]
async fn llm_classifier_without_key_is_unavailable() {
    let app = app_with_env(&[("WAYFINDER_CLASSIFIER", "llm")]);

    let (status, body) = send(app, agent_request(json!({ "input": "museum tickets" }))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["credential"], "WAYFINDER_GROQ_API_KEY");
}

#[tokio::test]
async fn out_of_range_location_is_bad_request() {
    let app = offline_app();

    let (status, body) = send(
        app,
        agent_request(json!({ "input": "gym", "location": { "lat": 123.0, "lng": 0.0 } })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn previous_intent_with_out_of_range_confidence_is_bad_request() {
    let app = offline_app();

    let (status, body) = send(
        app,
        agent_request(json!({
            "input": "what about a cheaper one",
            "previous_intent": { "intent": "places", "descriptor": "sushi", "confidence": 5.0 },
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn rate_limit_rejects_excess_requests() {
    let app = app_with_env(&[
        ("WAYFINDER_CLASSIFIER", "heuristic"),
        ("WAYFINDER_RATE_LIMIT_MAX", "1"),
    ]);

    let (first, _) = send(app.clone(), agent_request(json!({ "input": "hi" }))).await;
    let response = app
        .oneshot(agent_request(json!({ "input": "hi again" })))
        .await
        .unwrap();

    assert_eq!(first, StatusCode::OK);
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
}
