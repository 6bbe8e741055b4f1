mod rate_limit;

use std::env::VarError;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Json, State};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{body::Body, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};
use wayfinder_agents::{IntentClassifier, TravelAgent};
use wayfinder_core::{TokenUsage, TravelError, TurnRequest};
use wayfinder_observability::{AppMetrics, MetricsSnapshot};
use wayfinder_services::{classifier_model, ChatCompletionsClient, ClassifierMode, ServiceHub, Settings};

pub use crate::rate_limit::{Admission, IpRateLimiter};

const MAX_BODY_BYTES: usize = 64 * 1024;
const DEFAULT_RATE_LIMIT_WINDOW_SECONDS: u64 = 60;
const DEFAULT_RATE_LIMIT_MAX: usize = 60;

pub type Agent = TravelAgent<ServiceHub, ChatCompletionsClient>;

#[derive(Clone)]
pub struct ApiState {
    pub agent: Arc<Agent>,
    pub metrics: Arc<AppMetrics>,
    pub limiter: IpRateLimiter,
    pub capabilities: Capabilities,
    pub allowed_origins: Arc<Vec<String>>,
}

/// Which collaborators are usable with the loaded credentials.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Capabilities {
    pub llm_classifier: bool,
    pub places: bool,
    pub web_search: bool,
    pub translation: bool,
    pub remote_tools: bool,
}

impl Capabilities {
    pub fn from_settings(settings: &Settings) -> Self {
        let remote_tools = settings.tool_server_url.is_some();
        Self {
            llm_classifier: settings.groq_api_key.is_some()
                && settings.classifier_mode != ClassifierMode::Heuristic,
            places: remote_tools || settings.google_maps_api_key.is_some(),
            web_search: remote_tools || settings.tavily_api_key.is_some(),
            translation: remote_tools || settings.openai_api_key.is_some(),
            remote_tools,
        }
    }
}

/// HTTP-only knobs that the agent itself does not care about.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub rate_limit_window: Duration,
    pub rate_limit_max: usize,
    pub allowed_origins: Vec<String>,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key))
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let rate_limit_window = Duration::from_secs(
            lookup("WAYFINDER_RATE_LIMIT_WINDOW_SECONDS")
                .ok()
                .and_then(|value| value.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECONDS),
        );
        let rate_limit_max = lookup("WAYFINDER_RATE_LIMIT_MAX")
            .ok()
            .and_then(|value| value.trim().parse::<usize>().ok())
            .filter(|max| *max > 0)
            .unwrap_or(DEFAULT_RATE_LIMIT_MAX);
        let allowed_origins = lookup("WAYFINDER_ALLOWED_ORIGINS")
            .map(|value| {
                value
                    .split(',')
                    .map(|origin| origin.trim().trim_end_matches('/').to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            rate_limit_window,
            rate_limit_max,
            allowed_origins,
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    metrics: MetricsSnapshot,
    capabilities: Capabilities,
}

#[derive(Debug, Serialize)]
struct AssistantMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct AgentResponse {
    message: AssistantMessage,
    debug: Option<Value>,
    usage: TokenUsage,
}

/// Wires clients, classifier and agent from `settings` and returns the
/// router.
pub fn build_app(settings: &Settings, config: ApiConfig) -> Result<Router> {
    let metrics = AppMetrics::shared();
    let hub = ServiceHub::from_settings(settings).context("failed to build service clients")?;
    let model = classifier_model(settings).context("failed to build classifier client")?;
    let classifier = IntentClassifier::new(model, settings.classifier_mode, metrics.clone());

    let agent = Arc::new(TravelAgent::new(
        Arc::new(hub),
        classifier,
        metrics.clone(),
        settings.default_location,
    ));

    let state = ApiState {
        agent,
        metrics,
        limiter: IpRateLimiter::new(config.rate_limit_window, config.rate_limit_max),
        capabilities: Capabilities::from_settings(settings),
        allowed_origins: Arc::new(config.allowed_origins),
    };
    Ok(build_router(state))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/agent", post(agent_turn))
        .layer(build_cors_layer(&state.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        metrics: state.metrics.snapshot(),
        capabilities: state.capabilities,
    };
    (StatusCode::OK, Json(payload))
}

async fn agent_turn(State(state): State<ApiState>, Json(body): Json<Value>) -> Response {
    let request: TurnRequest = match serde_json::from_value(body) {
        Ok(request) => request,
        Err(err) => return ApiError(TravelError::InvalidInput(err.to_string())).into_response(),
    };

    match state.agent.handle_turn(request).await {
        Ok(reply) => (
            StatusCode::OK,
            Json(AgentResponse {
                message: AssistantMessage {
                    role: "assistant",
                    content: reply.content,
                },
                debug: reply.debug,
                usage: reply.usage,
            }),
        )
            .into_response(),
        Err(err) => ApiError(err).into_response(),
    }
}

/// Maps the error taxonomy onto status codes. Configuration problems are
/// the operator's to fix, so they read as 503 and name the credential.
struct ApiError(TravelError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        match &err {
            TravelError::Configuration { credential } => {
                warn!(credential, "turn rejected, credential missing");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({
                        "error": "missing_credential",
                        "code": err.code(),
                        "credential": credential,
                        "message": err.to_string(),
                    })),
                )
                    .into_response()
            }
            TravelError::InvalidInput(detail) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "invalid_request",
                    "code": err.code(),
                    "message": detail,
                })),
            )
                .into_response(),
            _ => {
                error!(error = %err, code = err.code(), "turn failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "agent_failed",
                        "code": err.code(),
                        "message": "the assistant could not complete this turn",
                    })),
                )
                    .into_response()
            }
        }
    }
}

fn build_cors_layer(allowed_origins: &Arc<Vec<String>>) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();
    let origins = if origins.is_empty() {
        vec![HeaderValue::from_static("http://localhost:8501")]
    } else {
        origins
    };

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let client = client_key(&request);
    match state.limiter.admit(&client) {
        Admission::Allowed { remaining } => {
            let mut response = next.run(request).await;
            response
                .headers_mut()
                .insert("x-ratelimit-remaining", HeaderValue::from(remaining));
            response
        }
        Admission::Limited { retry_after } => {
            let seconds = retry_after.as_secs().max(1);
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": "rate_limited",
                    "message": "rate limit exceeded for this client",
                })),
            )
                .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
            response
        }
    }
}

fn client_key(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("local")
        .to_string()
}
