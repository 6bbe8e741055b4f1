use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use wayfinder_core::TravelError;

use crate::http::{build_client, trim_base_url, ServiceCodes};
use crate::ChatModel;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmMessage {
    pub role: &'static str,
    pub content: String,
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<LlmMessage>,
    pub temperature: f32,
    pub json_object: bool,
}

/// OpenAI-compatible `/chat/completions` client. Groq and OpenAI both speak
/// this protocol, so one client type serves the classifier and the
/// translator.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    codes: ServiceCodes,
}

impl ChatCompletionsClient {
    pub fn new(
        service: &'static str,
        api_key: &str,
        model: &str,
        base_url: &str,
    ) -> Result<Self, TravelError> {
        Ok(Self {
            client: build_client(Duration::from_secs(30))?,
            api_key: api_key.to_owned(),
            model: model.to_owned(),
            base_url: trim_base_url(base_url),
            codes: ServiceCodes {
                service,
                status: "LLM_HTTP_ERROR",
                timeout: "LLM_TIMEOUT",
                network: "LLM_NETWORK_ERROR",
            },
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl ChatModel for ChatCompletionsClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, TravelError> {
        let mut payload = json!({
            "model": self.model,
            "messages": request.messages,
            "temperature": request.temperature,
        });
        if request.json_object {
            payload["response_format"] = json!({ "type": "json_object" });
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.as_str())
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.codes.transport(e))?;

        if !response.status().is_success() {
            return Err(self.codes.upstream(response).await);
        }

        let body: Value = response.json().await.map_err(|e| self.codes.transport(e))?;
        extract_completion_text(&body)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| TravelError::parse(format!("{} completion", self.codes.service), "no content"))
    }
}

fn extract_completion_text(payload: &Value) -> Option<String> {
    if let Some(text) = payload
        .pointer("/choices/0/message/content")
        .and_then(|value| value.as_str())
    {
        return Some(text.to_string());
    }
    payload
        .get("output_text")
        .and_then(|value| value.as_str())
        .map(ToString::to_string)
}
