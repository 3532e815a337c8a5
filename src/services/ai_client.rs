//! AI gateway client.
//!
//! The gateway is treated as an untyped oracle: it receives a prompt (plus
//! optional inline files) and returns text, which callers parse into the
//! schema they asked for. `AiGateway` is the seam the flows depend on;
//! `GeminiClient` is the production implementation over the Generative
//! Language REST API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument};

use crate::error::GatewayError;

/// Which configured model a request should go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    /// Long-form reasoning over text and JSON context.
    Text,
    /// Requests that carry images or documents.
    Vision,
}

/// One piece of prompt content.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    Inline { mime_type: String, data_base64: String },
}

/// Provider-neutral generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayRequest {
    pub model: ModelTier,
    pub system_instruction: Option<String>,
    pub parts: Vec<Part>,
    pub temperature: Option<f32>,
    /// Ask the provider for `application/json` output.
    pub json_output: bool,
}

impl GatewayRequest {
    pub fn text(model: ModelTier) -> Self {
        Self {
            model,
            system_instruction: None,
            parts: Vec::new(),
            temperature: None,
            json_output: false,
        }
    }

    pub fn json(model: ModelTier) -> Self {
        Self {
            json_output: true,
            ..Self::text(model)
        }
    }

    pub fn system(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn prompt(mut self, text: impl Into<String>) -> Self {
        self.parts.push(Part::Text(text.into()));
        self
    }

    pub fn inline(mut self, mime_type: impl Into<String>, data_base64: impl Into<String>) -> Self {
        self.parts.push(Part::Inline {
            mime_type: mime_type.into(),
            data_base64: data_base64.into(),
        });
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Anything that can answer a generation request.
#[async_trait]
pub trait AiGateway: Send + Sync {
    /// Run one generation and return the raw text of the first candidate.
    async fn generate(
        &self,
        request: GatewayRequest,
        request_id: Option<&str>,
    ) -> Result<String, GatewayError>;

    /// Cheap reachability probe.
    async fn health_check(&self) -> Result<()>;
}

/// Run a JSON-mode request and parse the reply into `T`.
pub async fn generate_json<T: DeserializeOwned>(
    gateway: &dyn AiGateway,
    request: GatewayRequest,
    request_id: Option<&str>,
) -> Result<T, GatewayError> {
    let raw = gateway.generate(request, request_id).await?;
    parse_json_reply(&raw)
}

/// Parse a model reply as JSON, tolerating a surrounding Markdown code fence.
pub fn parse_json_reply<T: DeserializeOwned>(raw: &str) -> Result<T, GatewayError> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    if body.is_empty() {
        return Err(GatewayError::EmptyResponse);
    }

    serde_json::from_str(body).map_err(|e| {
        error!(error = %e, "Failed to parse AI gateway JSON");
        GatewayError::Malformed(e)
    })
}

// =============================================================================
// Gemini REST client
// =============================================================================

/// Client for the Generative Language API.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    text_model: String,
    vision_model: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
    contents: Vec<WireContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireSystem<'a>>,
    generation_config: WireGenerationConfig,
}

#[derive(Serialize)]
struct WireContent<'a> {
    role: &'static str,
    parts: Vec<WirePart<'a>>,
}

#[derive(Serialize)]
struct WireSystem<'a> {
    parts: Vec<WirePart<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WirePart<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<WireInlineData<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireInlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    #[serde(default)]
    prompt_feedback: Option<WirePromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    #[serde(default)]
    content: Option<WireCandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireCandidateContent {
    #[serde(default)]
    parts: Vec<WireCandidatePart>,
}

#[derive(Debug, Deserialize)]
struct WireCandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Error envelope returned by the API.
#[derive(Debug, Deserialize)]
struct WireErrorResponse {
    error: WireErrorBody,
}

#[derive(Debug, Deserialize)]
struct WireErrorBody {
    #[serde(default)]
    message: String,
}

impl GeminiClient {
    /// Create a new gateway client.
    pub fn new(
        base_url: &str,
        api_key: &str,
        text_model: &str,
        vision_model: &str,
        timeout_seconds: u64,
    ) -> Result<Self> {
        url::Url::parse(base_url).context("Invalid AI gateway base URL")?;

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        tracing::info!(
            base_url = base_url,
            text_model = text_model,
            vision_model = vision_model,
            "AI gateway client initialized"
        );

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            text_model: text_model.to_string(),
            vision_model: vision_model.to_string(),
        })
    }

    fn model_name(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Text => &self.text_model,
            ModelTier::Vision => &self.vision_model,
        }
    }

    fn to_wire(request: &GatewayRequest) -> WireRequest<'_> {
        let parts = request
            .parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => WirePart {
                    text: Some(text.as_str()),
                    inline_data: None,
                },
                Part::Inline {
                    mime_type,
                    data_base64,
                } => WirePart {
                    text: None,
                    inline_data: Some(WireInlineData {
                        mime_type,
                        data: data_base64,
                    }),
                },
            })
            .collect();

        WireRequest {
            contents: vec![WireContent { role: "user", parts }],
            system_instruction: request.system_instruction.as_deref().map(|text| WireSystem {
                parts: vec![WirePart {
                    text: Some(text),
                    inline_data: None,
                }],
            }),
            generation_config: WireGenerationConfig {
                temperature: request.temperature,
                response_mime_type: request.json_output.then_some("application/json"),
            },
        }
    }

    fn first_candidate_text(response: WireResponse) -> Result<String, GatewayError> {
        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(GatewayError::Blocked(reason));
        }

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or(GatewayError::EmptyResponse)?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if !text.trim().is_empty() {
            return Ok(text);
        }

        match candidate.finish_reason.as_deref() {
            Some(reason @ ("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT")) => {
                Err(GatewayError::Blocked(reason.to_string()))
            }
            _ => Err(GatewayError::EmptyResponse),
        }
    }
}

#[async_trait]
impl AiGateway for GeminiClient {
    #[instrument(skip(self, request), fields(model = ?request.model, json = request.json_output))]
    async fn generate(
        &self,
        request: GatewayRequest,
        request_id: Option<&str>,
    ) -> Result<String, GatewayError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url,
            self.model_name(request.model)
        );

        let mut req = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::to_wire(&request));

        if let Some(rid) = request_id {
            req = req.header("x-request-id", rid);
        }

        debug!(url = %url, "AI gateway request");

        let response = req.send().await.map_err(|e| {
            error!(error = %e, "AI gateway request failed");
            GatewayError::Transport(e)
        })?;

        let status = response.status();

        if status.is_success() {
            let body: WireResponse = response.json().await.map_err(|e| {
                error!(error = %e, "Failed to decode AI gateway response");
                GatewayError::Transport(e)
            })?;
            Self::first_candidate_text(body)
        } else {
            let message = response
                .json::<WireErrorResponse>()
                .await
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("AI gateway error: {}", status));

            error!(status = %status, message = %message, "AI gateway error");
            Err(GatewayError::Status {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/v1beta/models/{}", self.base_url, self.text_model);

        self.client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .context("AI gateway health check failed")?
            .error_for_status()
            .context("AI gateway unhealthy")?;

        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    //! Scripted gateway for flow tests.

    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use tokio::sync::Notify;

    /// Replays queued replies in order and records every request it sees.
    #[derive(Default)]
    pub struct ScriptedGateway {
        replies: Mutex<VecDeque<Result<String, GatewayError>>>,
        requests: Mutex<Vec<GatewayRequest>>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedGateway {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every call waits until the returned `Notify` is signalled.
        pub fn gated() -> (Self, Arc<Notify>) {
            let gate = Arc::new(Notify::new());
            (
                Self {
                    gate: Some(gate.clone()),
                    ..Self::default()
                },
                gate,
            )
        }

        pub fn reply(self, text: impl Into<String>) -> Self {
            self.replies.lock().push_back(Ok(text.into()));
            self
        }

        pub fn reply_json(self, value: serde_json::Value) -> Self {
            self.reply(value.to_string())
        }

        pub fn fail(self, err: GatewayError) -> Self {
            self.replies.lock().push_back(Err(err));
            self
        }

        pub fn requests(&self) -> Vec<GatewayRequest> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl AiGateway for ScriptedGateway {
        async fn generate(
            &self,
            request: GatewayRequest,
            _request_id: Option<&str>,
        ) -> Result<String, GatewayError> {
            self.requests.lock().push(request);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.replies
                .lock()
                .pop_front()
                .unwrap_or(Err(GatewayError::EmptyResponse))
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GeminiClient {
        GeminiClient::new(&server.uri(), "test-key", "text-model", "vision-model", 5).unwrap()
    }

    #[tokio::test]
    async fn sends_inline_data_and_json_mode() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/vision-model:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(json!({
                "contents": [{"role": "user", "parts": [
                    {"text": "Analyze this plan"},
                    {"inlineData": {"mimeType": "image/png", "data": "AAAA"}}
                ]}],
                "systemInstruction": {"parts": [{"text": "Return valid JSON."}]},
                "generationConfig": {"responseMimeType": "application/json"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "{\"ok\":"}, {"text": "true}"}]}, "finishReason": "STOP"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = GatewayRequest::json(ModelTier::Vision)
            .system("Return valid JSON.")
            .prompt("Analyze this plan")
            .inline("image/png", "AAAA");

        let text = client(&server).generate(request, None).await.unwrap();
        assert_eq!(text, "{\"ok\":true}");
    }

    #[tokio::test]
    async fn surfaces_provider_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT"}
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .generate(GatewayRequest::text(ModelTier::Text).prompt("hi"), None)
            .await
            .unwrap_err();

        match &err {
            GatewayError::Status { status, .. } => assert_eq!(*status, 400),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.user_message(), "The provided API key is invalid or has expired.");
    }

    #[tokio::test]
    async fn blocked_prompt_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [],
                "promptFeedback": {"blockReason": "SAFETY"}
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .generate(GatewayRequest::text(ModelTier::Text).prompt("hi"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Blocked(reason) if reason == "SAFETY"));
    }

    #[test]
    fn json_reply_tolerates_code_fence() {
        let value: serde_json::Value = parse_json_reply("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn json_reply_rejects_prose_and_blank() {
        assert!(matches!(
            parse_json_reply::<serde_json::Value>("Sure! Here is your plan."),
            Err(GatewayError::Malformed(_))
        ));
        assert!(matches!(
            parse_json_reply::<serde_json::Value>("   "),
            Err(GatewayError::EmptyResponse)
        ));
    }
}
