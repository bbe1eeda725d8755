use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::models::{GroundingSource, WebSource};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use tracing::{debug, warn};

/// Which gateway operation a completion request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    QuickScan,
    MarketResearch,
    DeepAnalysis,
    Feasibility,
    Estimate,
    Chat,
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Purpose::QuickScan => "quick_scan",
            Purpose::MarketResearch => "market_research",
            Purpose::DeepAnalysis => "deep_analysis",
            Purpose::Feasibility => "feasibility",
            Purpose::Estimate => "estimate",
            Purpose::Chat => "chat",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WireRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireMessage {
    pub role: WireRole,
    pub content: String,
}

impl WireMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: WireRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: WireRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub purpose: Purpose,
    pub messages: Vec<WireMessage>,
    pub json_mode: bool,
    pub web_search: bool,
}

impl CompletionRequest {
    pub fn prompt(purpose: Purpose, prompt: impl Into<String>) -> Self {
        Self::conversation(purpose, vec![WireMessage::user(prompt)])
    }

    pub fn conversation(purpose: Purpose, messages: Vec<WireMessage>) -> Self {
        Self {
            purpose,
            messages,
            json_mode: false,
            web_search: false,
        }
    }

    pub fn json_object(mut self) -> Self {
        self.json_mode = true;
        self
    }

    pub fn with_web_search(mut self) -> Self {
        self.web_search = true;
        self
    }

    /// Text of the last message, which is the prompt for single-turn requests.
    pub fn last_content(&self) -> &str {
        self.messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    pub citations: Vec<GroundingSource>,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            citations: Vec::new(),
        }
    }
}

/// Black-box chat-completion service: one request in, one text answer out.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, GatewayError>;
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    annotations: Vec<Annotation>,
}

#[derive(Debug, Deserialize)]
struct Annotation {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    url_citation: Option<UrlCitation>,
}

#[derive(Debug, Deserialize)]
struct UrlCitation {
    url: String,
    #[serde(default)]
    title: Option<String>,
}

/// OpenAI-compatible chat-completions client, pointed at OpenRouter by default.
pub struct OpenRouterClient {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl OpenRouterClient {
    pub fn new(config: GatewayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        Self { config, client }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> Result<reqwest::Url, GatewayError> {
        let base = self.config.base_url.trim_end_matches('/');
        reqwest::Url::parse(&format!("{base}/chat/completions")).map_err(|e| {
            GatewayError::UpstreamUnavailable(format!(
                "invalid gateway base URL {:?}: {}",
                self.config.base_url, e
            ))
        })
    }

    fn build_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut body = json!({
            "model": self.config.model,
            "messages": request.messages,
        });
        if request.json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }
        if self.config.reasoning {
            body["reasoning"] = json!({ "enabled": true });
        }
        if request.web_search && self.config.web_search {
            body["plugins"] = json!([{ "id": "web" }]);
        }
        body
    }
}

#[async_trait]
impl LlmBackend for OpenRouterClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, GatewayError> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            GatewayError::UpstreamUnavailable("API key not configured".to_string())
        })?;
        let url = self.endpoint()?;
        let body = self.build_body(&request);

        debug!(purpose = %request.purpose, model = %self.config.model, "Posting chat completion");

        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::network(format!("request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::network(format!("failed to read body: {e}")))?;

        if !status.is_success() {
            return Err(status_error(status.as_u16(), &text));
        }

        parse_completion(&text)
    }
}

fn status_error(status: u16, body: &str) -> GatewayError {
    let snippet: String = body.chars().take(300).collect();
    match status {
        401 | 403 => GatewayError::UpstreamUnavailable(format!("HTTP {status}: {snippet}")),
        _ => GatewayError::Network {
            message: format!("HTTP {status}: {snippet}"),
            status: Some(status),
        },
    }
}

fn parse_completion(body: &str) -> Result<Completion, GatewayError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| GatewayError::ResponseShape(format!("unparsable completion body: {e}")))?;

    let message = parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| GatewayError::ResponseShape("completion has no choices".to_string()))?;

    let text = message.content.unwrap_or_default();
    if text.trim().is_empty() {
        return Err(GatewayError::ResponseShape("completion content is empty".to_string()));
    }

    let citations = message
        .annotations
        .into_iter()
        .filter(|a| a.kind == "url_citation")
        .filter_map(|a| a.url_citation)
        .map(|c| GroundingSource {
            web: Some(WebSource {
                title: c.title.filter(|t| !t.is_empty()).unwrap_or_else(|| c.url.clone()),
                uri: c.url,
            }),
        })
        .collect();

    Ok(Completion { text, citations })
}
