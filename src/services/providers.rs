// Provider Service
// Text generation over an OpenAI-compatible chat API and an optional external
// human-likeness detector

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

const LLM_DEFAULT_URL: &str = "https://api.openai.com/v1/chat/completions";
const LLM_DEFAULT_MODEL: &str = "gpt-4o-mini";
const REQUEST_TIMEOUT_SECS: u64 = 80;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Missing content in response")]
    MissingContent,
    #[error("JSON parse error: {0}")]
    JsonError(String),
    #[error("API key not configured")]
    MissingApiKey,
    #[error("Detector endpoint not configured")]
    MissingEndpoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOptions {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_max_tokens() -> i32 {
    2048
}

fn default_temperature() -> f64 {
    0.7
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            system_prompt: None,
        }
    }
}

/// Result of one generation call. Failures are reported in-band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub success: bool,
    pub content: String,
    pub error: Option<String>,
    pub latency_ms: i64,
}

impl GenerationOutcome {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: content.into(),
            error: None,
            latency_ms: 0,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: String::new(),
            error: Some(error.into()),
            latency_ms: 0,
        }
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> GenerationOutcome;
}

/// Human-likeness verdict on a 0-100 scale (higher reads more human).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionVerdict {
    pub human_score: f64,
}

#[async_trait]
pub trait HumanLikenessDetector: Send + Sync {
    async fn check(&self, text: &str) -> Result<DetectionVerdict, ProviderError>;
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: i32,
    temperature: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
    reasoning_content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessageResponse>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
    reasoning_content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResult {
    pub content: String,
    pub latency_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

fn fenced_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^```[a-zA-Z]*\n(.*?)\n?```$").expect("fence regex"))
}

/// Pull the message text out of a chat response, stripping a surrounding code fence.
fn extract_chat_content(data: &ChatResponse) -> Option<String> {
    let message = data
        .choices
        .as_ref()
        .and_then(|c| c.first())
        .and_then(|c| c.message.as_ref());

    let content = message
        .and_then(|m| m.content.clone())
        .filter(|c| !c.trim().is_empty())
        .or_else(|| {
            // Some reasoning models leave content empty and answer in the reasoning field.
            message
                .and_then(|m| m.reasoning_content.clone())
                .or_else(|| data.reasoning_content.clone())
                .filter(|r| !r.trim().is_empty())
        })?;

    let trimmed = content.trim();
    let unfenced = fenced_block_re()
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| trimmed.to_string());
    Some(unfenced)
}

fn build_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .unwrap_or_default()
}

/// OpenAI-compatible chat client used as the default text generator.
pub struct ProviderClient {
    client: Client,
    url: String,
    api_key: Option<String>,
    default_model: String,
}

impl Default for ProviderClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderClient {
    pub fn new() -> Self {
        let url = env::var("AUTHENTICITY_LLM_URL").unwrap_or_else(|_| LLM_DEFAULT_URL.to_string());
        let default_model =
            env::var("AUTHENTICITY_LLM_MODEL").unwrap_or_else(|_| LLM_DEFAULT_MODEL.to_string());
        Self {
            client: build_client(),
            url,
            api_key: get_api_key("llm"),
            default_model,
        }
    }

    pub fn with_endpoint(url: &str, api_key: Option<String>, model: &str) -> Self {
        Self {
            client: build_client(),
            url: url.to_string(),
            api_key,
            default_model: model.to_string(),
        }
    }

    pub fn with_proxy(mut self, proxy_url: &str) -> Result<Self, ProviderError> {
        let proxy = reqwest::Proxy::all(proxy_url)?;
        self.client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .proxy(proxy)
            .build()?;
        Ok(self)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub async fn call_chat_api(
        &self,
        system: &str,
        user: &str,
        options: &GenerationOptions,
    ) -> Result<ChatResult, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or(ProviderError::MissingApiKey)?;

        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: user.to_string(),
        });

        let request = ChatRequest {
            model: options
                .model
                .clone()
                .unwrap_or_else(|| self.default_model.clone()),
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        let start = Instant::now();
        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let reasoning = data
            .choices
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.reasoning_content.clone())
            .or_else(|| data.reasoning_content.clone());
        let content = extract_chat_content(&data).ok_or(ProviderError::MissingContent)?;

        debug!(latency_ms, chars = content.len(), "[PROVIDER] chat completion");
        Ok(ChatResult {
            content,
            latency_ms,
            reasoning,
        })
    }
}

#[async_trait]
impl TextGenerator for ProviderClient {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> GenerationOutcome {
        let system = options.system_prompt.as_deref().unwrap_or("");
        match self.call_chat_api(system, prompt, options).await {
            Ok(result) => GenerationOutcome {
                success: true,
                content: result.content,
                error: None,
                latency_ms: result.latency_ms,
            },
            Err(e) => {
                warn!(error = %e, "[PROVIDER] generation failed");
                GenerationOutcome::failed(e.to_string())
            }
        }
    }
}

/// Scale a detector reports its score on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScoreScale {
    /// 0-100, already a human-likeness percentage.
    #[default]
    Percent,
    /// 0-1 probability of being human-written.
    Fraction,
}

impl ScoreScale {
    /// `fraction` or `probability` select the 0-1 scale; anything else is a percentage.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "fraction" | "probability" | "0-1" => ScoreScale::Fraction,
            _ => ScoreScale::Percent,
        }
    }

    fn to_percent(self, raw: f64) -> f64 {
        match self {
            ScoreScale::Percent => raw,
            ScoreScale::Fraction => raw * 100.0,
        }
    }
}

/// Read a human-likeness score from a detector response body.
/// Accepts `human_score`, `humanScore` or `score`, interpreted on `scale` and clamped to 100.
pub fn parse_human_score(body: &Value, scale: ScoreScale) -> Option<f64> {
    let raw = ["human_score", "humanScore", "score"]
        .iter()
        .find_map(|key| body.get(*key))
        .and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())))?;
    if !raw.is_finite() || raw < 0.0 {
        return None;
    }
    Some(scale.to_percent(raw).min(100.0))
}

/// External detector reached over HTTP: POST `{"text": ...}`.
pub struct HttpDetectionClient {
    client: Client,
    url: String,
    api_key: Option<String>,
    scale: ScoreScale,
}

impl HttpDetectionClient {
    pub fn new(url: &str, api_key: Option<String>) -> Self {
        Self {
            client: build_client(),
            url: url.to_string(),
            api_key,
            scale: ScoreScale::default(),
        }
    }

    pub fn with_scale(mut self, scale: ScoreScale) -> Self {
        self.scale = scale;
        self
    }

    pub fn scale(&self) -> ScoreScale {
        self.scale
    }

    /// Configured from `AUTHENTICITY_DETECTOR_URL` and `AUTHENTICITY_DETECTOR_SCALE`; `None` when no URL is set.
    pub fn from_env() -> Option<Self> {
        let url = env::var("AUTHENTICITY_DETECTOR_URL").ok()?;
        let url = url.trim();
        if url.is_empty() {
            return None;
        }
        let scale = env::var("AUTHENTICITY_DETECTOR_SCALE")
            .map(|s| ScoreScale::from_name(&s))
            .unwrap_or_default();
        Some(Self::new(url, get_api_key("detector")).with_scale(scale))
    }
}

#[async_trait]
impl HumanLikenessDetector for HttpDetectionClient {
    async fn check(&self, text: &str) -> Result<DetectionVerdict, ProviderError> {
        if self.url.is_empty() {
            return Err(ProviderError::MissingEndpoint);
        }
        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({ "text": text }));
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;
        let human_score = parse_human_score(&body, self.scale).ok_or(ProviderError::MissingContent)?;
        Ok(DetectionVerdict { human_score })
    }
}

/// Get an API key from the environment
pub fn get_api_key(provider: &str) -> Option<String> {
    let env_keys: &[&str] = match provider {
        "llm" => &["AUTHENTICITY_LLM_API_KEY", "OPENAI_API_KEY"],
        "detector" => &["AUTHENTICITY_DETECTOR_API_KEY"],
        _ => &[],
    };

    env_keys.iter().find_map(|key| {
        env::var(key)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_human_score_variants() {
        let pct = ScoreScale::Percent;
        assert_eq!(parse_human_score(&json!({"human_score": 82.5}), pct), Some(82.5));
        assert_eq!(parse_human_score(&json!({"score": "73"}), pct), Some(73.0));
        assert_eq!(parse_human_score(&json!({"score": 250}), pct), Some(100.0));
        assert_eq!(parse_human_score(&json!({"score": -1}), pct), None);
        assert_eq!(parse_human_score(&json!({"verdict": "human"}), pct), None);
        assert_eq!(
            parse_human_score(&json!({"humanScore": 0.4}), ScoreScale::Fraction),
            Some(40.0)
        );
    }

    #[test]
    fn test_percent_scale_keeps_low_scores_low() {
        let pct = ScoreScale::Percent;
        assert_eq!(parse_human_score(&json!({"human_score": 1}), pct), Some(1.0));
        assert_eq!(parse_human_score(&json!({"human_score": 0.5}), pct), Some(0.5));
        let one = parse_human_score(&json!({"human_score": 1}), pct).unwrap();
        let two = parse_human_score(&json!({"human_score": 2}), pct).unwrap();
        assert!(one < two);
    }

    #[test]
    fn test_detector_scale_selection() {
        assert_eq!(ScoreScale::from_name("fraction"), ScoreScale::Fraction);
        assert_eq!(ScoreScale::from_name(" Probability "), ScoreScale::Fraction);
        assert_eq!(ScoreScale::from_name("percent"), ScoreScale::Percent);
        let client = HttpDetectionClient::new("http://localhost:9000/detect", None);
        assert_eq!(client.scale(), ScoreScale::Percent);
        let client = client.with_scale(ScoreScale::Fraction);
        assert_eq!(client.scale(), ScoreScale::Fraction);
    }

    #[test]
    fn test_extract_content_strips_fence() {
        let data: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": "```text\nRewritten copy.\n```"}}]
        }))
        .unwrap();
        assert_eq!(extract_chat_content(&data).as_deref(), Some("Rewritten copy."));
    }

    #[test]
    fn test_extract_content_falls_back_to_reasoning() {
        let data: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": "", "reasoning_content": "Plain answer."}}]
        }))
        .unwrap();
        assert_eq!(extract_chat_content(&data).as_deref(), Some("Plain answer."));

        let empty: ChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert_eq!(extract_chat_content(&empty), None);
    }

    #[test]
    fn test_generation_options_defaults() {
        let options: GenerationOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.max_tokens, 2048);
        assert_eq!(options.temperature, 0.7);
        assert!(options.model.is_none());
    }

    #[tokio::test]
    async fn test_generate_without_key_fails_in_band() {
        let client = ProviderClient::with_endpoint("http://127.0.0.1:9/v1/chat", None, "m");
        let outcome = client
            .generate("rewrite this", &GenerationOptions::default())
            .await;
        assert!(!outcome.success);
        assert!(outcome.content.is_empty());
        assert_eq!(outcome.error.as_deref(), Some("API key not configured"));
    }

    #[test]
    fn test_client_endpoint() {
        let client = ProviderClient::with_endpoint("http://localhost:8080/chat", None, "local");
        assert_eq!(client.url(), "http://localhost:8080/chat");
        assert_eq!(client.default_model(), "local");
    }
}
