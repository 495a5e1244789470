use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

// --- Model trait ---

pub trait LanguageModel: Send + Sync {
    fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;
    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelKind {
    Anthropic,
    OpenAI,
}

#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub kind: ModelKind,
    pub model_id: String,
    pub short_name: String,
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub fn resolve_model(name: &str) -> Result<ModelSpec> {
    let (kind, model_id, short_name) = match name {
        // Anthropic (requires ANTHROPIC_API_KEY)
        "claude-sonnet" | "sonnet" => (ModelKind::Anthropic, "claude-sonnet-4-5-20250929", "claude-sonnet"),
        "claude-opus" | "opus" => (ModelKind::Anthropic, "claude-opus-4-6", "claude-opus"),
        "claude-haiku" | "haiku" => (ModelKind::Anthropic, "claude-haiku-4-5-20251001", "claude-haiku"),
        // OpenAI (requires OPENAI_API_KEY)
        "gpt-4o" => (ModelKind::OpenAI, "gpt-4o", "gpt-4o"),
        "gpt-4o-mini" => (ModelKind::OpenAI, "gpt-4o-mini", "gpt-4o-mini"),
        _ => {
            return Err(anyhow!(
                "Unknown model '{}'. Available: claude-sonnet (default), claude-opus, claude-haiku, \
                 gpt-4o, gpt-4o-mini",
                name
            ));
        }
    };
    Ok(ModelSpec {
        kind,
        model_id: model_id.to_string(),
        short_name: short_name.to_string(),
    })
}

pub fn create_model(spec: &ModelSpec) -> Result<Box<dyn LanguageModel>> {
    match spec.kind {
        ModelKind::Anthropic => Ok(Box::new(AnthropicModel::new(spec.model_id.clone())?)),
        ModelKind::OpenAI => Ok(Box::new(OpenAIModel::new(spec.model_id.clone())?)),
    }
}

fn http_client() -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}

// --- Anthropic ---

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com";

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug)]
pub struct AnthropicModel {
    api_key: String,
    model_id: String,
    base_url: String,
    client: reqwest::blocking::Client,
}

impl AnthropicModel {
    pub fn new(model_id: String) -> Result<Self> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY environment variable not set. Set it with: export ANTHROPIC_API_KEY=your-key-here")?;
        Self::with_key(api_key, model_id)
    }

    pub fn with_key(api_key: String, model_id: String) -> Result<Self> {
        Ok(Self {
            api_key,
            model_id,
            base_url: ANTHROPIC_API_URL.to_string(),
            client: http_client()?,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

impl LanguageModel for AnthropicModel {
    fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = AnthropicRequest {
            model: self.model_id.clone(),
            max_tokens,
            temperature: 0.0,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .context("Failed to send request to Anthropic API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "Anthropic API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: AnthropicResponse = response
            .json()
            .context("Failed to parse Anthropic API response")?;

        api_response
            .content
            .first()
            .map(|block| block.text.clone())
            .ok_or_else(|| anyhow!("No content in Anthropic API response"))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- OpenAI ---

const OPENAI_API_URL: &str = "https://api.openai.com";

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug)]
pub struct OpenAIModel {
    api_key: String,
    model_id: String,
    base_url: String,
    client: reqwest::blocking::Client,
}

impl OpenAIModel {
    pub fn new(model_id: String) -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY environment variable not set. Set it with: export OPENAI_API_KEY=your-key-here")?;
        Self::with_key(api_key, model_id)
    }

    pub fn with_key(api_key: String, model_id: String) -> Result<Self> {
        Ok(Self {
            api_key,
            model_id,
            base_url: OPENAI_API_URL.to_string(),
            client: http_client()?,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

impl LanguageModel for OpenAIModel {
    fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = OpenAIRequest {
            model: self.model_id.clone(),
            max_tokens,
            temperature: 0.0,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .context("Failed to send request to OpenAI API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "OpenAI API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: OpenAIResponse = response
            .json()
            .context("Failed to parse OpenAI API response")?;

        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("No choices in OpenAI API response"))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}
