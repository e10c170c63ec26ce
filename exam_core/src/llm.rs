use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Structure for the OpenAI Chat API request
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Structure for the OpenAI Chat API response
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Async client for OpenAI-compatible chat completion endpoints.
#[derive(Debug, Clone)]
pub struct LlmClient {
    api_key: String,
    client: Client,
    model: String,
    base_url: String,
    temperature: f32,
}

impl LlmClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::new(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.7,
        }
    }

    /// Create a client from `OPENAI_API_KEY`, `LLM_MODEL` and `LLM_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY must be set in the environment")?;
        let model = env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let mut client = Self::new(api_key, model);
        if let Ok(base_url) = env::var("LLM_BASE_URL") {
            if !base_url.trim().is_empty() {
                client = client.with_base_url(base_url);
            }
        }
        Ok(client)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a prompt and return the first reply as plain text.
    pub async fn complete_text(&self, system: &str, user: &str) -> Result<String> {
        let reply = self.chat(system, user, None).await?;
        Ok(reply.trim().to_string())
    }

    /// Send a prompt in JSON mode and decode the reply into `T`.
    pub async fn complete_json<T: DeserializeOwned>(&self, system: &str, user: &str) -> Result<T> {
        let reply = self
            .chat(system, user, Some(ResponseFormat { kind: "json_object" }))
            .await?;
        let json = strip_code_fences(&reply);
        serde_json::from_str(json).with_context(|| {
            format!(
                "model reply is not valid JSON for {}",
                std::any::type_name::<T>()
            )
        })
    }

    async fn chat(
        &self,
        system: &str,
        user: &str,
        response_format: Option<ResponseFormat>,
    ) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let req_body = ChatRequest {
            model: &self.model,
            messages: vec![
                Message { role: "system", content: system },
                Message { role: "user", content: user },
            ],
            temperature: self.temperature,
            response_format,
        };

        debug!(model = %self.model, prompt_len = user.len(), "sending chat completion");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&req_body)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()? // convert non-200 into error
            .json::<ChatResponse>()
            .await
            .context("chat completion response could not be decoded")?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("chat completion returned no content"))
    }
}

/// Models occasionally wrap JSON in markdown fences even in JSON mode.
pub(crate) fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
