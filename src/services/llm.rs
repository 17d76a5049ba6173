use crate::config::LlmConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;

/// A hosted text-completion model: one rendered prompt in, one text out.
pub trait Completion {
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send;
}

pub struct LLMClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

impl LLMClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        if config.api_key.is_none() {
            tracing::warn!("LLM_API_KEY is not set; requests to {} are unauthenticated", config.api_url);
        }

        Ok(LLMClient {
            client: reqwest::Client::builder()
                .build()
                .context("failed to build LLM HTTP client")?,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

impl Completion for LLMClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut request_builder = self
            .client
            .post(&self.api_url)
            .header("Content-Type", "application/json")
            .json(&json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": prompt }],
                "temperature": self.temperature,
                "stream": false
            }));

        if let Some(api_key) = &self.api_key {
            request_builder = request_builder.bearer_auth(api_key);
        }

        let response = request_builder
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.api_url))?;

        let status = response.status();
        let response_text = response.text().await?;
        if !status.is_success() {
            anyhow::bail!("completion request failed ({}): {}", status, response_text);
        }

        tracing::debug!(bytes = response_text.len(), "completion received");
        parse_completion(&response_text)
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

fn parse_completion(body: &str) -> Result<String> {
    let parsed: ChatResponse =
        serde_json::from_str(body).context("failed to parse completion response")?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .context("completion response contained no message content")
}
