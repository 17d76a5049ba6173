//! Client for OpenAI-compatible `/embeddings` endpoints.

use crate::config::EmbeddingConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Turns passages into vectors, one per input, in input order.
pub trait Embedder {
    fn embed(&self, inputs: &[&str]) -> impl Future<Output = Result<Vec<Vec<f32>>>> + Send;
}

pub struct EmbeddingClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

impl EmbeddingClient {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        anyhow::ensure!(!config.model.trim().is_empty(), "missing embedding model name");
        Ok(EmbeddingClient {
            client: reqwest::Client::builder()
                .build()
                .context("failed to build embedding HTTP client")?,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

impl Embedder for EmbeddingClient {
    async fn embed(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let mut request_builder = self.client.post(&self.api_url).json(&EmbeddingRequest {
            model: &self.model,
            input: inputs,
        });
        if let Some(api_key) = &self.api_key {
            request_builder = request_builder.bearer_auth(api_key);
        }

        let response = request_builder
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.api_url))?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            anyhow::bail!("embeddings request failed ({}): {}", status, body);
        }

        parse_embeddings(&body, inputs.len())
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    #[serde(borrow)]
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

fn parse_embeddings(body: &str, expected: usize) -> Result<Vec<Vec<f32>>> {
    let mut parsed: EmbeddingResponse =
        serde_json::from_str(body).context("failed to parse embedding response")?;
    parsed.data.sort_by_key(|entry| entry.index);
    anyhow::ensure!(
        parsed.data.len() == expected,
        "embedding endpoint returned {} vectors for {} inputs",
        parsed.data.len(),
        expected
    );
    Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
}
