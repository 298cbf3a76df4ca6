//! OpenAI-compatible `/embeddings` client.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{validate_embedding, Embedder};
use crate::http::{build_client, describe_send_error, parse_json_response};

pub struct OpenAIEmbedder {
    endpoint: String,
    api_key: String,
    model: String,
    dimension: usize,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAIEmbedder {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = endpoint.into();
        let model = model.into();
        let client = build_client(timeout.min(Duration::from_secs(15)), timeout)?;

        tracing::info!(
            endpoint = %endpoint,
            model = %model,
            dimension,
            "Creating OpenAIEmbedder"
        );

        Ok(Self {
            endpoint,
            api_key: api_key.into(),
            model,
            dimension,
            client,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = json!({
            "model": self.model,
            "input": text,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| describe_send_error(&self.endpoint, e))?;

        let body: EmbeddingResponse = parse_json_response(response, &self.endpoint).await?;
        let vector = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| anyhow!("Embedding response from {} had no data", self.endpoint))?;

        validate_embedding(&vector, self.dimension)?;
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}
