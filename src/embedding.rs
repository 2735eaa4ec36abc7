//! Embedding providers.
//!
//! Every pipeline owns its own provider instance, even when two pipelines
//! name the same model.

use crate::error::{RagError, Result};
use crate::llm::ApiError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Maps texts to fixed-length vectors, one per input, in input order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Name of the underlying model.
    fn model_name(&self) -> &str;

    /// Embed a batch. Must fail rather than return a short or reordered batch.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
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

/// Client for an OpenAI-compatible `/v1/embeddings` endpoint.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/embeddings", self.api_base.trim_end_matches('/'))
    }

    async fn request(&self, texts: &[String]) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(RagError::LlmApi(format!("API error ({}): {}", status, message)));
        }

        Ok(body)
    }

    /// Order the returned vectors by their `index` and check the batch shape.
    fn decode(&self, body: &str, expected: usize) -> Result<Vec<Vec<f32>>> {
        let mut response: EmbeddingResponse =
            serde_json::from_str(body).map_err(|e| RagError::embedding(&self.model, e))?;

        if response.data.len() != expected {
            return Err(RagError::embedding(
                &self.model,
                format!(
                    "expected {} embeddings, got {}",
                    expected,
                    response.data.len()
                ),
            ));
        }

        response.data.sort_by_key(|d| d.index);
        if response.data.iter().enumerate().any(|(i, d)| d.index != i) {
            return Err(RagError::embedding(
                &self.model,
                "response indices are not a permutation of the input",
            ));
        }

        let vectors: Vec<Vec<f32>> = response.data.into_iter().map(|d| d.embedding).collect();
        if let Some(first) = vectors.first() {
            let dim = first.len();
            if dim == 0 || vectors.iter().any(|v| v.len() != dim) {
                return Err(RagError::embedding(
                    &self.model,
                    "vectors have inconsistent dimensionality",
                ));
            }
        }

        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(model = %self.model, batch = texts.len(), "requesting embeddings");
        let body = self
            .request(texts)
            .await
            .map_err(|e| RagError::embedding(&self.model, e))?;
        self.decode(&body, texts.len())
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 for vectors of different length or zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder() -> OpenAiEmbedder {
        OpenAiEmbedder::new("https://api.example.com/", "key", "text-embedding-3-small")
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 1e-6);

        assert_eq!(cosine_similarity(&a, &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(embedder().endpoint(), "https://api.example.com/v1/embeddings");
    }

    #[test]
    fn test_decode_restores_input_order() {
        let body = r#"{"data":[
            {"embedding":[0.0,1.0],"index":1},
            {"embedding":[1.0,0.0],"index":0}
        ]}"#;
        let vectors = embedder().decode(body, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_decode_rejects_short_batch() {
        let body = r#"{"data":[{"embedding":[1.0],"index":0}]}"#;
        let err = embedder().decode(body, 3).unwrap_err();
        assert!(matches!(err, RagError::Embedding { .. }));
    }

    #[test]
    fn test_decode_rejects_ragged_vectors() {
        let body = r#"{"data":[
            {"embedding":[1.0,0.0],"index":0},
            {"embedding":[1.0],"index":1}
        ]}"#;
        assert!(embedder().decode(body, 2).is_err());
    }

    #[test]
    fn test_empty_batch_skips_network() {
        let vectors = tokio_test::block_on(embedder().embed(&[])).unwrap();
        assert!(vectors.is_empty());
    }
}
