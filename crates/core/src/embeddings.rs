//! Embedding client: single and bounded-concurrency batched calls
//! against the configured embedding model.
//!
//! Mirrors `paperforge_common::embeddings::Embedder` in shape (an
//! `async_trait` over a `reqwest` client) but deliberately carries no
//! retry logic — the circuit breaker and client-visible 5xx are the
//! recovery signal for upstream calls in this pipeline, and retries
//! inside the embedding client would mask that signal for no benefit.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::models::Embedding;

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("embedding response had no vector field")]
    MissingVector,
}

#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed_one(&self, text: &str, normalize: bool) -> Result<Embedding, EmbeddingError>;
}

/// Invokes a Bedrock-style text-embedding endpoint: `POST {host}` with
/// `{"inputText": ..., "normalize": ...}`, expecting either an
/// `embedding` field or the first entry of an `embeddings` array back.
pub struct RemoteEmbeddingClient {
    http: reqwest::Client,
    endpoint: String,
    model_id: String,
}

impl RemoteEmbeddingClient {
    pub fn new(endpoint: String, model_id: String, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("embedding http client builds with static config");
        Self {
            http,
            endpoint,
            model_id,
        }
    }

    async fn embed_one_inner(
        &self,
        text: &str,
        normalize: bool,
    ) -> Result<Embedding, EmbeddingError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&json!({
                "inputText": text,
                "normalize": normalize,
                "modelId": self.model_id,
            }))
            .send()
            .await?
            .error_for_status()?
            .json::<EmbedResponse>()
            .await?;

        if let Some(vector) = response.embedding.filter(|v| !v.is_empty()) {
            return Ok(vector);
        }
        if let Some(vector) = response
            .embeddings
            .and_then(|mut rows| if rows.is_empty() { None } else { Some(rows.remove(0)) })
            .filter(|v| !v.is_empty())
        {
            return Ok(vector);
        }
        Err(EmbeddingError::MissingVector)
    }
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Option<Vec<f64>>,
    embeddings: Option<Vec<Vec<f64>>>,
}

#[async_trait]
impl EmbeddingClient for RemoteEmbeddingClient {
    async fn embed_one(&self, text: &str, normalize: bool) -> Result<Embedding, EmbeddingError> {
        let started_at = std::time::Instant::now();
        let result = self.embed_one_inner(text, normalize).await;
        crate::metrics::record_embedding(started_at.elapsed().as_secs_f64(), result.is_ok());
        result
    }
}

/// Embeds up to `min(max_workers, items.len())` texts concurrently.
/// Per-item failures are logged and omitted from the result map; the
/// call as a whole never fails on a partial error. `items` pairs each
/// text with the caller's own index so the result can be joined back
/// to its originating candidate regardless of completion order.
pub async fn embed_batch_indexed(
    client: &(dyn EmbeddingClient),
    items: Vec<(usize, String)>,
    max_workers: usize,
) -> std::collections::HashMap<usize, Embedding> {
    if items.is_empty() {
        return std::collections::HashMap::new();
    }

    let permits = max_workers.max(1).min(items.len());

    stream::iter(items)
        .map(|(index, text)| async move {
            let result = client.embed_one(&text, true).await;
            (index, result)
        })
        .buffer_unordered(permits)
        .fold(std::collections::HashMap::new(), |mut acc, (index, result)| async move {
            match result {
                Ok(vector) => {
                    acc.insert(index, vector);
                }
                Err(err) => {
                    tracing::warn!(
                        candidate_index = index,
                        error = %err,
                        "paper_embedding_failed"
                    );
                }
            }
            acc
        })
        .await
}
