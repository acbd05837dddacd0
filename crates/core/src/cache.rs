//! Content-addressed embedding cache, backed by DynamoDB.
//!
//! A reader only accepts a stored embedding if the record's `contentHash`
//! matches the caller's content hash; any mismatch, missing attribute, or
//! malformed vector is treated as a cache miss, never as an error.

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::models::Embedding;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("DynamoDB request failed: {0}")]
    Dynamo(String),
}

/// Content-addressed embedding store. The DynamoDB-backed
/// [`EmbeddingCache`] is the production implementation; tests substitute
/// an in-memory fake behind the same trait.
#[async_trait]
pub trait EmbeddingCacheStore: Send + Sync {
    async fn get(
        &self,
        table_name: &str,
        paper_id: &str,
        content_hash: &str,
    ) -> Result<(Option<Embedding>, bool), CacheError>;

    async fn put(
        &self,
        table_name: &str,
        paper_id: &str,
        content_hash: &str,
        embedding: &Embedding,
        ttl_days: i64,
    ) -> Result<(), CacheError>;
}

pub struct EmbeddingCache {
    client: Client,
}

impl EmbeddingCache {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get_inner(
        &self,
        table_name: &str,
        paper_id: &str,
        content_hash: &str,
    ) -> Result<(Option<Embedding>, bool), CacheError> {
        let output = self
            .client
            .get_item()
            .table_name(table_name)
            .key("paperId", AttributeValue::S(paper_id.to_string()))
            .consistent_read(false)
            .send()
            .await
            .map_err(|e| CacheError::Dynamo(e.to_string()))?;

        let Some(item) = output.item else {
            return Ok((None, false));
        };

        let stored_hash = item.get("contentHash").and_then(|v| v.as_s().ok());
        if stored_hash != Some(&content_hash.to_string()) {
            return Ok((None, false));
        }

        match item.get("embedding").and_then(|v| attr_to_embedding(v)) {
            Some(vector) if !vector.is_empty() => Ok((Some(vector), true)),
            _ => Ok((None, false)),
        }
    }
}

#[async_trait]
impl EmbeddingCacheStore for EmbeddingCache {
    /// Returns `(Some(embedding), true)` on a valid, content-hash-matching
    /// hit; `(None, false)` on anything else (no record, hash mismatch,
    /// or malformed stored vector).
    async fn get(
        &self,
        table_name: &str,
        paper_id: &str,
        content_hash: &str,
    ) -> Result<(Option<Embedding>, bool), CacheError> {
        let result = self.get_inner(table_name, paper_id, content_hash).await?;
        crate::metrics::record_cache(result.1);
        Ok(result)
    }

    /// Unconditionally writes the full record. Concurrent writers for the Concurrent writers for the
    /// same key race on last-writer-wins, which is acceptable because a
    /// record's value is a pure function of its content hash.
    async fn put(
        &self,
        table_name: &str,
        paper_id: &str,
        content_hash: &str,
        embedding: &Embedding,
        ttl_days: i64,
    ) -> Result<(), CacheError> {
        let ttl_seconds = now_epoch_seconds() + ttl_days.max(1) * 86_400;
        let updated_at = chrono::Utc::now().to_rfc3339();

        self.client
            .put_item()
            .table_name(table_name)
            .item("paperId", AttributeValue::S(paper_id.to_string()))
            .item("contentHash", AttributeValue::S(content_hash.to_string()))
            .item("embedding", embedding_to_attr(embedding))
            .item("updatedAt", AttributeValue::S(updated_at))
            .item("ttl", AttributeValue::N(ttl_seconds.to_string()))
            .send()
            .await
            .map_err(|e| CacheError::Dynamo(e.to_string()))?;

        Ok(())
    }
}

fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the unix epoch")
        .as_secs() as i64
}

/// Formats a float with up to 8 decimal digits, trimming trailing zeros
/// and a trailing decimal point, matching the source system's
/// `f"{value:.8f}".rstrip("0").rstrip(".")` behavior exactly so stored
/// values round-trip without precision loss.
fn format_number(value: f64) -> String {
    let formatted = format!("{value:.8}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn embedding_to_attr(embedding: &Embedding) -> AttributeValue {
    let values = embedding
        .iter()
        .map(|v| AttributeValue::N(format_number(*v)))
        .collect();
    AttributeValue::L(values)
}

fn attr_to_embedding(attr: &AttributeValue) -> Option<Embedding> {
    let list = attr.as_l().ok()?;
    let mut embedding = Vec::with_capacity(list.len());
    for item in list {
        let number = item.as_n().ok()?;
        embedding.push(number.parse::<f64>().ok()?);
    }
    Some(embedding)
}
