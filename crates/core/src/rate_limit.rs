//! Per-IP, per-minute request counter backed by a single atomic
//! conditional update against DynamoDB. Correct under concurrency
//! because the limit check and the increment are one serialized
//! operation, not a read-modify-write pair.

use async_trait::async_trait;
use aws_sdk_dynamodb::error::ProvideErrorMetadata;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("DynamoDB request failed: {0}")]
    Dynamo(String),
}

/// A per-IP, per-minute counter store. The DynamoDB-backed
/// [`RateLimiter`] is the production implementation; tests substitute an
/// in-memory fake behind the same trait.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn check(
        &self,
        table_name: &str,
        source_ip: &str,
        per_minute_limit: u32,
    ) -> Result<bool, RateLimitError>;
}

pub struct RateLimiter {
    client: Client,
}

impl RateLimiter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds `"{source_ip}#{epoch_minute}"`, defaulting to `"unknown"`
    /// when `source_ip` is empty or absent.
    pub fn bucket_key(source_ip: &str, epoch_minute: i64) -> String {
        let normalized = source_ip.trim();
        let ip = if normalized.is_empty() {
            "unknown"
        } else {
            normalized
        };
        format!("{ip}#{epoch_minute}")
    }
}

#[async_trait]
impl RateLimitStore for RateLimiter {
    /// Returns `true` if the request is allowed (the conditional
    /// increment applied), `false` if the caller is over the per-minute
    /// limit. Any other store failure is propagated to the caller, which
    /// maps it to a 500 rather than silently allowing or blocking.
    async fn check(
        &self,
        table_name: &str,
        source_ip: &str,
        per_minute_limit: u32,
    ) -> Result<bool, RateLimitError> {
        let epoch_minute = now_epoch_seconds() / 60;
        let key = Self::bucket_key(source_ip, epoch_minute);
        let ttl_seconds = epoch_minute * 60 + 180;
        let limit = per_minute_limit.max(1);

        let result = self
            .client
            .update_item()
            .table_name(table_name)
            .key("bucketKey", AttributeValue::S(key))
            .update_expression("SET #count = if_not_exists(#count, :zero) + :inc, #ttl = :ttl")
            .condition_expression("attribute_not_exists(#count) OR #count < :limit")
            .expression_attribute_names("#count", "requestCount")
            .expression_attribute_names("#ttl", "ttl")
            .expression_attribute_values(":zero", AttributeValue::N("0".to_string()))
            .expression_attribute_values(":inc", AttributeValue::N("1".to_string()))
            .expression_attribute_values(":limit", AttributeValue::N(limit.to_string()))
            .expression_attribute_values(":ttl", AttributeValue::N(ttl_seconds.to_string()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                if err.code() == Some("ConditionalCheckFailedException") {
                    Ok(false)
                } else {
                    Err(RateLimitError::Dynamo(err.to_string()))
                }
            }
        }
    }
}

fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the unix epoch")
        .as_secs() as i64
}
