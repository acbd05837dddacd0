//! Orchestrates query building, upstream search, embedding, caching, and
//! scoring into a single ranked result set.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::EmbeddingCacheStore;
use crate::embeddings::{embed_batch_indexed, EmbeddingClient};
use crate::models::{CandidatePaper, RankMeta, RankOutcome, RankedResult};
use crate::query::{build_embedding_text, build_upstream_query, content_hash};
use crate::settings::Settings;
use crate::similarity::cosine_similarity;
use crate::upstream::{SearchClient, UpstreamError};

#[derive(Debug, thiserror::Error)]
pub enum RankError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("embedding request failed: {0}")]
    Embedding(#[from] crate::embeddings::EmbeddingError),
    #[error("cache request failed: {0}")]
    Cache(#[from] crate::cache::CacheError),
}

const ABSTRACT_SNIPPET_MAX_CHARS: usize = 320;

pub struct Ranker {
    pub settings: Arc<Settings>,
    pub search_client: Arc<dyn SearchClient>,
    pub embedding_client: Arc<dyn EmbeddingClient>,
    pub cache: Arc<dyn EmbeddingCacheStore>,
}

impl Ranker {
    pub async fn rank(&self, context: &str, k: u32) -> Result<RankOutcome, RankError> {
        let query = build_upstream_query(context);
        let candidates = self.search_client.search_papers(&query).await?;
        let query_embedding = self.embedding_client.embed_one(context, true).await?;

        let mut embeddings_by_index: HashMap<usize, Vec<f64>> = HashMap::new();
        let mut cached_hits = 0usize;
        let mut pending: Vec<(usize, String)> = Vec::new();
        let mut pending_meta: HashMap<usize, String> = HashMap::new();

        for (index, candidate) in candidates.iter().enumerate() {
            let hash = content_hash(&candidate.title, &candidate.abstract_text);
            let (cached, hit) = self
                .cache
                .get(
                    &self.settings.paper_embeddings_table_name,
                    &candidate.paper_id,
                    &hash,
                )
                .await?;

            if hit {
                if let Some(vector) = cached {
                    embeddings_by_index.insert(index, vector);
                    cached_hits += 1;
                }
                continue;
            }

            let embedding_text = build_embedding_text(&candidate.title, &candidate.abstract_text);
            if embedding_text.is_empty() {
                continue;
            }
            pending.push((index, embedding_text));
            pending_meta.insert(index, hash);
        }

        if !pending.is_empty() {
            let embedded = embed_batch_indexed(
                self.embedding_client.as_ref(),
                pending,
                self.settings.embedding_max_workers,
            )
            .await;

            for (index, vector) in embedded {
                let Some(candidate) = candidates.get(index) else {
                    continue;
                };
                let Some(hash) = pending_meta.get(&index) else {
                    continue;
                };
                self.cache
                    .put(
                        &self.settings.paper_embeddings_table_name,
                        &candidate.paper_id,
                        hash,
                        &vector,
                        self.settings.paper_embedding_ttl_days,
                    )
                    .await?;
                embeddings_by_index.insert(index, vector);
            }
        }

        let candidates_fetched = candidates.len();

        let mut ranked: Vec<(usize, CandidatePaper, f64)> = candidates
            .into_iter()
            .enumerate()
            .filter_map(|(index, candidate)| {
                embeddings_by_index.get(&index).map(|vector| {
                    let score = cosine_similarity(&query_embedding, vector);
                    (index, candidate, score)
                })
            })
            .collect();

        // Stable sort: descending score, ties keep original upstream order
        // because `sort_by` is a stable sort over the input order.
        ranked.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

        let results: Vec<RankedResult> = ranked
            .into_iter()
            .take(k as usize)
            .map(|(_, paper, score)| RankedResult {
                paper_id: paper.paper_id,
                title: paper.title,
                authors: paper.authors,
                year: paper.year,
                venue: paper.venue,
                url: paper.url,
                score: round4(score),
                abstract_snippet: abstract_snippet(&paper.abstract_text),
            })
            .collect();

        Ok(RankOutcome {
            results,
            meta: RankMeta {
                candidates_fetched,
                cached_embeddings_used: cached_hits,
                request_id: None,
                latency_ms: None,
            },
        })
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn abstract_snippet(abstract_text: &str) -> String {
    let normalized: String = abstract_text.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return "Abstract not available.".to_string();
    }
    if normalized.chars().count() <= ABSTRACT_SNIPPET_MAX_CHARS {
        return normalized;
    }
    let truncated: String = normalized
        .chars()
        .take(ABSTRACT_SNIPPET_MAX_CHARS - 1)
        .collect();
    format!("{}...", truncated.trim_end())
}
