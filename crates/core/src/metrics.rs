//! Metrics for the ranking pipeline, following the naming convention and
//! `describe_*`-then-`counter!`/`histogram!` shape of this repo's other
//! services (`paperforge_<noun>_<unit>`), trimmed to the signals this
//! single-route service actually produces: request volume/latency,
//! cache hit rate, embedding latency, and upstream call outcomes.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

pub const METRICS_PREFIX: &str = "paperforge";

/// Register metric descriptions once at process startup, before the first
/// request is served.
pub fn register_metrics() {
    describe_counter!(
        format!("{METRICS_PREFIX}_requests_total"),
        Unit::Count,
        "Total number of paper-search requests, by outcome"
    );
    describe_histogram!(
        format!("{METRICS_PREFIX}_request_duration_seconds"),
        Unit::Seconds,
        "Paper-search request latency in seconds"
    );
    describe_counter!(
        format!("{METRICS_PREFIX}_cache_hits_total"),
        Unit::Count,
        "Total embedding-cache hits"
    );
    describe_counter!(
        format!("{METRICS_PREFIX}_cache_misses_total"),
        Unit::Count,
        "Total embedding-cache misses"
    );
    describe_histogram!(
        format!("{METRICS_PREFIX}_embedding_duration_seconds"),
        Unit::Seconds,
        "Embedding call latency in seconds"
    );
    describe_counter!(
        format!("{METRICS_PREFIX}_embedding_errors_total"),
        Unit::Count,
        "Total embedding call failures"
    );
    describe_counter!(
        format!("{METRICS_PREFIX}_upstream_requests_total"),
        Unit::Count,
        "Total upstream search calls, by outcome"
    );

    tracing::info!("metrics registered");
}

/// Record one finished request: its outcome tag (`success`, or the
/// `CoreError::error_type()` of whatever failed it) and latency.
pub fn record_request(outcome: &str, duration_secs: f64) {
    counter!(
        format!("{METRICS_PREFIX}_requests_total"),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(format!("{METRICS_PREFIX}_request_duration_seconds")).record(duration_secs);
}

/// Record one embedding-cache lookup.
pub fn record_cache(hit: bool) {
    let name = if hit {
        format!("{METRICS_PREFIX}_cache_hits_total")
    } else {
        format!("{METRICS_PREFIX}_cache_misses_total")
    };
    counter!(name).increment(1);
}

/// Record one `embed_one` call.
pub fn record_embedding(duration_secs: f64, success: bool) {
    if success {
        histogram!(format!("{METRICS_PREFIX}_embedding_duration_seconds")).record(duration_secs);
    } else {
        counter!(format!("{METRICS_PREFIX}_embedding_errors_total")).increment(1);
    }
}

/// Record one upstream search call outcome (`success`, `circuit_open`,
/// `rate_limited`, or `request_failed`).
pub fn record_upstream(outcome: &str) {
    counter!(
        format!("{METRICS_PREFIX}_upstream_requests_total"),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}
