//! PaperForge paper-context ranking service.
//!
//! The thin HTTP shell (C0) around `paperforge-core`'s request-entry
//! pipeline (C1-C9): installs tracing, loads settings once, builds the
//! process-wide singletons (upstream client, embedding client, circuit
//! breaker, DynamoDB-backed cache and rate limiter), and serves a single
//! ranking route.

mod error;
mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::signal;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};

use paperforge_core::cache::EmbeddingCache;
use paperforge_core::circuit_breaker::CircuitBreaker;
use paperforge_core::embeddings::RemoteEmbeddingClient;
use paperforge_core::ranker::Ranker;
use paperforge_core::rate_limit::RateLimiter;
use paperforge_core::request::RequestEntry;
use paperforge_core::settings::Settings;
use paperforge_core::upstream::SemanticScholarClient;

/// Shared across requests; built once at startup.
pub struct AppState {
    pub request_entry: RequestEntry,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .json()
        .init();

    info!("Starting PaperForge paper-context ranking service v{}", paperforge_core::VERSION);

    let settings = Settings::load().map_err(|e| {
        tracing::error!(error = %e, "failed to load configuration");
        e
    })?;

    if settings.server.metrics_port != 0 {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], settings.server.metrics_port))
            .install()
            .map_err(|e| {
                tracing::warn!(error = %e, "failed to install prometheus exporter");
            })
            .ok();
        paperforge_core::metrics::register_metrics();
    }

    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(settings.upstream_region.clone()))
        .load()
        .await;
    let dynamo = aws_sdk_dynamodb::Client::new(&aws_config);

    let timeout = Duration::from_secs(settings.server.request_timeout_secs);
    let circuit_breaker = Arc::new(CircuitBreaker::new(
        settings.circuit_breaker_threshold,
        settings.circuit_breaker_open_seconds,
    ));

    let search_client = Arc::new(SemanticScholarClient::new(
        settings.upstream_base_url.clone(),
        settings.upstream_api_key.clone(),
        settings.candidate_limit,
        timeout,
        circuit_breaker,
    ));

    let embedding_client = Arc::new(RemoteEmbeddingClient::new(
        format!("https://bedrock-runtime.{}.amazonaws.com/model/{}/invoke", settings.upstream_region, settings.embed_model_id),
        settings.embed_model_id.clone(),
        timeout,
    ));

    let cache = Arc::new(EmbeddingCache::new(dynamo.clone()));
    let rate_limiter = Arc::new(RateLimiter::new(dynamo));

    let settings = Arc::new(settings);
    let ranker = Arc::new(Ranker {
        settings: settings.clone(),
        search_client,
        embedding_client,
        cache,
    });

    let state = Arc::new(AppState {
        request_entry: RequestEntry { settings: settings.clone(), ranker, rate_limiter },
    });

    let app = create_router(state);

    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>().unwrap_or([0, 0, 0, 0].into()),
        settings.server.port,
    ));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn create_router(state: Arc<AppState>) -> Router {
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    Router::new()
        .route("/health", get(handlers::health::health))
        .nest(
            "/v2",
            Router::new().route("/search", post(handlers::search::search)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("received SIGTERM, starting shutdown..."),
    }
}
