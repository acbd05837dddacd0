//! PaperForge core library
//!
//! The stateless context-ranking pipeline: takes a free-text research
//! context and returns the top-K papers ranked by similarity to it.
//! Everything in this crate is transport-agnostic; `paperforge-service`
//! is the thin HTTP shell around [`request::RequestEntry::handle_event`].

pub mod cache;
pub mod circuit_breaker;
pub mod embeddings;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod query;
pub mod ranker;
pub mod rate_limit;
pub mod request;
pub mod settings;
pub mod similarity;
pub mod upstream;

pub use errors::{CoreError, Result};
pub use settings::Settings;

/// Crate version, surfaced in health checks.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
