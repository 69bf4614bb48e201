// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod clean;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod history;
pub mod metrics;
pub mod model;
pub mod personalization;
pub mod pipeline;
pub mod ranking;
pub mod regrade;
pub mod storage;
pub mod venue;

// Fetching (web pages, data endpoints, arxiv pagination) + scheduler
pub mod ingest;

// LLM boundary, prompts and the extractor
pub mod analyze;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::config::PipelineConfig;
pub use crate::error::{PipelineError, Recovery};
pub use crate::pipeline::{Pipeline, RunSummary};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. `RUST_LOG` overrides the default filter;
/// `LOG_FORMAT=json` switches to JSON lines. A second call is a no-op.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tech_radar=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
