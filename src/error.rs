//! Error taxonomy for the pipeline.
//!
//! Most failures are local: a source or a batch contributes nothing this run and is
//! retried on the next one. Only a corrupt state blob or a bad configuration stops
//! processing at the boundary where it is detected.

use thiserror::Error;

/// What the caller should do with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Skip this source/batch for the current run; the next run retries it.
    SkipAndRetry,
    /// Stop processing at this boundary (caller decides the fallback).
    StopProcessing,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("llm call failed: {0}")]
    Llm(String),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("storage error: {0:#}")]
    Storage(#[source] anyhow::Error),

    #[error("persisted state is corrupt: {0}")]
    StateCorrupt(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn fetch(url: &str, reason: impl ToString) -> Self {
        Self::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn recovery(&self) -> Recovery {
        match self {
            Self::Fetch { .. } | Self::Llm(_) | Self::Extraction(_) | Self::Storage(_) => {
                Recovery::SkipAndRetry
            }
            Self::StateCorrupt(_) | Self::Config(_) => Recovery::StopProcessing,
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
