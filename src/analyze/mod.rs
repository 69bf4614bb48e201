// src/analyze/mod.rs
//! Extraction stage: LLM boundary, prompts, response parsing and validation.

pub mod extract;
pub mod llm;
pub mod prompt;

pub use crate::analyze::extract::{extract_source, ExtractOutcome};
pub use crate::analyze::llm::{build_client, DynLlmClient, LlmClient, ScriptedClient};
