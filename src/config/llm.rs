// src/config/llm.rs
use serde::{Deserialize, Serialize};
use std::env;

fn default_enabled() -> bool {
    true
}
fn default_base_url() -> String {
    "https://api.deepseek.com".to_string()
}
fn default_model() -> String {
    "deepseek-chat".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_api_key_env() -> String {
    "DEEPSEEK_API_KEY".to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// OpenAI-compatible base URL; `/chat/completions` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from the variable named by `api_key_env`.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Pinned low for deterministic extraction.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            base_url: default_base_url(),
            model: default_model(),
            api_key: default_api_key(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Resolve the "ENV" key indirection and sanitize numeric fields.
    pub fn resolved(mut self) -> anyhow::Result<Self> {
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = env::var(&self.api_key_env)
                .map_err(|_| anyhow::anyhow!("Missing {} env var", self.api_key_env))?;
        }
        if self.api_key.trim().is_empty() {
            anyhow::bail!("LLM api key is empty");
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            self.temperature = default_temperature();
        }
        if self.timeout_secs == 0 {
            self.timeout_secs = default_timeout_secs();
        }
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        Ok(self)
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[serial_test::serial]
    #[test]
    fn env_key_is_resolved() {
        env::set_var("RADAR_TEST_LLM_KEY", "sk-test");
        let cfg = LlmConfig {
            api_key_env: "RADAR_TEST_LLM_KEY".into(),
            temperature: 9.0,
            ..LlmConfig::default()
        };
        let cfg = cfg.resolved().unwrap();
        assert_eq!(cfg.api_key, "sk-test");
        assert!((cfg.temperature - 0.1).abs() < f32::EPSILON);
        env::remove_var("RADAR_TEST_LLM_KEY");
    }

    #[serial_test::serial]
    #[test]
    fn missing_env_key_is_an_error() {
        env::remove_var("RADAR_TEST_MISSING_KEY");
        let cfg = LlmConfig {
            api_key_env: "RADAR_TEST_MISSING_KEY".into(),
            ..LlmConfig::default()
        };
        let err = cfg.resolved().unwrap_err();
        assert!(err.to_string().contains("RADAR_TEST_MISSING_KEY"));
    }

    #[test]
    fn completions_url_joins_cleanly() {
        let cfg = LlmConfig {
            base_url: "https://api.deepseek.com/".into(),
            ..LlmConfig::default()
        };
        assert_eq!(cfg.completions_url(), "https://api.deepseek.com/chat/completions");
    }
}
