//! LLM boundary: one chat-completion call in, raw text out.
//!
//! `OpenAiCompatProvider` talks to any OpenAI-compatible `/chat/completions` endpoint
//! (DeepSeek by default). `ScriptedClient` replays canned responses for tests and
//! counts calls.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::{PipelineError, Result};

pub trait LlmClient: Send + Sync {
    /// One completion for a system + user message pair.
    fn complete<'a>(
        &'a self,
        system: &'a str,
        user: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynLlmClient = Arc<dyn LlmClient>;

/// Factory: build a client according to config and environment variables.
///
/// * `LLM_TEST_MODE=mock` → a scripted client that answers `[]` to everything.
/// * `enabled = false` → `DisabledClient` (every call fails, so fingerprints stay put).
/// * otherwise the OpenAI-compatible provider; a missing key is an error.
pub fn build_client(cfg: &LlmConfig) -> anyhow::Result<DynLlmClient> {
    if std::env::var("LLM_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Ok(Arc::new(ScriptedClient::always("[]")));
    }
    if !cfg.enabled {
        return Ok(Arc::new(DisabledClient));
    }
    let resolved = cfg.clone().resolved()?;
    Ok(Arc::new(OpenAiCompatProvider::new(resolved)?))
}

// ------------------------------------------------------------
// OpenAI-compatible provider
// ------------------------------------------------------------

pub struct OpenAiCompatProvider {
    http: reqwest::Client,
    cfg: LlmConfig,
}

impl OpenAiCompatProvider {
    /// `cfg` must already be `resolved()`.
    pub fn new(cfg: LlmConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("tech-radar/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self { http, cfg })
    }
}

impl LlmClient for OpenAiCompatProvider {
    fn complete<'a>(
        &'a self,
        system: &'a str,
        user: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: Vec<Msg<'a>>,
                temperature: f32,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                #[serde(default)]
                content: Option<String>,
            }

            let req = Req {
                model: &self.cfg.model,
                messages: vec![
                    Msg {
                        role: "system",
                        content: system,
                    },
                    Msg {
                        role: "user",
                        content: user,
                    },
                ],
                temperature: self.cfg.temperature,
            };

            let resp = self
                .http
                .post(self.cfg.completions_url())
                .bearer_auth(&self.cfg.api_key)
                .json(&req)
                .send()
                .await
                .map_err(|e| PipelineError::Llm(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                let snippet: String = body.chars().take(200).collect();
                return Err(PipelineError::Llm(format!("status {status}: {snippet}")));
            }
            let body: Resp = resp
                .json()
                .await
                .map_err(|e| PipelineError::Llm(format!("decoding response: {e}")))?;
            body.choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .map(|s| s.trim().to_string())
                .ok_or_else(|| PipelineError::Llm("response has no choices".into()))
        })
    }

    fn provider_name(&self) -> &'static str {
        "openai-compatible"
    }
}

// ------------------------------------------------------------
// Disabled + scripted clients
// ------------------------------------------------------------

/// Fails every call; used when `llm.enabled = false`.
pub struct DisabledClient;

impl LlmClient for DisabledClient {
    fn complete<'a>(
        &'a self,
        _system: &'a str,
        _user: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async { Err(PipelineError::Llm("llm disabled by configuration".into())) })
    }

    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

type Responder = Box<dyn Fn(&str, &str) -> std::result::Result<String, String> + Send + Sync>;

/// Deterministic client for tests and local runs.
///
/// Queued responses are consumed first (`Err` entries simulate failed calls), then the
/// responder (if any) answers; otherwise the call fails.
#[derive(Default)]
pub struct ScriptedClient {
    queue: Mutex<VecDeque<std::result::Result<String, String>>>,
    responder: Option<Responder>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queue: Mutex::new(responses.into_iter().map(|s| Ok(s.into())).collect()),
            ..Self::default()
        }
    }

    pub fn always(response: &str) -> Self {
        let response = response.to_string();
        Self::with_responder(move |_, _| Ok(response.clone()))
    }

    pub fn with_responder<F>(f: F) -> Self
    where
        F: Fn(&str, &str) -> std::result::Result<String, String> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(f)),
            ..Self::default()
        }
    }

    /// Queue a failing call.
    pub fn push_err(&self, reason: &str) {
        if let Ok(mut q) = self.queue.lock() {
            q.push_back(Err(reason.to_string()));
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// User messages seen so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl LlmClient for ScriptedClient {
    fn complete<'a>(
        &'a self,
        system: &'a str,
        user: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut p) = self.prompts.lock() {
            p.push(user.to_string());
        }
        let queued = self.queue.lock().ok().and_then(|mut q| q.pop_front());
        let out = match queued {
            Some(r) => r,
            None => match &self.responder {
                Some(f) => f(system, user),
                None => Err("script exhausted".to_string()),
            },
        };
        Box::pin(async move { out.map_err(PipelineError::Llm) })
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_queue_then_responder() {
        let client = ScriptedClient::new(["[1]"]);
        client.push_err("boom");
        assert_eq!(client.complete("s", "u1").await.unwrap(), "[1]");
        assert!(client.complete("s", "u2").await.is_err());
        assert!(client.complete("s", "u3").await.is_err());
        assert_eq!(client.calls(), 3);
        assert_eq!(client.prompts(), vec!["u1", "u2", "u3"]);

        let echo = ScriptedClient::with_responder(|_, user| Ok(user.to_uppercase()));
        assert_eq!(echo.complete("s", "abc").await.unwrap(), "ABC");
    }

    #[tokio::test]
    async fn disabled_client_fails() {
        let err = DisabledClient.complete("s", "u").await.unwrap_err();
        assert!(matches!(err, PipelineError::Llm(_)));
    }

    #[serial_test::serial]
    #[test]
    fn factory_honours_enabled_flag() {
        std::env::remove_var("LLM_TEST_MODE");
        let cfg = LlmConfig {
            enabled: false,
            ..LlmConfig::default()
        };
        assert_eq!(build_client(&cfg).unwrap().provider_name(), "disabled");

        std::env::set_var("LLM_TEST_MODE", "mock");
        assert_eq!(build_client(&LlmConfig::default()).unwrap().provider_name(), "scripted");
        std::env::remove_var("LLM_TEST_MODE");
    }
}
