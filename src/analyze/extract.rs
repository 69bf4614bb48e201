//! Extractor: cleaned text → validated `ExtractedItem`s.
//!
//! - Page sources are one segment; paginated sources are cleaned per entry and sent in
//!   chunks of `batch_size` entries. Output order follows input order.
//! - The response may be wrapped in a code fence; anything but a JSON array is an empty
//!   batch. Failures are per batch and never abort the other batches.
//! - Items without a non-empty `title` and `link` are dropped. Numbers are accepted as
//!   JSON numbers or numeric strings and clamped into range.
//! - Arxiv-family sources: a release claim without an absolute code link is withdrawn.

use metrics::counter;
use serde_json::Value;

use crate::analyze::llm::LlmClient;
use crate::analyze::prompt::{extraction_prompt, extraction_system};
use crate::clean::clean_html;
use crate::config::ExtractConfig;
use crate::error::{PipelineError, Result};
use crate::model::{
    ExtractedItem, RawContent, Source, AI_SCORE_MAX, IMPACT_SCORE_MAX,
};
use crate::venue::VenueAuthority;

/// Appended to `score_reason` when a release claim is withdrawn.
pub const RELEASE_WITHDRAWN_SUFFIX: &str = " [release claim withdrawn: no code link]";

/// Per-source extraction result.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractOutcome {
    pub items: Vec<ExtractedItem>,
    pub batches: usize,
    /// Batches whose model call failed (transport, status, disabled client).
    pub failed_calls: usize,
    /// Batches whose response was not a usable JSON array.
    pub failed_parses: usize,
}

impl ExtractOutcome {
    /// Every batch failed at the call itself, so nothing was learned about the content.
    pub fn all_calls_failed(&self) -> bool {
        self.batches > 0 && self.failed_calls == self.batches
    }
}

/// Split a source into prompt segments. `cleaned_page` is the already-cleaned markup.
pub fn segments(raw: &RawContent, cleaned_page: &str, base_url: &str, batch_size: usize) -> Vec<String> {
    if raw.entries.is_empty() {
        return if cleaned_page.trim().is_empty() {
            Vec::new()
        } else {
            vec![cleaned_page.to_string()]
        };
    }
    let cleaned: Vec<String> = raw
        .entries
        .iter()
        .map(|e| clean_html(e, base_url))
        .filter(|c| !c.is_empty())
        .collect();
    cleaned
        .chunks(batch_size.max(1))
        .map(|chunk| chunk.join("\n\n"))
        .collect()
}

/// Drop one leading and one trailing code fence (optionally tagged `json`).
pub fn strip_code_fence(s: &str) -> &str {
    let mut t = s.trim();
    if let Some(rest) = t.strip_prefix("```") {
        let rest = rest.strip_prefix("json").or_else(|| rest.strip_prefix("JSON")).unwrap_or(rest);
        t = rest.trim_start();
    }
    if let Some(rest) = t.strip_suffix("```") {
        t = rest.trim_end();
    }
    t
}

/// Parse the model response into raw JSON items.
pub fn parse_response(response: &str) -> Result<Vec<Value>> {
    let body = strip_code_fence(response);
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(other) => Err(PipelineError::Extraction(format!(
            "expected a JSON array, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(PipelineError::Extraction(format!("invalid JSON: {e}"))),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

pub(crate) fn str_field(v: &Value, key: &str) -> String {
    match v.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Number or numeric string, clamped to `0..=max`; anything else is 0.
pub(crate) fn score_field(v: &Value, key: &str, max: u8) -> u8 {
    let n = match v.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match n {
        Some(x) if x.is_finite() => x.round().clamp(0.0, f64::from(max)) as u8,
        _ => 0,
    }
}

pub(crate) fn bool_field(v: &Value, key: &str) -> bool {
    match v.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|x| x != 0.0),
        _ => false,
    }
}

pub(crate) fn opt_str_field(v: &Value, key: &str) -> Option<String> {
    Some(str_field(v, key)).filter(|s| !s.is_empty() && s != "null")
}

pub(crate) fn tags_field(v: &Value) -> Vec<String> {
    match v.get("tags") {
        Some(Value::Array(a)) => a
            .iter()
            .filter_map(|t| t.as_str())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Build a validated item; `None` when `title` or `link` is missing.
pub fn validate_item(v: &Value, source: &Source) -> Option<ExtractedItem> {
    let title = str_field(v, "title");
    let link = str_field(v, "link");
    if title.is_empty() || link.is_empty() {
        return None;
    }
    let mut item = ExtractedItem::new(title, link, source.mode);
    item.summary = str_field(v, "summary");
    item.date = str_field(v, "date");
    item.venue = str_field(v, "venue");
    item.ai_score = score_field(v, "ai_score", AI_SCORE_MAX);
    item.impact_score = score_field(v, "impact_score", IMPACT_SCORE_MAX);
    item.is_tech_release = bool_field(v, "is_tech_release");
    item.code_url = opt_str_field(v, "code_url");
    item.score_reason = str_field(v, "score_reason");
    item.tags = tags_field(v);
    item.source_domain = source.domain();

    if source.kind.is_arxiv() {
        enforce_release_claim(&mut item);
    }
    Some(item)
}

/// Withdraw a release claim that has no parsable absolute code link.
pub fn enforce_release_claim(item: &mut ExtractedItem) {
    if !item.is_tech_release {
        return;
    }
    let has_link = item
        .code_url
        .as_deref()
        .and_then(|u| url::Url::parse(u.trim()).ok())
        .is_some_and(|u| u.has_host());
    if !has_link {
        item.is_tech_release = false;
        item.code_url = None;
        item.score_reason.push_str(RELEASE_WITHDRAWN_SUFFIX);
    }
}

/// Extract all items of one source. Never fails as a whole; see `ExtractOutcome`.
pub async fn extract_source(
    source: &Source,
    raw: &RawContent,
    cleaned_page: &str,
    llm: &dyn LlmClient,
    cfg: &ExtractConfig,
    venues: &VenueAuthority,
) -> ExtractOutcome {
    let mut out = ExtractOutcome::default();
    let segs = segments(raw, cleaned_page, &source.url, cfg.batch_size);
    let system = extraction_system(&cfg.summary_language);

    for (idx, seg) in segs.iter().enumerate() {
        out.batches += 1;
        let prompt = extraction_prompt(source.mode, seg, cfg, venues);
        counter!("radar_llm_calls_total").increment(1);

        let response = match llm.complete(&system, &prompt).await {
            Ok(r) => r,
            Err(e) => {
                out.failed_calls += 1;
                counter!("radar_extract_failures_total").increment(1);
                tracing::warn!(url = %source.url, batch = idx, error = %e, "llm call failed");
                continue;
            }
        };
        let values = match parse_response(&response) {
            Ok(v) => v,
            Err(e) => {
                out.failed_parses += 1;
                counter!("radar_extract_failures_total").increment(1);
                tracing::warn!(url = %source.url, batch = idx, error = %e, "unusable model response");
                continue;
            }
        };

        let total = values.len();
        let before = out.items.len();
        out.items
            .extend(values.iter().filter_map(|v| validate_item(v, source)));
        let kept = out.items.len() - before;
        if kept < total {
            tracing::debug!(url = %source.url, batch = idx, dropped = total - kept, "items without title/link dropped");
        }
    }

    tracing::info!(
        url = %source.url,
        mode = source.mode.as_str(),
        batches = out.batches,
        count = out.items.len(),
        "extraction finished"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SourceKind, SourceMode};
    use serde_json::json;

    fn arxiv_source() -> Source {
        Source::new("https://arxiv.org/list/cs.HC/recent", None, &[])
    }

    #[test]
    fn fences_are_stripped() {
        assert_eq!(strip_code_fence("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fence("```\n[]```"), "[]");
        assert_eq!(strip_code_fence("  [2] "), "[2]");
    }

    #[test]
    fn non_array_is_an_extraction_error() {
        assert!(matches!(
            parse_response(r#"{"title":"x"}"#),
            Err(PipelineError::Extraction(_))
        ));
        assert!(parse_response("sorry, I cannot").is_err());
        assert_eq!(parse_response("```json\n[{}]\n```").unwrap().len(), 1);
    }

    #[test]
    fn lenient_numbers_and_clamping() {
        let src = Source::new("https://www.theverge.com/tech", None, &[]);
        let v = json!({"title": "T", "link": "https://x/1", "ai_score": "87", "impact_score": 400, "tags": "LLM, Agent"});
        let item = validate_item(&v, &src).unwrap();
        assert_eq!(item.ai_score, 87);
        assert_eq!(item.impact_score, 50);
        assert_eq!(item.tags, vec!["LLM", "Agent"]);
        assert_eq!(item.source_domain, "www.theverge.com");
        assert_eq!(item.kind, SourceMode::News);
    }

    #[test]
    fn mandatory_fields() {
        let src = arxiv_source();
        assert!(validate_item(&json!({"title": "", "link": "x"}), &src).is_none());
        assert!(validate_item(&json!({"title": "t"}), &src).is_none());
        assert!(validate_item(&json!({"title": "t", "link": "x"}), &src).is_some());
    }

    #[test]
    fn release_claim_needs_absolute_code_link_on_arxiv() {
        let src = arxiv_source();
        assert!(matches!(src.kind, SourceKind::Arxiv { .. }));
        let v = json!({"title": "t", "link": "l", "is_tech_release": true, "code_url": "github repo", "score_reason": "r"});
        let item = validate_item(&v, &src).unwrap();
        assert!(!item.is_tech_release);
        assert_eq!(item.code_url, None);
        assert_eq!(item.score_reason, format!("r{RELEASE_WITHDRAWN_SUFFIX}"));

        let ok = json!({"title": "t", "link": "l", "is_tech_release": true, "code_url": "https://github.com/o/r"});
        assert!(validate_item(&ok, &src).unwrap().is_tech_release);

        // web sources keep the model's claim untouched
        let web = Source::new("https://blogs.nvidia.com/", None, &[]);
        assert!(validate_item(&v, &web).unwrap().is_tech_release);
    }

    #[test]
    fn entries_are_chunked_in_order() {
        let raw = RawContent {
            markup: String::new(),
            entries: (0..5).map(|i| format!("<article><h2>P{i}</h2></article>")).collect(),
        };
        let segs = segments(&raw, "", "https://arxiv.org", 2);
        assert_eq!(segs, vec!["P0\n\nP1", "P2\n\nP3", "P4"]);

        let page = RawContent::page("<p>x</p>");
        assert_eq!(segments(&page, "x", "https://a", 8), vec!["x"]);
    }
}
