//! Prompt builders. Pure string functions so the exact text can be tested.

use crate::clean::truncate_chars;
use crate::config::ExtractConfig;
use crate::model::{ScoredArticle, SourceMode};
use crate::venue::VenueAuthority;

/// Number of top-tier venue names embedded in the paper prompt.
pub const VENUE_REFERENCE_COUNT: usize = 30;
/// Interest keywords embedded in a regrade prompt.
pub const REGRADE_INTEREST_COUNT: usize = 20;

pub fn extraction_system(summary_language: &str) -> String {
    format!(
        "You are a news and paper extraction expert. Return a pure JSON array only. \
         Every summary must be written in {summary_language}."
    )
}

pub const REGRADE_SYSTEM: &str = "You are a helpful assistant. Output one valid JSON object only.";

/// `Top venue reference (A=50, B=25, C=10): CHI, UIST, ...`
pub fn venue_reference(venues: &VenueAuthority) -> String {
    let s = venues.tier_scores();
    format!(
        "Top venue reference (tier A={}, B={}, C={}):\n{}",
        s.a,
        s.b,
        s.c,
        venues.reference_names(VENUE_REFERENCE_COUNT).join(", ")
    )
}

/// Extraction prompt for one segment of cleaned text.
pub fn extraction_prompt(
    mode: SourceMode,
    cleaned: &str,
    cfg: &ExtractConfig,
    venues: &VenueAuthority,
) -> String {
    let text = truncate_chars(cleaned, cfg.max_prompt_chars);
    let interests = cfg.interests.join(", ");
    let lang = &cfg.summary_language;
    match mode {
        SourceMode::Paper => format!(
            r#"You are an expert reviewer of research papers. Extract the list of papers from the page text and score each one.
Requirements:
1. Fields:
   - title: original title
   - link: absolute URL
   - summary: {lang} summary focused on method, contribution and novelty
   - date: publication or upload date
   - venue: journal or conference name
2. Scoring:
   - ai_score (0-100): semantic relevance to the reader's interests: {interests}
   - impact_score (0-50): academic impact. Top-tier venue or top journal = 50, second tier = 25, third tier = 10, arxiv preprint = 5
   - is_tech_release (bool): true only if code (GitHub), model weights (HuggingFace) or a demo is released
   - code_url (string or null): the code/weights link when present
   - score_reason (string): one sentence explaining the scores
   - tags (list of strings): 3-5 technical tags
3. Skip anything that is not a paper. Return only the JSON array.

{reference}

Page text:
{text}

Format:
[
  {{"title": "Paper Title", "link": "https://...", "summary": "...", "date": "2025-12-10", "venue": "CVPR 2025", "ai_score": 95, "impact_score": 50, "is_tech_release": true, "code_url": "https://github.com/...", "score_reason": "Agent paper at a top venue with code.", "tags": ["Agent", "Vision"]}}
]"#,
            reference = venue_reference(venues),
        ),
        SourceMode::News => format!(
            r#"You are a frontier technology scout. Extract the list of news items from the page text and assess each one.
Requirements:
1. Fields:
   - title: original title
   - link: absolute URL
   - summary: {lang} summary of what happened, what shipped, or the business impact
   - date: concrete date
   - venue: name of the news outlet
2. Scoring:
   - ai_score (0-100): semantic relevance to the reader's interests: {interests}
   - impact_score (0-50): industry impact. Major product launch or breakthrough = 50, ordinary update = 10-25
   - is_tech_release (bool): true only for an immediately usable release (open source, model weights, public beta)
   - code_url (string or null): repository or weights link when present
   - score_reason (string): one sentence explaining the scores
   - tags (list of strings): 3-5 technical tags
3. Skip anything that is not news. Return only the JSON array.

Page text:
{text}

Format:
[
  {{"title": "News Title", "link": "https://...", "summary": "...", "date": "2025-12-10", "venue": "The Verge", "ai_score": 85, "impact_score": 50, "is_tech_release": true, "code_url": null, "score_reason": "Major model release.", "tags": ["LLM"]}}
]"#
        ),
    }
}

/// Per-article regrade prompt built from the stored title/summary/link.
pub fn regrade_prompt(article: &ScoredArticle, interests: &[String], today: &str) -> String {
    let it = &article.item;
    let personal = if interests.is_empty() {
        r#""personal_score": 0, // no reader profile"#.to_string()
    } else {
        let n = interests.len().min(REGRADE_INTEREST_COUNT);
        format!(
            r#""personal_score": (0-100), // affinity with reader keywords: {}"#,
            interests[..n].join(", ")
        )
    };
    let (role, impact) = match it.kind {
        SourceMode::News => (
            "an AI news editor",
            "industry impact (major product = 50, update = 10)",
        ),
        SourceMode::Paper => (
            "an AI researcher",
            "academic impact (top-tier venue or journal = 50, arxiv preprint = 5)",
        ),
    };
    format!(
        r#"You are {role}.
Current date: {today}

Analyze the article below and return one JSON object.
Title: {title}
Summary: {summary}
Link: {link}

Output format:
{{
  "ai_score": (0-100), // relevance to AI, agents, HCI, XR/spatial computing, generation
  "impact_score": (0-50), // {impact}
  {personal}
  "is_tech_release": (bool), // code, weights or demo released
  "code_url": (string or null),
  "score_reason": (string),
  "tags": (list of 3-5 strings)
}}
Only return JSON."#,
        title = it.title,
        summary = it.summary,
        link = it.link,
    )
}
