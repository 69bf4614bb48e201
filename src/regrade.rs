//! Regrade pass: re-score a stored collection one article at a time, adding a personal
//! affinity score derived from the reader's favorites.

use metrics::counter;
use serde_json::Value;

use crate::analyze::extract::{bool_field, opt_str_field, score_field, str_field, strip_code_fence, tags_field};
use crate::analyze::llm::LlmClient;
use crate::analyze::prompt::{regrade_prompt, REGRADE_SYSTEM};
use crate::error::{PipelineError, Result};
use crate::history::{load_collection, save_collection};
use crate::model::{ScoredArticle, AI_SCORE_MAX, IMPACT_SCORE_MAX, PERSONAL_SCORE_MAX};
use crate::ranking::{final_score, reconcile_impact, ScoreWeights};
use crate::storage::BlobStore;
use crate::venue::VenueAuthority;

/// Parse a regrade response: one JSON object, optionally fenced.
pub fn parse_regrade_response(response: &str) -> Result<Value> {
    match serde_json::from_str::<Value>(strip_code_fence(response)) {
        Ok(v @ Value::Object(_)) => Ok(v),
        Ok(_) => Err(PipelineError::Extraction("expected a JSON object".into())),
        Err(e) => Err(PipelineError::Extraction(format!("invalid JSON: {e}"))),
    }
}

/// Apply a parsed response. The venue table still floors impact, and an existing code
/// link survives when the model reports none.
pub fn apply_regrade(
    article: &mut ScoredArticle,
    v: &Value,
    venues: &VenueAuthority,
    weights: &ScoreWeights,
) {
    let it = &mut article.item;
    it.ai_score = score_field(v, "ai_score", AI_SCORE_MAX);
    it.impact_score = reconcile_impact(
        score_field(v, "impact_score", IMPACT_SCORE_MAX),
        venues.score(&it.venue),
    );
    it.is_tech_release = bool_field(v, "is_tech_release");
    it.score_reason = str_field(v, "score_reason");
    it.tags = tags_field(v);
    if let Some(code) = opt_str_field(v, "code_url") {
        it.code_url = Some(code);
    }
    let personal = score_field(v, "personal_score", PERSONAL_SCORE_MAX);
    article.personal_score = Some(personal);
    article.score = final_score(&article.item, article.personal_score, weights);
}

/// Regrade one article in place. On error the article is left untouched.
pub async fn regrade_article(
    article: &mut ScoredArticle,
    interests: &[String],
    today: &str,
    llm: &dyn LlmClient,
    venues: &VenueAuthority,
    weights: &ScoreWeights,
) -> Result<()> {
    let prompt = regrade_prompt(article, interests, today);
    counter!("radar_llm_calls_total").increment(1);
    let response = llm.complete(REGRADE_SYSTEM, &prompt).await?;
    let v = parse_regrade_response(&response)?;
    apply_regrade(article, &v, venues, weights);
    Ok(())
}

/// Regrade every article of the collection at `key` and write it back when anything
/// changed. Returns the number of regraded articles.
pub async fn regrade_collection(
    store: &dyn BlobStore,
    key: &str,
    interests: &[String],
    llm: &dyn LlmClient,
    venues: &VenueAuthority,
    weights: &ScoreWeights,
) -> Result<usize> {
    let mut articles = load_collection(store, key).await?;
    let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
    tracing::info!(key, count = articles.len(), interests = interests.len(), "regrading collection");

    let mut regraded = 0usize;
    for article in articles.iter_mut() {
        match regrade_article(article, interests, &today, llm, venues, weights).await {
            Ok(()) => regraded += 1,
            Err(e) => {
                tracing::warn!(link = article.link(), error = %e, "regrade failed; keeping previous scores");
            }
        }
    }

    if regraded > 0 {
        save_collection(store, key, &articles).await?;
    }
    tracing::info!(key, regraded, "regrade finished");
    Ok(regraded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExtractedItem, SourceMode};
    use serde_json::json;

    fn article() -> ScoredArticle {
        let mut item = ExtractedItem::new("T", "http://a/1", SourceMode::Paper);
        item.venue = "CHI 2025".into();
        item.code_url = Some("https://github.com/o/r".into());
        ScoredArticle { item, score: 0, personal_score: None }
    }

    #[test]
    fn applies_floor_boost_and_personal() {
        let mut a = article();
        let v = json!({"ai_score": 70, "impact_score": 5, "personal_score": 40, "is_tech_release": true, "code_url": null, "score_reason": "r", "tags": ["HCI"]});
        apply_regrade(&mut a, &v, &VenueAuthority::default_seed(), &ScoreWeights::default());
        assert_eq!(a.item.impact_score, 50);
        assert_eq!(a.item.code_url.as_deref(), Some("https://github.com/o/r"));
        assert_eq!(a.personal_score, Some(40));
        assert_eq!(a.score, 70 + 50 + 200 + 40);
        assert_eq!(a.item.tags, vec!["HCI"]);
    }

    #[test]
    fn response_must_be_object() {
        assert!(parse_regrade_response("```json\n{\"ai_score\": 1}\n```").is_ok());
        assert!(parse_regrade_response("[]").is_err());
        assert!(parse_regrade_response("nope").is_err());
    }
}
