//! Composite scoring for extracted items.
//!
//! ```text
//! final_score = ai_weight          * ai_score                         (0-100)
//!             + impact_weight      * max(model_impact, authority)     (0-50)
//!             + tech_release_boost   iff is_tech_release AND code_url present
//!             + personal_weight    * personal_score                   (0-100, optional)
//! ```
//!
//! The boost is a hard gate, not a multiplier. Personal affinity is additive so it
//! nudges the order without overriding the objective signals.

use serde::Deserialize;

use crate::model::{ExtractedItem, ScoredArticle, IMPACT_SCORE_MAX};
use crate::venue::VenueAuthority;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub ai_weight: i64,
    pub impact_weight: i64,
    pub tech_release_boost: i64,
    pub personal_weight: i64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            ai_weight: 1,
            impact_weight: 1,
            tech_release_boost: 200,
            personal_weight: 1,
        }
    }
}

/// Per-term contributions, handy for logs and `score_reason` diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub semantic: i64,
    pub impact: i64,
    pub tech_boost: i64,
    pub personal: i64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> i64 {
        self.semantic + self.impact + self.tech_boost + self.personal
    }
}

/// Authority floor: the lookup may only raise the model's impact, never lower it.
pub fn reconcile_impact(model_impact: u8, authority: i32) -> u8 {
    let authority = authority.clamp(0, IMPACT_SCORE_MAX as i32) as u8;
    model_impact.min(IMPACT_SCORE_MAX).max(authority)
}

/// Boost applies only when a release is claimed *and* a code link is present.
pub fn tech_release_boost(item: &ExtractedItem, w: &ScoreWeights) -> i64 {
    if item.is_tech_release && item.has_code_url() {
        w.tech_release_boost
    } else {
        0
    }
}

pub fn breakdown(item: &ExtractedItem, personal_score: Option<u8>, w: &ScoreWeights) -> ScoreBreakdown {
    ScoreBreakdown {
        semantic: w.ai_weight * i64::from(item.ai_score),
        impact: w.impact_weight * i64::from(item.impact_score),
        tech_boost: tech_release_boost(item, w),
        personal: w.personal_weight * i64::from(personal_score.unwrap_or(0)),
    }
}

pub fn final_score(item: &ExtractedItem, personal_score: Option<u8>, w: &ScoreWeights) -> i64 {
    breakdown(item, personal_score, w).total()
}

/// Reconcile impact against the venue table and compute the composite score.
pub fn score_item(
    mut item: ExtractedItem,
    personal_score: Option<u8>,
    venues: &VenueAuthority,
    w: &ScoreWeights,
) -> ScoredArticle {
    item.impact_score = reconcile_impact(item.impact_score, venues.score(&item.venue));
    if item.score_reason.trim().is_empty() {
        item.score_reason = "AI scoring unavailable".to_string();
    }
    let score = final_score(&item, personal_score, w);
    ScoredArticle {
        item,
        score,
        personal_score,
    }
}

/// Latest view: descending by score; ties keep fetch order (stable sort).
pub fn rank(mut pool: Vec<ScoredArticle>) -> Vec<ScoredArticle> {
    pool.sort_by(|a, b| b.score.cmp(&a.score));
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceMode;

    fn item(ai: u8, impact: u8, release: bool, code: Option<&str>) -> ExtractedItem {
        let mut it = ExtractedItem::new("t", "http://a/1", SourceMode::Paper);
        it.ai_score = ai;
        it.impact_score = impact;
        it.is_tech_release = release;
        it.code_url = code.map(str::to_string);
        it
    }

    #[test]
    fn floor_never_lowers() {
        assert_eq!(reconcile_impact(40, 10), 40);
        assert_eq!(reconcile_impact(5, 50), 50);
        assert_eq!(reconcile_impact(0, 0), 0);
        assert_eq!(reconcile_impact(7, -3), 7);
    }

    #[test]
    fn boost_requires_code_url() {
        let w = ScoreWeights::default();
        assert_eq!(tech_release_boost(&item(0, 0, true, None), &w), 0);
        assert_eq!(tech_release_boost(&item(0, 0, true, Some("  ")), &w), 0);
        assert_eq!(tech_release_boost(&item(0, 0, false, Some("http://github.com/x")), &w), 0);
        assert_eq!(tech_release_boost(&item(0, 0, true, Some("http://github.com/x")), &w), 200);
    }

    #[test]
    fn personal_score_is_additive() {
        let w = ScoreWeights::default();
        let it = item(60, 10, false, None);
        assert_eq!(final_score(&it, None, &w), 70);
        assert_eq!(final_score(&it, Some(25), &w), 95);
    }

    #[test]
    fn weights_are_applied() {
        let w = ScoreWeights {
            ai_weight: 1,
            impact_weight: 2,
            tech_release_boost: 20,
            personal_weight: 0,
        };
        let it = item(50, 5, true, Some("https://github.com/fake"));
        let b = breakdown(&it, Some(90), &w);
        assert_eq!(b, ScoreBreakdown { semantic: 50, impact: 10, tech_boost: 20, personal: 0 });
        assert_eq!(b.total(), 80);
    }

    #[test]
    fn rank_is_stable_on_ties() {
        let mk = |link: &str, score: i64| ScoredArticle {
            item: ExtractedItem::new("t", link, SourceMode::News),
            score,
            personal_score: None,
        };
        let ranked = rank(vec![mk("a", 10), mk("b", 30), mk("c", 10), mk("d", 30)]);
        let links: Vec<_> = ranked.iter().map(|a| a.link().to_string()).collect();
        assert_eq!(links, vec!["b", "d", "a", "c"]);
    }
}
