//! # Venue Authority
//!
//! Deterministic mapping from a venue string (conference, journal, arxiv
//! `journal_ref`/comment) to an impact score on the 0–50 scale:
//!
//! - Impact-factor journals: `min(50, floor(IF * 2))`.
//! - An existing `[CCF A|B|C]` annotation.
//! - Tier table: A = 50, B = 25, C = 10; unknown venues score 0.
//!
//! Keys are matched case-insensitively, **longest first**, and only where they are not
//! glued to other letters. One-word journal titles ("Nature", "Science") must also not
//! be part of a longer title such as "Computer Science". Longest-first keeps a regional or workshop variant
//! ("... Cooperative Work in Design") from being shadowed by the shorter parent name.
//!
//! The table loads from JSON and falls back to `default_seed()`.

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::model::IMPACT_SCORE_MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    A,
    B,
    C,
}

impl Tier {
    pub fn label(self) -> &'static str {
        match self {
            Tier::A => "CCF A",
            Tier::B => "CCF B",
            Tier::C => "CCF C",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TierScores {
    pub a: i32,
    pub b: i32,
    pub c: i32,
}

impl Default for TierScores {
    fn default() -> Self {
        Self { a: 50, b: 25, c: 10 }
    }
}

impl TierScores {
    fn for_tier(&self, tier: Tier) -> i32 {
        match tier {
            Tier::A => self.a,
            Tier::B => self.b,
            Tier::C => self.c,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VenueEntry {
    pub name: String,
    pub tier: Tier,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JournalEntry {
    pub name: String,
    pub impact_factor: f32,
}

/// JSON shape of an external venue table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VenueTableConfig {
    #[serde(default)]
    pub tiers: Vec<VenueEntry>,
    #[serde(default)]
    pub journals: Vec<JournalEntry>,
    #[serde(default)]
    pub tier_scores: TierScores,
}

#[derive(Debug, Clone)]
struct Key<T> {
    upper: String,
    value: T,
}

#[derive(Debug, Clone)]
pub struct VenueAuthority {
    /// Longest key first.
    tiers: Vec<Key<Tier>>,
    journals: Vec<Key<f32>>,
    /// Table order, used for prompt reference lists.
    names_in_order: Vec<(String, Tier)>,
    tier_scores: TierScores,
}

impl VenueAuthority {
    pub fn from_config(cfg: VenueTableConfig) -> Self {
        let names_in_order = cfg
            .tiers
            .iter()
            .map(|e| (e.name.trim().to_string(), e.tier))
            .filter(|(n, _)| !n.is_empty())
            .collect::<Vec<_>>();

        let mut tiers = names_in_order
            .iter()
            .map(|(n, t)| Key {
                upper: n.to_ascii_uppercase(),
                value: *t,
            })
            .collect::<Vec<_>>();
        tiers.sort_by(|a, b| b.upper.len().cmp(&a.upper.len()));

        let mut journals = cfg
            .journals
            .iter()
            .filter(|j| !j.name.trim().is_empty())
            .map(|j| Key {
                upper: j.name.trim().to_ascii_uppercase(),
                value: j.impact_factor,
            })
            .collect::<Vec<_>>();
        journals.sort_by(|a, b| b.upper.len().cmp(&a.upper.len()));

        Self {
            tiers,
            journals,
            names_in_order,
            tier_scores: cfg.tier_scores,
        }
    }

    /// Load the table from a JSON file. Falls back to `default_seed()` on error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(path.as_ref()) {
            Ok(s) => match serde_json::from_str::<VenueTableConfig>(&s) {
                Ok(cfg) => Self::from_config(cfg),
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.as_ref().display(), "venue table unparsable; using built-in seed");
                    Self::default_seed()
                }
            },
            Err(_) => Self::default_seed(),
        }
    }

    /// Authority score for a venue string (0 when unknown).
    pub fn score(&self, venue: &str) -> i32 {
        if venue.trim().is_empty() {
            return 0;
        }
        let upper = venue.to_ascii_uppercase();

        // 1) Impact factor (most precise). One-word titles must be the whole name.
        if let Some(j) = self.journals.iter().find(|k| {
            if k.upper.contains([' ', '-']) {
                contains_token(&upper, &k.upper)
            } else {
                find_token(&upper, &k.upper, |start, end| {
                    !joined_word_before(&venue[..start]) && !joined_word_after(&venue[end..])
                })
            }
        }) {
            let s = (j.value * 2.0).floor() as i32;
            return s.clamp(0, IMPACT_SCORE_MAX as i32);
        }

        // 2) Already annotated.
        for tier in [Tier::A, Tier::B, Tier::C] {
            if venue.contains(&format!("[{}]", tier.label())) {
                return self.tier_scores.for_tier(tier);
            }
        }

        // 3) Tier table.
        self.tier_of(venue)
            .map(|t| self.tier_scores.for_tier(t))
            .unwrap_or(0)
    }

    /// Tier of the longest table key found in `text`.
    pub fn tier_of(&self, text: &str) -> Option<Tier> {
        let upper = text.to_ascii_uppercase();
        self.tiers
            .iter()
            .find(|k| contains_token(&upper, &k.upper))
            .map(|k| k.value)
    }

    /// Prefix `text` with its tier tag (`[CCF A] ...`), once.
    pub fn annotate(&self, text: &str) -> String {
        let Some(tier) = self.tier_of(text) else {
            return text.to_string();
        };
        let tag = format!("[{}]", tier.label());
        if text.contains(&tag) {
            text.to_string()
        } else {
            format!("{tag} {text}")
        }
    }

    /// First `n` top-tier venue names in table order.
    pub fn reference_names(&self, n: usize) -> Vec<&str> {
        self.names_in_order
            .iter()
            .filter(|(_, t)| *t == Tier::A)
            .map(|(name, _)| name.as_str())
            .take(n)
            .collect()
    }

    pub fn tier_scores(&self) -> TierScores {
        self.tier_scores
    }

    /// Built-in seed: CCF rankings for HCI, AI, graphics/multimedia plus journal impact factors.
    pub fn default_seed() -> Self {
        use Tier::{A, B, C};
        let tiers: &[(&str, Tier)] = &[
            // HCI & ubiquitous computing
            ("CHI", A),
            ("Human Factors in Computing Systems", A),
            ("UIST", A),
            ("User Interface Software and Technology", A),
            ("CSCW", A),
            ("Computer Supported Cooperative Work", A),
            ("IMWUT", A),
            ("Interactive Mobile Wearable Ubiquitous Technologies", A),
            ("UbiComp", A),
            ("Ubiquitous Computing", A),
            ("TOCHI", A),
            ("Transactions on Computer-Human Interaction", A),
            ("TVCG", A),
            ("Transactions on Visualization and Computer Graphics", A),
            ("DIS", B),
            ("Designing Interactive Systems", B),
            ("IUI", B),
            ("Intelligent User Interfaces", B),
            ("MobileHCI", B),
            ("Mobile Human-Computer Interaction", B),
            ("IJHCS", B),
            ("International Journal of Human-Computer Studies", B),
            ("IwC", B),
            ("Interacting with Computers", B),
            ("Supporting Group Work", B),
            ("EICS", B),
            ("Engineering Interactive Computing Systems", B),
            ("ASSETS", C),
            ("Computers and Accessibility", C),
            ("Graphics Interface", C),
            ("IDC", C),
            ("Interaction Design and Children", C),
            ("AVI", C),
            ("Advanced Visual Interfaces", C),
            ("UIC", C),
            ("Ubiquitous Intelligence and Computing", C),
            ("Ro-Man", C),
            ("Robot and Human Interactive Communication", C),
            ("INTERACT", C),
            ("Human-Computer Interaction", C),
            ("CollabTech", C),
            ("Collaboration Technologies", C),
            ("CSCWD", C),
            ("Computer Supported Cooperative Work in Design", C),
            // Artificial intelligence
            ("NeurIPS", A),
            ("Neural Information Processing Systems", A),
            ("ICML", A),
            ("International Conference on Machine Learning", A),
            ("AAAI", A),
            ("AAAI Conference on Artificial Intelligence", A),
            ("IJCAI", A),
            ("International Joint Conference on Artificial Intelligence", A),
            ("CVPR", A),
            ("Computer Vision and Pattern Recognition", A),
            ("ICCV", A),
            ("International Conference on Computer Vision", A),
            ("ACL", A),
            ("Association for Computational Linguistics", A),
            ("TPAMI", A),
            ("Transactions on Pattern Analysis and Machine Intelligence", A),
            ("IJCV", A),
            ("International Journal of Computer Vision", A),
            ("Artificial Intelligence", A),
            ("ECCV", B),
            ("European Conference on Computer Vision", B),
            ("EMNLP", B),
            ("Empirical Methods in Natural Language Processing", B),
            ("ECAI", B),
            ("European Conference on Artificial Intelligence", B),
            ("COLT", B),
            ("Conference on Learning Theory", B),
            ("Knowledge Representation and Reasoning", B),
            ("CVIU", B),
            ("Computer Vision and Image Understanding", B),
            ("IROS", C),
            ("Intelligent Robots and Systems", C),
            ("ICRA", C),
            ("International Conference on Robotics and Automation", C),
            ("BMVC", C),
            ("British Machine Vision Conference", C),
            ("ACCV", C),
            ("Asian Conference on Computer Vision", C),
            ("GECCO", C),
            ("Genetic and Evolutionary Computation Conference", C),
            ("ICTAI", C),
            ("Tools with Artificial Intelligence", C),
            ("NLPCC", C),
            ("Natural Language Processing and Chinese Computing", C),
            // Graphics & multimedia
            ("SIGGRAPH", A),
            ("SIGGRAPH Asia", A),
            ("TOG", A),
            ("Transactions on Graphics", A),
            ("IEEE VR", A),
            ("IEEE Virtual Reality", A),
            ("ACM MM", A),
            ("ACM Multimedia", A),
            ("ISMAR", B),
            ("Mixed and Augmented Reality", B),
            ("Pacific Graphics", B),
            ("VRST", C),
            ("VR Software and Technology", C),
        ];
        let journals: &[(&str, f32)] = &[
            ("NATURE", 64.8),
            ("SCIENCE", 56.9),
            ("CELL", 64.5),
            ("IEEE COMMUNICATIONS SURVEYS & TUTORIALS", 46.7),
            ("SCIENCE ROBOTICS", 44.7),
            ("INTERNATIONAL JOURNAL OF INFORMATION MANAGEMENT", 27.0),
            ("NATURE BIOMEDICAL ENGINEERING", 26.6),
            ("PROCEEDINGS OF THE IEEE", 25.9),
            ("FOUNDATIONS AND TRENDS IN MACHINE LEARNING", 25.4),
            ("NATURE MACHINE INTELLIGENCE", 23.9),
            ("ACM COMPUTING SURVEYS", 23.8),
            ("IEEE COMMUNICATIONS MAGAZINE", 22.1),
            ("IEEE TRANSACTIONS ON IMAGE PROCESSING", 20.1),
            ("IEEE JOURNAL ON SELECTED AREAS IN COMMUNICATIONS", 19.8),
            ("IEEE-CAA JOURNAL OF AUTOMATICA SINICA", 19.2),
            ("IEEE TRANSACTIONS ON WIRELESS COMMUNICATIONS", 18.6),
            ("NATURE COMPUTATIONAL SCIENCE", 18.3),
            ("IEEE INTERNET OF THINGS JOURNAL", 17.6),
            ("PATTERN RECOGNITION", 17.3),
            ("IEEE TRANSACTIONS ON COMMUNICATIONS", 16.3),
            ("IEEE TRANSACTIONS ON NEURAL NETWORKS AND LEARNING SYSTEMS", 16.1),
            ("INFORMATION FUSION", 15.5),
            ("NPJ DIGITAL MEDICINE", 15.1),
            ("AI OPEN", 14.8),
            ("IEEE TRANSACTIONS ON INTELLIGENT VEHICLES", 14.3),
            ("PHYSICS OF LIFE REVIEWS", 14.3),
            ("JOURNAL OF MANUFACTURING SYSTEMS", 14.2),
        ];

        Self::from_config(VenueTableConfig {
            tiers: tiers
                .iter()
                .map(|(n, t)| VenueEntry {
                    name: n.to_string(),
                    tier: *t,
                })
                .collect(),
            journals: journals
                .iter()
                .map(|(n, f)| JournalEntry {
                    name: n.to_string(),
                    impact_factor: *f,
                })
                .collect(),
            tier_scores: TierScores::default(),
        })
    }
}

impl Default for VenueAuthority {
    fn default() -> Self {
        Self::default_seed()
    }
}

/// `needle` occurs in `haystack` without a letter glued to either side.
/// Digits are allowed as neighbours so "CVPR2025" still matches "CVPR".
fn contains_token(haystack: &str, needle: &str) -> bool {
    find_token(haystack, needle, |_, _| true)
}

/// Like `contains_token`, with `accept(start, end)` vetting each byte range found.
fn find_token(haystack: &str, needle: &str, accept: impl Fn(usize, usize) -> bool) -> bool {
    if needle.is_empty() {
        return false;
    }
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let start = from + pos;
        let end = start + needle.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphabetic());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_alphabetic());
        if before_ok && after_ok && accept(start, end) {
            return true;
        }
        from = start + haystack[start..].chars().next().map_or(1, char::len_utf8);
    }
    false
}

/// The text ends in a word that continues a title into the match: a capitalized word
/// ("Computer Science") or any word joined by a hyphen.
fn joined_word_before(text: &str) -> bool {
    let t = text.trim_end_matches(' ');
    let (t, hyphen) = match t.strip_suffix('-') {
        Some(rest) => (rest.trim_end_matches(' '), true),
        None => (t, false),
    };
    let word_start = t
        .char_indices()
        .rev()
        .find(|(_, c)| !c.is_alphabetic())
        .map_or(0, |(i, c)| i + c.len_utf8());
    t[word_start..]
        .chars()
        .next()
        .is_some_and(|c| hyphen || c.is_uppercase())
}

/// The text starts with a word that continues the title ("Cell Reports", "Cell-Free").
fn joined_word_after(text: &str) -> bool {
    let t = text.trim_start_matches(' ');
    let (t, hyphen) = match t.strip_prefix('-') {
        Some(rest) => (rest.trim_start_matches(' '), true),
        None => (t, false),
    };
    t.chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() && (hyphen || c.is_uppercase()))
}
