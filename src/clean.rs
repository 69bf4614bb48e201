// src/clean.rs
//! HTML → plain text that keeps links as `[text](absolute-url)`.
//!
//! The output feeds both the fingerprint and the extraction prompt, so it must be a
//! pure function of `(markup, base_url)`.

use once_cell::sync::OnceCell;
use regex::Regex;

/// Hard cap on cleaned text (characters).
pub const MAX_CLEAN_CHARS: usize = 60_000;

/// Elements dropped together with their content.
const DROPPED_ELEMENTS: [&str; 8] = [
    "script", "style", "svg", "iframe", "noscript", "header", "footer", "nav",
];

fn re_comments() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").unwrap())
}

fn re_dropped() -> &'static [Regex] {
    static RE: OnceCell<Vec<Regex>> = OnceCell::new();
    RE.get_or_init(|| {
        DROPPED_ELEMENTS
            .iter()
            .map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).unwrap())
            .collect()
    })
}

fn re_anchor() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a\s*>"#).unwrap()
    })
}

fn re_block() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)</?(?:br|p|div|h[1-6]|li|ul|ol|tr|table|article|section|blockquote|main)\b[^>]*/?>",
        )
        .unwrap()
    })
}

fn re_tags() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]+>").unwrap())
}

fn re_ws() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"[ \t\r\f\v\u{a0}]+").unwrap())
}

/// Clean `markup`, resolving relative links against `base_url`.
pub fn clean_html(markup: &str, base_url: &str) -> String {
    if markup.trim().is_empty() {
        return String::new();
    }
    let base = url::Url::parse(base_url).ok();

    let mut out = re_comments().replace_all(markup, "").into_owned();
    for re in re_dropped() {
        out = re.replace_all(&out, "").into_owned();
    }

    out = re_anchor()
        .replace_all(&out, |caps: &regex::Captures<'_>| {
            let text = re_tags().replace_all(&caps[2], " ");
            let text = re_ws().replace_all(text.trim(), " ").replace('\n', " ");
            let href = caps[1].trim();
            let resolved = base
                .as_ref()
                .and_then(|b| b.join(href).ok())
                .or_else(|| url::Url::parse(href).ok());
            match resolved {
                Some(abs) if text.chars().count() > 2 => format!("[{text}]({abs})"),
                _ => text,
            }
        })
        .into_owned();

    out = re_block().replace_all(&out, "\n").into_owned();
    out = re_tags().replace_all(&out, "").into_owned();
    let decoded = html_escape::decode_html_entities(&out);

    let text = decoded
        .lines()
        .map(|l| re_ws().replace_all(l, " ").trim().to_string())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    truncate_chars(&text, MAX_CLEAN_CHARS).to_string()
}

/// Prefix of `s` with at most `max` characters (never splits a code point).
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
