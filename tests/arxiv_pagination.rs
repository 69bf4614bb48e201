// tests/arxiv_pagination.rs
//
// Paginated listing over scripted Atom pages: cutoff, empty page, cap and page failures.

use chrono::{DateTime, Duration, TimeZone, Utc};
use tech_radar::config::ArxivConfig;
use tech_radar::error::PipelineError;
use tech_radar::ingest::arxiv::{collect_entries, fetch_listing, FixturePager};
use tech_radar::venue::VenueAuthority;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
}

/// Atom page with one entry per `(id, hours_ago)`.
fn page(entries: &[(u32, i64)]) -> Option<String> {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">"#,
    );
    for (id, hours) in entries {
        let published = (now() - Duration::hours(*hours)).to_rfc3339();
        xml.push_str(&format!(
            "<entry><id>http://arxiv.org/abs/2503.{id:05}v1</id><published>{published}</published>\
             <title>Paper {id}</title><summary>Abstract {id}.</summary></entry>"
        ));
    }
    xml.push_str("</feed>");
    Some(xml)
}

fn cfg(page_size: usize, max_items: usize) -> ArxivConfig {
    ArxivConfig {
        page_size,
        max_items,
        cutoff_days: 2,
        page_delay_ms: 0,
        ..ArxivConfig::default()
    }
}

#[tokio::test]
async fn stops_after_page_reaching_cutoff() {
    let pager = FixturePager::new(vec![
        page(&[(1, 1), (2, 5)]),
        page(&[(3, 20), (4, 60), (5, 30)]),
        page(&[(6, 2)]),
    ]);
    let entries = collect_entries(&pager, &cfg(2, 100), now()).await.unwrap();
    let titles: Vec<_> = entries.iter().map(|e| e.title.as_str()).collect();
    // entry 4 is older than two days; the rest of its page is still kept
    assert_eq!(titles, vec!["Paper 1", "Paper 2", "Paper 3", "Paper 5"]);
    assert_eq!(pager.requested(), vec![0, 2]);
}

#[tokio::test]
async fn empty_page_ends_listing() {
    let pager = FixturePager::new(vec![page(&[(1, 1), (2, 2)]), page(&[])]);
    let entries = collect_entries(&pager, &cfg(2, 100), now()).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(pager.requested(), vec![0, 2]);
}

#[tokio::test]
async fn cap_truncates_collection() {
    let pager = FixturePager::new(vec![
        page(&[(1, 1), (2, 1), (3, 1)]),
        page(&[(4, 1), (5, 1), (6, 1)]),
    ]);
    let entries = collect_entries(&pager, &cfg(3, 4), now()).await.unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[3].title, "Paper 4");
    assert_eq!(pager.requested(), vec![0, 3]);
}

#[tokio::test]
async fn first_page_failure_is_a_fetch_error() {
    let pager = FixturePager::new(vec![None]);
    let err = collect_entries(&pager, &cfg(2, 100), now()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Fetch { .. }));
}

#[tokio::test]
async fn later_page_failure_keeps_collected_entries() {
    let pager = FixturePager::new(vec![page(&[(1, 1), (2, 1)]), None, page(&[(3, 1)])]);
    let entries = collect_entries(&pager, &cfg(2, 100), now()).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(pager.requested(), vec![0, 2]);
}

#[tokio::test]
async fn listing_renders_one_block_per_entry() {
    let pager = FixturePager::new(vec![page(&[(1, 1), (2, 3)])]);
    let raw = fetch_listing(&pager, &cfg(5, 100), &VenueAuthority::default_seed(), now())
        .await
        .unwrap();
    assert_eq!(raw.entries.len(), 2);
    assert!(raw.entries[0].contains("<h2>Paper 1</h2>"));
    assert!(raw.entries[1].contains("href='http://arxiv.org/abs/2503.00002v1'"));
    assert!(raw.markup.contains("<hr/>"));
}

#[tokio::test]
async fn oversized_cutoff_window_is_clamped_not_a_panic() {
    let pager = FixturePager::new(vec![page(&[(1, 1), (2, 24 * 400)])]);
    let config = ArxivConfig {
        cutoff_days: i64::MAX,
        ..cfg(5, 100)
    };
    let entries = collect_entries(&pager, &config, now()).await.unwrap();
    // the one-year window still excludes a 400-day-old entry
    let titles: Vec<_> = entries.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Paper 1"]);
}
