//! End-to-end cycles over in-memory results pages.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use crew_tracker::{
    error::{AppError, Result},
    models::{Config, Snapshot},
    pipeline::Tracker,
    services::{ExtractionMode, NAME_NOT_PROVIDED, PageSource, StaticSource},
};
use tokio::sync::Notify;

const LIST_PAGE: &str = r#"
<html><body>
<table id="results">
    <thead><tr><th>배번</th><th>이름</th><th>팀</th><th>기록</th><th>구간</th></tr></thead>
    <tbody>
        <tr><td>101</td><td>Kim</td><td>TeamA</td><td>2:15:00</td><td>30k</td></tr>
        <tr><td>202</td><td>Lee</td><td>TeamB</td><td>abc</td><td>10km</td></tr>
        <tr><td>303</td><td>Park</td><td></td><td>1:40:00</td><td>하프</td></tr>
        <tr><td>Total</td><td>3 runners</td></tr>
    </tbody>
</table>
</body></html>"#;

const DETAIL_PAGE: &str = r#"
<table class="profile">
    <tr><th>배번</th><td>1024</td></tr>
    <tr><th>이름</th><td>홍길동</td></tr>
    <tr><th>소속</th><td>Run Crew</td></tr>
</table>
<table class="splits">
    <tr><th>구간</th><th>기록</th></tr>
    <tr><td>5K</td><td>0:24:10</td></tr>
    <tr><td>10K</td><td>0:49:40</td></tr>
</table>"#;

/// Serves whatever markup was last set, or fails when none is set.
#[derive(Default)]
struct SwitchableSource {
    markup: Mutex<Option<String>>,
}

impl SwitchableSource {
    fn set(&self, markup: Option<&str>) {
        *self.markup.lock().unwrap() = markup.map(str::to_string);
    }
}

#[async_trait]
impl PageSource for SwitchableSource {
    async fn fetch(&self) -> Result<Option<String>> {
        match self.markup.lock().unwrap().clone() {
            Some(markup) => Ok(Some(markup)),
            None => Err(AppError::status(503, "https://results.example/live")),
        }
    }
}

/// Parks inside `fetch` until released, then serves the list page.
#[derive(Default)]
struct GatedSource {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl PageSource for GatedSource {
    async fn fetch(&self) -> Result<Option<String>> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(Some(LIST_PAGE.to_string()))
    }
}

fn config_started_hours_ago(hours: i64) -> Config {
    let mut config = Config::default();
    config.race.start = Some(Utc::now() - Duration::hours(hours));
    config
}

fn tracker_for(config: &Config, markup: &str) -> Tracker {
    Tracker::new(config, Arc::new(StaticSource::new(markup))).unwrap()
}

#[tokio::test]
async fn list_page_rows_are_well_formed() {
    let tracker = tracker_for(&Config::default(), LIST_PAGE);
    let report = tracker.force_refresh().await;

    assert_eq!(report.mode, ExtractionMode::List);
    let snapshot = tracker.current();
    assert_eq!(snapshot.row_count(), 3);
    for row in &snapshot.rows {
        assert!(row.bib.bytes().all(|b| b.is_ascii_digit()));
        assert!(!row.name.is_empty());
    }
    assert_eq!(snapshot.rows[2].distance_mark_km, Some(21.0975));
}

#[tokio::test]
async fn kim_scenario_projects_forty_km() {
    let tracker = tracker_for(&config_started_hours_ago(3), LIST_PAGE);
    tracker.force_refresh().await;

    let snapshot = tracker.current();
    let kim = snapshot.rows.iter().find(|r| r.bib == "101").unwrap();
    assert_eq!(kim.identity(), ("101", "Kim", "TeamA"));
    assert_eq!(kim.distance_mark_km, Some(30.0));

    let estimate = kim.estimated_distance_km.unwrap();
    assert!((estimate - 40.0).abs() < 0.05, "estimate was {estimate}");
}

#[tokio::test]
async fn unparseable_split_leaves_estimate_null() {
    let tracker = tracker_for(&config_started_hours_ago(1), LIST_PAGE);
    tracker.force_refresh().await;

    let snapshot = tracker.current();
    let lee = snapshot.rows.iter().find(|r| r.bib == "202").unwrap();
    assert_eq!(lee.split, "abc");
    assert_eq!(lee.distance_mark_km, Some(10.0));
    assert_eq!(lee.estimated_distance_km, None);
}

#[tokio::test]
async fn estimates_stay_between_mark_and_course() {
    for hours in [0, 1, 3, 8] {
        let tracker = tracker_for(&config_started_hours_ago(hours), LIST_PAGE);
        tracker.force_refresh().await;

        for row in &tracker.current().rows {
            if let (Some(mark), Some(estimate)) = (row.distance_mark_km, row.estimated_distance_km)
            {
                assert!(estimate >= mark, "{} below mark at {hours}h", row.bib);
                assert!(estimate <= 42.195, "{} past finish at {hours}h", row.bib);
            }
        }
    }
}

#[tokio::test]
async fn repeated_cycles_yield_identical_triples() {
    let tracker = tracker_for(&Config::default(), LIST_PAGE);
    tracker.registry().add("303").await.unwrap();
    tracker.registry().add("101").await.unwrap();

    let triples = |snapshot: &Snapshot| {
        snapshot
            .rows
            .iter()
            .map(|r| (r.bib.clone(), r.name.clone(), r.team.clone()))
            .collect::<Vec<_>>()
    };

    tracker.force_refresh().await;
    let first = triples(&tracker.current());
    tracker.force_refresh().await;
    let second = triples(&tracker.current());

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
}

#[tokio::test]
async fn unmatched_registry_falls_back_to_placeholders() {
    let tracker = tracker_for(&Config::default(), "<p>Results will appear here</p>");
    tracker.registry().replace_all(["101", "202"]).await;

    let report = tracker.force_refresh().await;
    assert!(report.fallback);
    assert_eq!(report.mode, ExtractionMode::None);

    let snapshot = tracker.current();
    assert_eq!(snapshot.row_count(), 2);
    for (row, bib) in snapshot.rows.iter().zip(["101", "202"]) {
        assert_eq!(row.bib, bib);
        assert_eq!(row.name, NAME_NOT_PROVIDED);
        assert_eq!(row.distance_mark_km, None);
        assert_eq!(row.estimated_distance_km, None);
    }
}

#[tokio::test]
async fn display_names_override_scraped_names() {
    let tracker = tracker_for(&Config::default(), LIST_PAGE);
    tracker.registry().add("202").await.unwrap();
    tracker.registry().set_display_name("202", "Coach Lee").await.unwrap();

    tracker.force_refresh().await;
    let snapshot = tracker.current();
    assert_eq!(snapshot.row_count(), 1);
    assert_eq!(snapshot.rows[0].name, "Coach Lee");
}

#[tokio::test]
async fn detail_page_yields_single_row() {
    let tracker = tracker_for(&Config::default(), DETAIL_PAGE);
    let report = tracker.force_refresh().await;

    assert_eq!(report.mode, ExtractionMode::Detail);
    let snapshot = tracker.current();
    assert_eq!(snapshot.rows[0].identity(), ("1024", "홍길동", "Run Crew"));
    assert_eq!(snapshot.rows[0].split, "0:49:40");
    assert_eq!(snapshot.rows[0].distance_mark_km, Some(10.0));
}

#[tokio::test]
async fn manual_refresh_inside_cooldown_keeps_snapshot() {
    let tracker = tracker_for(&Config::default(), LIST_PAGE);
    tracker.request_refresh().await.unwrap();
    let before = tracker.current();

    let err = tracker.request_refresh().await.unwrap_err();
    assert!(matches!(err, AppError::TooSoon { .. }));
    assert!(Arc::ptr_eq(&before, &tracker.current()));
}

#[tokio::test]
async fn fetch_failure_degrades_and_recovers() {
    let source = Arc::new(SwitchableSource::default());
    let tracker = Tracker::new(&Config::default(), source.clone()).unwrap();

    source.set(Some(LIST_PAGE));
    tracker.force_refresh().await;
    assert_eq!(tracker.current().row_count(), 3);

    source.set(None);
    let report = tracker.force_refresh().await;
    assert!(report.fetch_failed);
    assert_eq!(tracker.current().row_count(), 0);

    source.set(Some(LIST_PAGE));
    let report = tracker.force_refresh().await;
    assert!(!report.fetch_failed);
    assert_eq!(tracker.current().row_count(), 3);
}

#[tokio::test]
async fn subscribers_follow_every_publish() {
    let tracker = tracker_for(&Config::default(), LIST_PAGE);
    let mut feed = tracker.subscribe().unwrap();

    let initial: Snapshot = serde_json::from_str(&feed.recv().await.unwrap()).unwrap();
    assert_eq!(initial.ts.timestamp_millis(), 0);

    let report = tracker.force_refresh().await;
    assert_eq!(report.delivery.delivered, 1);

    let pushed: Snapshot = serde_json::from_str(&feed.recv().await.unwrap()).unwrap();
    assert_eq!(pushed, *tracker.current());
}

#[tokio::test]
async fn replace_all_during_cycle_applies_to_that_cycle() {
    let source = Arc::new(GatedSource::default());
    let tracker = Arc::new(Tracker::new(&Config::default(), source.clone()).unwrap());
    tracker.registry().replace_all(["101", "303"]).await;

    let cycle = tokio::spawn({
        let tracker = Arc::clone(&tracker);
        async move { tracker.force_refresh().await }
    });

    source.entered.notified().await;
    assert_eq!(tracker.registry().replace_all(["202"]).await, 1);
    source.release.notify_one();

    let report = cycle.await.unwrap();
    assert!(!report.fallback);
    assert_eq!(report.scraped, 3);

    let snapshot = tracker.current();
    assert_eq!(snapshot.row_count(), 1);
    assert_eq!(snapshot.rows[0].identity(), ("202", "Lee", "TeamB"));
    assert_eq!(snapshot.rows[0].distance_mark_km, Some(10.0));
}
