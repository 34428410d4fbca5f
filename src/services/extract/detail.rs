// src/services/extract/detail.rs

//! Detail-mode extraction: a single runner's result page.
//!
//! Identity fields are found next to their labels, either as adjacent table
//! cells (`<th>Bib</th><td>101</td>`) or as `<dt>`/`<dd>` pairs. The current
//! checkpoint is the table row carrying the furthest recognizable distance.

use scraper::{ElementRef, Html};

use super::list::cell_text;
use super::markers::MarkerMatcher;
use super::Selectors;
use crate::models::ParticipantRecord;
use crate::utils::is_bib;

const BIB_LABELS: &[&str] = &[
    "bib", "bib no", "bib no.", "bib number", "race number", "no", "no.", "배번", "배번호",
    "번호",
];
const NAME_LABELS: &[&str] = &[
    "name", "runner", "athlete", "이름", "성명", "선수명", "참가자",
];
const TEAM_LABELS: &[&str] = &[
    "team", "club", "crew", "팀", "팀명", "소속", "동호회", "클럽",
];

/// A label and the text found next to it.
#[derive(Debug)]
struct LabelPair {
    label: String,
    value: String,
}

/// Extract the single participant described by a detail page, if any.
pub(super) fn extract(
    document: &Html,
    selectors: &Selectors,
    markers: &MarkerMatcher,
) -> Option<ParticipantRecord> {
    let pairs = label_pairs(document, selectors);

    let bib = find_field(&pairs, BIB_LABELS, |v| is_bib(v))?;
    let name = find_field(&pairs, NAME_LABELS, |v| !v.is_empty())?;
    let team = find_field(&pairs, TEAM_LABELS, |_| true).unwrap_or_default();

    let (split, distance_mark_km) = match current_checkpoint(document, selectors, markers) {
        Some((split, distance)) => (split, Some(distance)),
        None => (String::new(), None),
    };

    Some(ParticipantRecord {
        bib,
        name,
        team,
        split,
        distance_mark_km,
        estimated_distance_km: None,
    })
}

/// Collect label/value candidates from both supported markup shapes,
/// cell pairs first, each in document order.
fn label_pairs(document: &Html, selectors: &Selectors) -> Vec<LabelPair> {
    let mut pairs = Vec::new();

    for row in document.select(&selectors.row) {
        let cells: Vec<String> = row.select(&selectors.any_cell).map(|c| cell_text(&c)).collect();
        for window in cells.windows(2) {
            pairs.push(LabelPair {
                label: normalize_label(&window[0]),
                value: window[1].clone(),
            });
        }
    }

    for term in document.select(&selectors.term) {
        let definition = term
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .next()
            .filter(|el| el.value().name() == "dd");
        if let Some(definition) = definition {
            pairs.push(LabelPair {
                label: normalize_label(&cell_text(&term)),
                value: cell_text(&definition),
            });
        }
    }

    pairs
}

/// First value whose label is one of `synonyms` and which passes `accept`.
fn find_field(
    pairs: &[LabelPair],
    synonyms: &[&str],
    accept: impl Fn(&str) -> bool,
) -> Option<String> {
    pairs
        .iter()
        .find(|p| synonyms.contains(&p.label.as_str()) && accept(&p.value))
        .map(|p| p.value.clone())
}

/// Lowercase and drop trailing colons so `"Name :"` matches `"name"`.
fn normalize_label(text: &str) -> String {
    text.trim()
        .trim_end_matches([':', '：'])
        .trim()
        .to_lowercase()
}

/// The (split, distance) of the row with the furthest checkpoint marker.
fn current_checkpoint(
    document: &Html,
    selectors: &Selectors,
    markers: &MarkerMatcher,
) -> Option<(String, f64)> {
    let mut best: Option<(Vec<String>, f64)> = None;

    for row in document.select(&selectors.row) {
        let cells: Vec<String> = row.select(&selectors.any_cell).map(|c| cell_text(&c)).collect();
        let Some(distance) = cells.iter().find_map(|c| markers.distance_km(c)) else {
            continue;
        };
        if best.as_ref().is_none_or(|(_, d)| distance > *d) {
            best = Some((cells, distance));
        }
    }

    best.map(|(cells, distance)| {
        let split = cells
            .into_iter()
            .find(|c| markers.is_clock(c))
            .unwrap_or_default();
        (split, distance)
    })
}
