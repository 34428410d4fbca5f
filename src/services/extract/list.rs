// src/services/extract/list.rs

//! List-mode extraction: one participant per table row.

use scraper::{ElementRef, Html};

use super::markers::MarkerMatcher;
use super::Selectors;
use crate::models::ParticipantRecord;
use crate::utils::is_bib;

/// Column holding the split text; distance markers are searched from here on.
const SPLIT_COLUMN: usize = 3;

/// Extract every row shaped like `bib | name | team? | split? | ...`.
pub(super) fn extract(
    document: &Html,
    selectors: &Selectors,
    markers: &MarkerMatcher,
) -> Vec<ParticipantRecord> {
    document
        .select(&selectors.row)
        .filter_map(|row| parse_row(&row, selectors, markers))
        .collect()
}

fn parse_row(
    row: &ElementRef,
    selectors: &Selectors,
    markers: &MarkerMatcher,
) -> Option<ParticipantRecord> {
    let cells: Vec<String> = row.select(&selectors.data_cell).map(|c| cell_text(&c)).collect();
    if cells.len() < 2 {
        return None;
    }

    let bib = &cells[0];
    let name = &cells[1];
    if !is_bib(bib) || name.is_empty() {
        return None;
    }

    let distance_mark_km = cells
        .iter()
        .skip(SPLIT_COLUMN)
        .find_map(|cell| markers.distance_km(cell));

    Some(ParticipantRecord {
        bib: bib.clone(),
        name: name.clone(),
        team: cells.get(2).cloned().unwrap_or_default(),
        split: cells.get(SPLIT_COLUMN).cloned().unwrap_or_default(),
        distance_mark_km,
        estimated_distance_km: None,
    })
}

/// Whitespace-normalised text content of a cell.
pub(super) fn cell_text(cell: &ElementRef) -> String {
    crate::utils::normalize_whitespace(&cell.text().collect::<String>())
}
