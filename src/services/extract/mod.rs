// src/services/extract/mod.rs

//! Participant extraction from loosely structured results markup.
//!
//! Two heuristics run in order and the first non-empty one wins:
//! - list mode: one runner per table row (`bib | name | team | split`)
//! - detail mode: a single runner page with labelled fields and a splits table
//!
//! Nothing here fails on odd markup; unmatched shapes simply yield no rows.

mod detail;
mod list;
mod markers;

use scraper::{Html, Selector};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::ParticipantRecord;

pub use markers::{FULL_COURSE_KM, HALF_COURSE_KM, MarkerMatcher};

/// Which heuristic produced the rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    List,
    Detail,
    None,
}

/// Rows found in one page plus the heuristic that found them.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub mode: ExtractionMode,
    pub rows: Vec<ParticipantRecord>,
}

impl Extraction {
    pub fn empty() -> Self {
        Self {
            mode: ExtractionMode::None,
            rows: Vec::new(),
        }
    }
}

/// CSS selectors used by both heuristics.
#[derive(Debug, Clone)]
pub(crate) struct Selectors {
    row: Selector,
    data_cell: Selector,
    any_cell: Selector,
    term: Selector,
}

impl Selectors {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            row: parse_selector("tr")?,
            data_cell: parse_selector("td")?,
            any_cell: parse_selector("th, td")?,
            term: parse_selector("dt")?,
        })
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Turns raw markup into participant records.
#[derive(Debug, Clone)]
pub struct Extractor {
    selectors: Selectors,
    markers: MarkerMatcher,
}

impl Extractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            selectors: Selectors::new()?,
            markers: MarkerMatcher::new()?,
        })
    }

    /// Run list mode, falling back to detail mode when it finds nothing.
    pub fn extract(&self, markup: &str) -> Extraction {
        let document = Html::parse_document(markup);

        let rows = list::extract(&document, &self.selectors, &self.markers);
        if !rows.is_empty() {
            return Extraction {
                mode: ExtractionMode::List,
                rows,
            };
        }

        match detail::extract(&document, &self.selectors, &self.markers) {
            Some(record) => Extraction {
                mode: ExtractionMode::Detail,
                rows: vec![record],
            },
            None => Extraction::empty(),
        }
    }
}

/// Drop rows whose non-empty team does not contain `filter` (case-sensitive).
pub fn apply_team_filter(
    rows: Vec<ParticipantRecord>,
    filter: Option<&str>,
) -> Vec<ParticipantRecord> {
    match filter {
        Some(filter) => rows
            .into_iter()
            .filter(|r| r.team.is_empty() || r.team.contains(filter))
            .collect(),
        None => rows,
    }
}
