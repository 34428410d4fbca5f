//! Participant data structure.

use serde::{Deserialize, Serialize};

/// One tracked runner as extracted from the results page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRecord {
    /// Race number
    pub bib: String,

    /// Display name (registry override wins over the scraped name)
    pub name: String,

    /// Team or club, empty when unknown
    pub team: String,

    /// Raw split text, kept as scraped
    pub split: String,

    /// Distance of the last confirmed checkpoint
    pub distance_mark_km: Option<f64>,

    /// Projected current distance
    pub estimated_distance_km: Option<f64>,
}

impl ParticipantRecord {
    /// Create a record with only bib and name set.
    pub fn new(bib: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bib: bib.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// The (bib, name, team) identity triple.
    pub fn identity(&self) -> (&str, &str, &str) {
        (&self.bib, &self.name, &self.team)
    }
}
