// src/services/extract/markers.rs

//! Checkpoint distance and clock recognizers shared by both extraction modes.

use regex::Regex;

use crate::error::Result;

/// Half marathon distance in kilometres.
pub const HALF_COURSE_KM: f64 = 21.0975;

/// Marathon distance in kilometres.
pub const FULL_COURSE_KM: f64 = 42.195;

/// Compiled patterns for checkpoint labels and split times.
#[derive(Debug, Clone)]
pub struct MarkerMatcher {
    km: Regex,
    half: Regex,
    full: Regex,
    cp: Regex,
    clock: Regex,
}

impl MarkerMatcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            km: Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:km|k)(?:$|[^a-z])")?,
            half: Regex::new(r"(?i)half|하프")?,
            full: Regex::new(r"(?i)full|finish|풀코스|완주|골인|도착")?,
            cp: Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*cp|cp\s*(\d+(?:\.\d+)?)")?,
            clock: Regex::new(r"^\d{1,2}:\d{2}(?::\d{2})?$")?,
        })
    }

    /// Map a checkpoint label to a distance in km.
    ///
    /// Checked in order: `<n>k`/`<n>km`, half keyword, full keyword,
    /// `<n>CP`/`CP<n>`. Anything else is unmappable.
    pub fn distance_km(&self, text: &str) -> Option<f64> {
        if let Some(caps) = self.km.captures(text) {
            return caps.get(1).and_then(|m| m.as_str().parse().ok());
        }
        if self.half.is_match(text) {
            return Some(HALF_COURSE_KM);
        }
        if self.full.is_match(text) {
            return Some(FULL_COURSE_KM);
        }
        self.cp
            .captures(text)
            .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
            .and_then(|m| m.as_str().parse().ok())
    }

    /// Whether the text looks like `H:MM:SS` or `M:SS`.
    pub fn is_clock(&self, text: &str) -> bool {
        self.clock.is_match(text.trim())
    }
}
