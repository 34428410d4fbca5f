// src/services/estimate.rs

//! Linear-pace distance projection.
//!
//! The projection never falls below the last confirmed checkpoint and never
//! exceeds the course length.

use chrono::{DateTime, Utc};

use crate::models::{ParticipantRecord, RaceConfig};

/// Projects a runner's current distance from their last split.
#[derive(Debug, Clone)]
pub struct ProgressEstimator {
    race_start: Option<DateTime<Utc>>,
    course_distance_km: f64,
}

impl ProgressEstimator {
    pub fn new(race_start: Option<DateTime<Utc>>, course_distance_km: f64) -> Self {
        Self {
            race_start,
            course_distance_km,
        }
    }

    pub fn from_config(race: &RaceConfig) -> Self {
        Self::new(race.start, race.course_distance_km)
    }

    /// Estimated distance for `record` at instant `now`, or `None` when the
    /// race start, checkpoint distance, or split duration is unavailable.
    pub fn estimate(&self, record: &ParticipantRecord, now: DateTime<Utc>) -> Option<f64> {
        let start = self.race_start?;
        let mark = record.distance_mark_km?;
        let split_secs = parse_duration(&record.split)? as f64;

        if mark > self.course_distance_km {
            return None;
        }

        let elapsed = (now - start).num_milliseconds() as f64 / 1000.0;
        if !elapsed.is_finite() || elapsed < 0.0 {
            return Some(mark);
        }

        let per_km = if mark > 0.0 { mark } else { 1.0 };
        let pace = split_secs / per_km;
        if pace <= 0.0 {
            return Some(mark);
        }

        Some((elapsed / pace).clamp(mark, self.course_distance_km))
    }

    /// Fill `estimated_distance_km` on every row.
    pub fn apply(&self, rows: &mut [ParticipantRecord], now: DateTime<Utc>) {
        for row in rows {
            row.estimated_distance_km = self.estimate(row, now);
        }
    }
}

/// Parse `H:MM:SS`, `M:SS` or a bare count of seconds.
pub fn parse_duration(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let fields = text
        .split(':')
        .map(|f| {
            (!f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()))
                .then(|| f.parse::<u64>().ok())
                .flatten()
        })
        .collect::<Option<Vec<u64>>>()?;

    match fields.as_slice() {
        [secs] => Some(*secs),
        [m, s] if *s < 60 => m.checked_mul(60)?.checked_add(*s),
        [h, m, s] if *m < 60 && *s < 60 => h.checked_mul(3600)?.checked_add(m * 60 + s),
        _ => None,
    }
}
