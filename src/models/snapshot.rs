//! Published view of all tracked participants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ParticipantRecord;

/// Immutable (timestamp, rows) pair replaced wholesale every cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    /// Publish time, serialized as epoch milliseconds
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub ts: DateTime<Utc>,

    /// Rows in extraction (or fallback) order
    pub rows: Vec<ParticipantRecord>,
}

impl Snapshot {
    pub fn new(ts: DateTime<Utc>, rows: Vec<ParticipantRecord>) -> Self {
        Self { ts, rows }
    }

    /// The view served before the first cycle completes.
    pub fn empty() -> Self {
        Self {
            ts: DateTime::<Utc>::UNIX_EPOCH,
            rows: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}
