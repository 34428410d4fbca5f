// src/services/registry.rs

//! Tracked bib numbers and display-name overrides.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use crate::error::{AppError, Result};
use crate::models::ParticipantRecord;
use crate::utils::is_bib;

/// Name shown on fallback rows for bibs registered without a display name.
pub const NAME_NOT_PROVIDED: &str = "(name not provided)";

#[derive(Debug, Default)]
struct RegistryState {
    /// Tracked bibs in registration order
    order: Vec<String>,
    members: HashSet<String>,
    /// Overrides keyed by bib, independent of membership
    names: HashMap<String, String>,
}

impl RegistryState {
    fn insert(&mut self, bib: String) -> bool {
        if self.members.insert(bib.clone()) {
            self.order.push(bib);
            true
        } else {
            false
        }
    }
}

/// The authoritative set of tracked runners for this process.
///
/// Every operation takes the lock once, so a bulk replacement never
/// interleaves with a filter pass of a running cycle.
#[derive(Debug, Default)]
pub struct Registry {
    state: RwLock<RegistryState>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a bib. Returns `false` when it was already tracked.
    pub async fn add(&self, bib: &str) -> Result<bool> {
        let bib = validate_bib(bib)?;
        let added = self.state.write().await.insert(bib.clone());
        if added {
            log::info!("Registered bib #{}", bib);
        }
        Ok(added)
    }

    /// Set or replace the display name for a bib.
    ///
    /// This does not add the bib to the tracked set.
    pub async fn set_display_name(&self, bib: &str, name: &str) -> Result<()> {
        let bib = validate_bib(bib)?;
        let name = crate::utils::normalize_whitespace(name);
        if name.is_empty() {
            return Err(AppError::validation("display name is empty"));
        }
        self.state.write().await.names.insert(bib, name);
        Ok(())
    }

    /// Replace the whole tracked set. Blank or non-numeric entries are
    /// skipped; display names are kept. Returns the new member count.
    pub async fn replace_all<I, S>(&self, bibs: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut next = RegistryState::default();
        for bib in bibs {
            match validate_bib(bib.as_ref()) {
                Ok(bib) => {
                    next.insert(bib);
                }
                Err(e) => log::debug!("Skipping bulk entry: {}", e),
            }
        }

        let mut state = self.state.write().await;
        next.names = std::mem::take(&mut state.names);
        *state = next;
        log::info!("Registry replaced with {} bibs", state.order.len());
        state.order.len()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.order.is_empty()
    }

    pub async fn contains(&self, bib: &str) -> bool {
        self.state.read().await.members.contains(bib.trim())
    }

    /// Tracked bibs in registration order.
    pub async fn bibs(&self) -> Vec<String> {
        self.state.read().await.order.clone()
    }

    pub async fn display_name(&self, bib: &str) -> Option<String> {
        self.state.read().await.names.get(bib).cloned()
    }

    /// Replace scraped names with registered display names.
    pub async fn apply_overrides(&self, rows: &mut [ParticipantRecord]) {
        let state = self.state.read().await;
        for row in rows {
            if let Some(name) = state.names.get(&row.bib) {
                row.name = name.clone();
            }
        }
    }

    /// Keep only tracked rows; everything passes while nothing is tracked.
    pub async fn filter(&self, rows: Vec<ParticipantRecord>) -> Vec<ParticipantRecord> {
        let state = self.state.read().await;
        if state.members.is_empty() {
            return rows;
        }
        rows.into_iter()
            .filter(|r| state.members.contains(&r.bib))
            .collect()
    }

    /// Filter, and when nothing tracked survives, synthesize one placeholder
    /// row per tracked bib instead. The flag is `true` for placeholder rows.
    ///
    /// Both steps read the same registry state.
    pub async fn filter_or_fallback(
        &self,
        rows: Vec<ParticipantRecord>,
    ) -> (Vec<ParticipantRecord>, bool) {
        let state = self.state.read().await;
        if state.members.is_empty() {
            return (rows, false);
        }
        let kept: Vec<_> = rows
            .into_iter()
            .filter(|r| state.members.contains(&r.bib))
            .collect();
        if kept.is_empty() {
            (fallback_rows(&state), true)
        } else {
            (kept, false)
        }
    }

    /// One placeholder row per tracked bib.
    pub async fn build_fallback(&self) -> Vec<ParticipantRecord> {
        fallback_rows(&*self.state.read().await)
    }
}

fn fallback_rows(state: &RegistryState) -> Vec<ParticipantRecord> {
    state
        .order
        .iter()
        .map(|bib| {
            let name = state
                .names
                .get(bib)
                .cloned()
                .unwrap_or_else(|| NAME_NOT_PROVIDED.to_string());
            ParticipantRecord::new(bib.clone(), name)
        })
        .collect()
}

fn validate_bib(bib: &str) -> Result<String> {
    let bib = bib.trim();
    if bib.is_empty() {
        return Err(AppError::validation("missing bib"));
    }
    if !is_bib(bib) {
        return Err(AppError::validation(format!("invalid bib '{bib}'")));
    }
    Ok(bib.to_string())
}
