// src/pipeline/tracker.rs

//! The tracking context: owns registry, snapshot and subscribers, and runs
//! the fetch → extract → estimate → filter → publish cycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use tokio::sync::{Mutex, watch};
use tokio::time::{MissedTickBehavior, interval};

use super::gate::CooldownGate;
use crate::error::Result;
use crate::live::{Broadcaster, Delivery, Subscription};
use crate::models::{Config, Snapshot};
use crate::services::extract::apply_team_filter;
use crate::services::{
    Extraction, ExtractionMode, Extractor, HttpSource, PageSource, ProgressEstimator, Registry,
};

/// What triggered a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Scheduled,
    Manual,
    Forced,
}

/// Outcome of one cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub trigger: Trigger,
    pub ts: DateTime<Utc>,
    pub mode: ExtractionMode,
    /// Rows extracted before registry filtering
    pub scraped: usize,
    /// Rows in the published snapshot
    pub row_count: usize,
    pub fetch_failed: bool,
    pub fallback: bool,
    pub delivery: Delivery,
}

/// Process-wide tracking state and pipeline.
pub struct Tracker {
    source: Arc<dyn PageSource>,
    extractor: Extractor,
    estimator: ProgressEstimator,
    team_filter: Option<String>,
    poll_interval: Duration,
    registry: Registry,
    broadcaster: Broadcaster,
    gate: CooldownGate,
    cycle: Mutex<()>,
}

impl Tracker {
    /// Build a tracker reading from `source`.
    pub fn new(config: &Config, source: Arc<dyn PageSource>) -> Result<Self> {
        Ok(Self {
            source,
            extractor: Extractor::new()?,
            estimator: ProgressEstimator::from_config(&config.race),
            team_filter: config.race.team_filter().map(str::to_string),
            poll_interval: config.schedule.poll_interval(),
            registry: Registry::new(),
            broadcaster: Broadcaster::new(config.server.subscriber_buffer),
            gate: CooldownGate::new(config.schedule.refresh_cooldown()),
            cycle: Mutex::new(()),
        })
    }

    /// Build a tracker fetching the configured URL over HTTP.
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = HttpSource::new(&config.source)?;
        Self::new(config, Arc::new(source))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// The current snapshot.
    pub fn current(&self) -> Arc<Snapshot> {
        self.broadcaster.current()
    }

    /// Open a live feed; the first message is the current snapshot.
    pub fn subscribe(&self) -> Result<Subscription> {
        self.broadcaster.subscribe()
    }

    /// End every live feed so open connections can finish.
    pub fn close_subscribers(&self) {
        let closed = self.broadcaster.close_all();
        if closed > 0 {
            log::info!("Closed {} live subscribers", closed);
        }
    }

    /// Manual refresh, rejected with [`AppError::TooSoon`] inside the cooldown.
    ///
    /// [`AppError::TooSoon`]: crate::error::AppError::TooSoon
    pub async fn request_refresh(&self) -> Result<CycleReport> {
        self.gate.try_acquire()?;
        Ok(self.run_locked(Trigger::Manual).await)
    }

    /// Administrative refresh that skips the cooldown check.
    pub async fn force_refresh(&self) -> CycleReport {
        self.gate.mark();
        self.run_locked(Trigger::Forced).await
    }

    /// One scheduled cycle.
    pub async fn run_scheduled(&self) -> CycleReport {
        self.gate.mark();
        self.run_locked(Trigger::Scheduled).await
    }

    /// Run scheduled cycles every poll interval until `shutdown` flips to
    /// `true`. A running cycle always completes before the loop exits.
    pub async fn run_schedule(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        log::info!(
            "Scheduler started with interval of {} seconds, refresh cooldown {} seconds",
            self.poll_interval.as_secs(),
            self.gate.cooldown().as_secs()
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_scheduled().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        log::info!("Scheduler stopped");
    }

    async fn run_locked(&self, trigger: Trigger) -> CycleReport {
        let _guard = self.cycle.lock().await;
        let report = self.run_cycle(trigger).await;
        let fetch_note = if report.fetch_failed { ", fetch failed" } else { "" };
        let fallback_note = if report.fallback { ", fallback" } else { "" };
        log::info!(
            "Cycle ({:?}): {} rows published ({} scraped, mode={:?}{}{}), {} subscribers",
            report.trigger,
            report.row_count,
            report.scraped,
            report.mode,
            fetch_note,
            fallback_note,
            report.delivery.delivered,
        );
        report
    }

    /// The stage sequence. Every failure degrades to an empty row set and
    /// the cycle still publishes.
    async fn run_cycle(&self, trigger: Trigger) -> CycleReport {
        let mut fetch_failed = false;

        let extraction = match self.source.fetch().await {
            Ok(Some(markup)) => {
                let extraction = self.extractor.extract(&markup);
                if extraction.rows.is_empty() {
                    log::warn!(
                        "No participant rows recognized in {} bytes of markup",
                        markup.len()
                    );
                }
                extraction
            }
            Ok(None) => {
                log::debug!("No source URL configured, skipping fetch");
                Extraction::empty()
            }
            Err(e) => {
                if e.is_fetch_failure() {
                    log::warn!("Fetch failed: {}", e);
                } else {
                    log::error!("Source error: {}", e);
                }
                fetch_failed = true;
                Extraction::empty()
            }
        };

        let mode = extraction.mode;
        let mut rows = apply_team_filter(extraction.rows, self.team_filter.as_deref());
        self.registry.apply_overrides(&mut rows).await;

        // Millisecond precision, matching the wire format.
        let now = Utc::now().trunc_subsecs(3);
        self.estimator.apply(&mut rows, now);
        let scraped = rows.len();

        let (rows, fallback) = self.registry.filter_or_fallback(rows).await;
        let (snapshot, delivery) = self.broadcaster.publish(Snapshot::new(now, rows));

        CycleReport {
            trigger,
            ts: snapshot.ts,
            mode,
            scraped,
            row_count: snapshot.row_count(),
            fetch_failed,
            fallback,
            delivery,
        }
    }
}
