// src/models/mod.rs

//! Domain models for the tracker.
//!
//! This module contains all data structures shared across the pipeline,
//! organized by their primary purpose.

mod config;
mod participant;
mod snapshot;

// Re-export all public types
pub use config::{
    Config, LoggingConfig, RaceConfig, ScheduleConfig, ServerConfig, SourceConfig,
};
pub use participant::ParticipantRecord;
pub use snapshot::Snapshot;
