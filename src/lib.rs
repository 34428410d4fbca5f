// src/lib.rs

//! Crew Tracker Library
//!
//! Polls a third-party race results page, extracts the tracked crew's
//! progress, projects current distance and pushes snapshots to live
//! subscribers.

pub mod api;
pub mod error;
pub mod live;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod utils;
