// src/pipeline/mod.rs

//! The refresh cycle and its triggers.
//!
//! - `Tracker`: owns live state and runs fetch → extract → estimate → filter → publish
//! - `CooldownGate`: spacing between manual refreshes

mod gate;
mod tracker;

pub use gate::CooldownGate;
pub use tracker::{CycleReport, Tracker, Trigger};
