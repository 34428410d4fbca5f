//! Service layer for the tracker.
//!
//! This module contains the business logic for:
//! - Fetching the results page (`PageSource`, `HttpSource`)
//! - Extracting participant rows (`Extractor`)
//! - Projecting current distance (`ProgressEstimator`)
//! - Tracking registered runners (`Registry`)

pub mod estimate;
pub mod extract;
mod registry;
mod source;

pub use estimate::ProgressEstimator;
pub use extract::{Extraction, ExtractionMode, Extractor};
pub use registry::{NAME_NOT_PROVIDED, Registry};
pub use source::{HttpSource, PageSource, StaticSource};
