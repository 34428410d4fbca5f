// src/api/mod.rs

//! HTTP surface: snapshot query, SSE feed, refresh and registration.

mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::pipeline::Tracker;

/// Build the application router around a shared tracker.
pub fn router(tracker: Arc<Tracker>) -> Router {
    Router::new()
        .route("/api/crew", get(handlers::crew))
        .route("/events", get(handlers::events))
        .route("/api/refresh", post(handlers::refresh))
        .route("/api/join", post(handlers::join))
        .route("/admin/whitelist", post(handlers::replace_whitelist))
        .route("/admin/refresh", post(handlers::force_refresh))
        .route("/healthz", get(handlers::healthz))
        .with_state(tracker)
}
