// src/api/handlers.rs

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Form, Json,
    extract::{FromRequest, Request, State},
    http::{StatusCode, header},
    response::{
        IntoResponse, Response, Sse,
        sse::{Event, KeepAlive},
    },
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::Snapshot;
use crate::pipeline::{CycleReport, Tracker};

pub type AppState = Arc<Tracker>;

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub bib: String,
    #[serde(default)]
    pub display: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub ok: bool,
    pub bib: String,
    /// `false` when the bib was already tracked
    pub added: bool,
}

#[derive(Debug, Deserialize)]
pub struct WhitelistRequest {
    #[serde(default)]
    pub bibs: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct WhitelistResponse {
    pub ok: bool,
    pub count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl RefreshResponse {
    fn accepted(report: &CycleReport) -> Self {
        Self {
            accepted: true,
            ts: Some(report.ts.timestamp_millis()),
            count: Some(report.row_count),
            error: None,
            retry_after_ms: None,
        }
    }

    fn rejected(retry_after: Duration) -> Self {
        Self {
            accepted: false,
            ts: None,
            count: None,
            error: Some("too soon".to_string()),
            retry_after_ms: Some(u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AdminRefreshResponse {
    pub ok: bool,
    pub ts: i64,
    pub count: usize,
}

/// GET /api/crew
pub async fn crew(State(tracker): State<AppState>) -> Json<Snapshot> {
    Json(Snapshot::clone(&tracker.current()))
}

/// GET /events
pub async fn events(
    State(tracker): State<AppState>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let subscription = tracker.subscribe()?;
    log::debug!("SSE subscriber {} connected", subscription.id());

    let stream = subscription.map(|message| Ok(Event::default().data(&*message)));
    Ok(Sse::new(stream).keep_alive(default_keep_alive()))
}

/// POST /api/refresh
pub async fn refresh(State(tracker): State<AppState>) -> Response {
    match tracker.request_refresh().await {
        Ok(report) => Json(RefreshResponse::accepted(&report)).into_response(),
        Err(AppError::TooSoon { retry_after }) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(RefreshResponse::rejected(retry_after)),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /api/join, accepting either a JSON or an urlencoded form body.
pub async fn join(State(tracker): State<AppState>, request: Request) -> Result<Json<JoinResponse>> {
    let JoinRequest { bib, display } = if is_form(&request) {
        Form::<JoinRequest>::from_request(request, &())
            .await
            .map(|Form(body)| body)
            .map_err(|e| AppError::validation(e.body_text()))?
    } else {
        Json::<JoinRequest>::from_request(request, &())
            .await
            .map(|Json(body)| body)
            .map_err(|e| AppError::validation(e.body_text()))?
    };

    let registry = tracker.registry();
    let added = registry.add(&bib).await?;
    let bib = bib.trim().to_string();

    if let Some(display) = display.as_deref().filter(|d| !d.trim().is_empty()) {
        registry.set_display_name(&bib, display).await?;
    }

    Ok(Json(JoinResponse {
        ok: true,
        bib,
        added,
    }))
}

/// POST /admin/whitelist
pub async fn replace_whitelist(
    State(tracker): State<AppState>,
    Json(body): Json<WhitelistRequest>,
) -> Json<WhitelistResponse> {
    let bibs = body.bibs.iter().filter_map(|value| match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    let count = tracker.registry().replace_all(bibs).await;

    Json(WhitelistResponse { ok: true, count })
}

/// POST /admin/refresh
pub async fn force_refresh(State(tracker): State<AppState>) -> Json<AdminRefreshResponse> {
    let report = tracker.force_refresh().await;
    Json(AdminRefreshResponse {
        ok: true,
        ts: report.ts.timestamp_millis(),
        count: report.row_count,
    })
}

/// GET /healthz
pub async fn healthz() -> &'static str {
    "ok"
}

fn is_form(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"))
}

fn default_keep_alive() -> KeepAlive {
    KeepAlive::new()
        .interval(Duration::from_secs(15))
        .text("keep-alive")
}
