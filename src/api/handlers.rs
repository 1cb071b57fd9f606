// src/api/handlers.rs

use axum::{
    extract::{Query, State},
    Json,
};

use super::dto::{
    wall_clock_seconds, AlertHistoryResponse, FrameRequest, HealthResponse, HistoryQuery,
    SportsResponse,
};
use super::error::ApiResult;
use super::state::AppState;
use crate::pipeline::{FrameAnalysis, MetricsSummary};
use crate::profiles::list_sports;

#[tracing::instrument(skip(state))]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "Injury Sentinel",
        version: env!("CARGO_PKG_VERSION"),
        trained_sports: state.registry().trained_sports(),
    })
}

#[tracing::instrument]
pub async fn sports() -> Json<SportsResponse> {
    Json(SportsResponse {
        sports: list_sports(),
    })
}

#[tracing::instrument(skip(state))]
pub async fn alert_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<AlertHistoryResponse>> {
    let limit = query
        .limit
        .unwrap_or(state.config().alerts.history_default_limit);
    let session = state.rest_session();
    let alerts = tokio::task::spawn_blocking(move || session.lock().alert_history(limit)).await?;
    Ok(Json(AlertHistoryResponse {
        count: alerts.len(),
        alerts,
    }))
}

#[tracing::instrument(skip(state))]
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSummary> {
    Json(state.metrics().summary())
}

/// Decode and analyze one frame on the shared session. Runs on the blocking
/// pool: decoding, first-use training and analysis are CPU-bound. The
/// predictor is acquired before the session lock is taken, so readers of the
/// session never wait on training.
#[tracing::instrument(skip(state, request), fields(sport = ?request.sport))]
pub async fn analyze_frame(
    State(state): State<AppState>,
    Json(request): Json<FrameRequest>,
) -> ApiResult<Json<FrameAnalysis>> {
    let session = state.rest_session();
    let registry = state.registry().clone();
    let metrics = state.metrics().clone();
    let now = wall_clock_seconds();

    let analysis = tokio::task::spawn_blocking(move || {
        let requested = request.sport();
        let frame = request.into_frame(now).inspect_err(|_| {
            metrics.inc(&metrics.frames_rejected);
        })?;
        let sport = match requested {
            Some(sport) => sport,
            None => session.lock().sport(),
        };
        let predictor = registry.acquire(sport)?;
        let mut session = session.lock();
        session.process_frame_with(&frame, &predictor)
    })
    .await??;

    Ok(Json(analysis))
}
