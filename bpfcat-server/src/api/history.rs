//! Snapshot history handlers
//!
//! Per-repo history listings (newest first) and by-id lookups for each
//! snapshot kind, plus recording overhead benchmark runs.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use bpfcat_core::db::NewOverheadTest;
use bpfcat_core::types::{Analysis, OverheadTest, PrimitiveAnalysis};

use super::{blocking, ApiError, AppState};

pub async fn analyses_for_repo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Analysis>>, ApiError> {
    let rows = blocking(state.db.clone(), move |db| db.analyses_for_repo(id)).await?;
    Ok(Json(rows))
}

pub async fn get_analysis(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Analysis>, ApiError> {
    let row = blocking(state.db.clone(), move |db| db.get_analysis(id)).await?;
    Ok(Json(row))
}

pub async fn primitives_for_repo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<PrimitiveAnalysis>>, ApiError> {
    let rows = blocking(state.db.clone(), move |db| db.primitives_for_repo(id)).await?;
    Ok(Json(rows))
}

pub async fn get_primitive(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PrimitiveAnalysis>, ApiError> {
    let row = blocking(state.db.clone(), move |db| db.get_primitive_analysis(id)).await?;
    Ok(Json(row))
}

pub async fn tests_for_repo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<OverheadTest>>, ApiError> {
    let rows = blocking(state.db.clone(), move |db| db.tests_for_repo(id)).await?;
    Ok(Json(rows))
}

pub async fn get_test(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<OverheadTest>, ApiError> {
    let row = blocking(state.db.clone(), move |db| db.get_overhead_test(id)).await?;
    Ok(Json(row))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordTestRequest {
    pub runs: Option<i64>,
    pub warmup_runs: Option<i64>,
    pub duration_ms: Option<i64>,
    pub baseline_cpu_pct: Option<f64>,
    pub instrumented_cpu_pct: Option<f64>,
    pub baseline_latency_ms: Option<f64>,
    pub instrumented_latency_ms: Option<f64>,
    pub baseline_throughput: Option<f64>,
    pub instrumented_throughput: Option<f64>,
    pub tested_at: Option<DateTime<Utc>>,
}

pub async fn record_test(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<RecordTestRequest>,
) -> Result<(StatusCode, Json<OverheadTest>), ApiError> {
    let new = NewOverheadTest {
        runs: req.runs,
        warmup_runs: req.warmup_runs,
        duration_ms: req.duration_ms,
        baseline_cpu_pct: req.baseline_cpu_pct,
        instrumented_cpu_pct: req.instrumented_cpu_pct,
        baseline_latency_ms: req.baseline_latency_ms,
        instrumented_latency_ms: req.instrumented_latency_ms,
        baseline_throughput: req.baseline_throughput,
        instrumented_throughput: req.instrumented_throughput,
        tested_at: req.tested_at,
    };
    let row = blocking(state.db.clone(), move |db| {
        db.insert_overhead_test(id, &new)
    })
    .await?;
    tracing::info!(repo_id = id, test_id = row.id, "overhead test recorded");
    Ok((StatusCode::CREATED, Json(row)))
}
