//! Analyzer proxy handlers
//!
//! These endpoints look up the repo, call the external analyzer, and
//! persist the parsed response as a new snapshot row. There is no job
//! queue: by the time a response goes out the analyzer has already
//! answered and the row is stored.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use bpfcat_core::types::{Category, PrimitiveAnalysis, Repo};
use bpfcat_core::Error;

use super::repos::parse_category;
use super::{blocking, ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub message: &'static str,
    pub result: serde_json::Value,
}

pub async fn analyze_repo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<AnalyzeResponse>), ApiError> {
    let repo = fetch_repo(&state, id).await?;

    let (report, raw) = state.analyzer.analyze_metadata(&repo.url, repo.id).await?;

    let analysis = blocking(state.db.clone(), move |db| db.insert_analysis(id, &report)).await?;
    tracing::info!(repo_id = id, analysis_id = analysis.id, "analysis stored");

    Ok((
        StatusCode::ACCEPTED,
        Json(AnalyzeResponse {
            message: "Analyze job accepted",
            result: raw,
        }),
    ))
}

/// Runs the primitive analyzer and answers with the persisted row,
/// derived totals included.
pub async fn analyze_primitives(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<PrimitiveAnalysis>), ApiError> {
    let repo = fetch_repo(&state, id).await?;

    let (report, _raw) = state.analyzer.analyze_primitives(&repo.url).await?;

    let row = blocking(state.db.clone(), move |db| {
        db.insert_primitive_analysis(id, &report)
    })
    .await?;
    tracing::info!(repo_id = id, primitive_id = row.id, "primitive analysis stored");

    Ok((StatusCode::CREATED, Json(row)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAnalyzeRequest {
    pub repo_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAnalyzeResponse {
    pub total_requested: usize,
    pub successes: Vec<BulkAnalyzeSuccess>,
    pub failures: Vec<BulkAnalyzeFailure>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAnalyzeSuccess {
    pub repo_id: i64,
    pub analysis_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAnalyzeFailure {
    pub repo_id: i64,
    pub reason: String,
}

/// Sequential bulk analyze: one repo at a time, failures collected per id
/// without aborting the batch.
pub async fn bulk_analyze(
    State(state): State<AppState>,
    Json(req): Json<BulkAnalyzeRequest>,
) -> Result<Json<BulkAnalyzeResponse>, ApiError> {
    if req.repo_ids.is_empty() {
        return Err(ApiError::bad_request("repoIds must be a non-empty array"));
    }

    let total_requested = req.repo_ids.len();
    let mut successes = Vec::new();
    let mut failures = Vec::new();

    for id in req.repo_ids {
        let repo = match blocking(state.db.clone(), move |db| db.get_repo(id)).await? {
            Some(repo) => repo,
            None => {
                failures.push(BulkAnalyzeFailure {
                    repo_id: id,
                    reason: "Repository not found".to_string(),
                });
                continue;
            }
        };

        match state.analyzer.analyze_metadata(&repo.url, repo.id).await {
            Ok((report, _raw)) => {
                let analysis =
                    blocking(state.db.clone(), move |db| db.insert_analysis(id, &report)).await?;
                successes.push(BulkAnalyzeSuccess {
                    repo_id: id,
                    analysis_id: analysis.id,
                });
            }
            Err(Error::Analyzer(reason)) => {
                tracing::warn!(repo_id = id, %reason, "bulk analyze entry failed");
                failures.push(BulkAnalyzeFailure {
                    repo_id: id,
                    reason,
                });
            }
            Err(other) => return Err(other.into()),
        }
    }

    tracing::info!(
        total_requested,
        successes = successes.len(),
        failures = failures.len(),
        "bulk analyze complete"
    );
    Ok(Json(BulkAnalyzeResponse {
        total_requested,
        successes,
        failures,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct AveragesParams {
    /// Comma-separated category labels; all known categories when absent
    pub categories: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AveragesResponse {
    pub categories: BTreeMap<Category, CategoryAverages>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAverages {
    pub helpers: f64,
    pub maps: f64,
    pub programs: f64,
    pub program_types: f64,
    pub attach_points: f64,
    pub count: i64,
}

/// Average primitive totals per category, over each category's repos that
/// have at least one primitive analysis. Categories with none are omitted.
pub async fn category_averages(
    State(state): State<AppState>,
    Query(params): Query<AveragesParams>,
) -> Result<Json<AveragesResponse>, ApiError> {
    let requested: Vec<Category> = match params.categories.as_deref() {
        None => Category::ALL.to_vec(),
        Some(raw) => {
            let mut cats = Vec::new();
            for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                cats.push(parse_category(Some(part))?.unwrap_or(Category::Uncategorized));
            }
            if cats.is_empty() {
                return Err(ApiError::bad_request("categories must not be empty"));
            }
            cats
        }
    };

    let categories = blocking(state.db.clone(), move |db| {
        let mut out = BTreeMap::new();
        for category in requested {
            let mut sums = [0i64; 5];
            let mut count = 0i64;
            for repo_id in db.repo_ids_in_category(category)? {
                let Some(prim) = db.latest_primitive(repo_id)? else {
                    continue;
                };
                sums[0] += prim.total_helpers;
                sums[1] += prim.total_maps;
                sums[2] += prim.total_programs;
                sums[3] += prim.total_program_types;
                sums[4] += prim.total_attach_points;
                count += 1;
            }
            if count == 0 {
                continue;
            }
            let avg = |sum: i64| round2(sum as f64 / count as f64);
            out.insert(
                category,
                CategoryAverages {
                    helpers: avg(sums[0]),
                    maps: avg(sums[1]),
                    programs: avg(sums[2]),
                    program_types: avg(sums[3]),
                    attach_points: avg(sums[4]),
                    count,
                },
            );
        }
        Ok(out)
    })
    .await?;

    Ok(Json(AveragesResponse { categories }))
}

async fn fetch_repo(state: &AppState, id: i64) -> Result<Repo, ApiError> {
    blocking(state.db.clone(), move |db| db.get_repo(id))
        .await?
        .ok_or_else(|| Error::RepoNotFound(id).into())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
