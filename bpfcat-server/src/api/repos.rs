//! Catalog CRUD handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Deserializer, Serialize};

use bpfcat_core::db::{NewRepo, RepoPatch, RepoQuery, SortField, SortOrder};
use bpfcat_core::types::{normalize_repo_url, Category, Repo, RepoDetail, RepoPage};
use bpfcat_core::Error;

use super::{blocking, ApiError, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRepoRequest {
    pub name: Option<String>,
    pub url: Option<String>,
}

pub async fn create_repo(
    State(state): State<AppState>,
    Json(req): Json<CreateRepoRequest>,
) -> Result<(StatusCode, Json<Repo>), ApiError> {
    let url = req
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("url is required"))?;

    let repo = blocking(state.db.clone(), move |db| {
        db.create_repo(&NewRepo {
            name: req.name,
            url,
        })
    })
    .await?;

    tracing::info!(repo_id = repo.id, url = %repo.url, "repo created");
    Ok((StatusCode::CREATED, Json(repo)))
}

#[derive(Debug, Deserialize)]
pub struct BulkCreateRequest {
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkCreateResponse {
    pub created: Vec<Repo>,
    pub skipped: Vec<SkippedEntry>,
}

#[derive(Debug, Serialize)]
pub struct SkippedEntry {
    pub url: String,
    pub reason: &'static str,
}

/// Bulk import: each entry commits independently, duplicates and failures
/// are reported per entry instead of aborting the batch.
pub async fn bulk_create(
    State(state): State<AppState>,
    Json(req): Json<BulkCreateRequest>,
) -> Result<(StatusCode, Json<BulkCreateResponse>), ApiError> {
    if req.urls.is_empty() {
        return Err(ApiError::bad_request("urls must be a non-empty array"));
    }
    // Blank entries are skipped, not rejected: an all-blank array still
    // answers 201 with empty results.
    let urls: Vec<String> = req
        .urls
        .iter()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .map(normalize_repo_url)
        .collect();

    let response = blocking(state.db.clone(), move |db| {
        let mut created = Vec::new();
        let mut skipped = Vec::new();
        for url in urls {
            match db.create_repo(&NewRepo {
                name: None,
                url: url.clone(),
            }) {
                Ok(repo) => created.push(repo),
                Err(Error::DuplicateUrl(_)) => skipped.push(SkippedEntry {
                    url,
                    reason: "duplicate",
                }),
                Err(err) => {
                    tracing::warn!(url = %url, error = %err, "bulk import entry failed");
                    skipped.push(SkippedEntry {
                        url,
                        reason: "error",
                    });
                }
            }
        }
        Ok(BulkCreateResponse { created, skipped })
    })
    .await?;

    tracing::info!(
        created = response.created.len(),
        skipped = response.skipped.len(),
        "bulk import complete"
    );
    Ok((StatusCode::CREATED, Json(response)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub search: Option<String>,
    pub category: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

pub async fn list_repos(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<RepoPage>, ApiError> {
    let category = parse_category(params.category.as_deref())?;
    let page_size = params
        .page_size
        .unwrap_or(state.default_page_size)
        .clamp(1, state.max_page_size);

    let query = RepoQuery {
        search: params.search,
        category,
        sort: params
            .sort
            .as_deref()
            .map(SortField::parse)
            .unwrap_or(SortField::CreatedAt),
        order: params
            .order
            .as_deref()
            .map(SortOrder::parse)
            .unwrap_or(SortOrder::Desc),
        page: params.page.unwrap_or(1).max(1),
        page_size,
    };

    let page = blocking(state.db.clone(), move |db| db.list_repos(&query)).await?;
    Ok(Json(page))
}

pub async fn get_repo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<RepoDetail>, ApiError> {
    let detail = blocking(state.db.clone(), move |db| db.get_repo_detail(id))
        .await?
        .ok_or(Error::RepoNotFound(id))?;
    Ok(Json(detail))
}

/// PATCH body. The double option distinguishes an absent field from an
/// explicit null: `{"description": null}` clears the column, omitting the
/// key leaves it alone.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRepoRequest {
    pub category: Option<Category>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub rationale: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub suggested_new_class: Option<Option<String>>,
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

pub async fn update_repo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateRepoRequest>,
) -> Result<Json<Repo>, ApiError> {
    let patch = RepoPatch {
        category: req.category,
        description: req.description,
        rationale: req.rationale,
        suggested_new_class: req.suggested_new_class,
    };
    let repo = blocking(state.db.clone(), move |db| db.update_repo(id, &patch)).await?;
    Ok(Json(repo))
}

pub async fn delete_repo(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let deleted = blocking(state.db.clone(), move |db| db.delete_repo(id)).await?;
    if !deleted {
        return Err(Error::RepoNotFound(id).into());
    }
    tracing::info!(repo_id = id, "repo deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Parse an optional category query value; unknown labels are a client
/// error rather than an empty result.
pub(crate) fn parse_category(value: Option<&str>) -> Result<Option<Category>, ApiError> {
    match value {
        None => Ok(None),
        Some(s) => s
            .parse::<Category>()
            .map(Some)
            .map_err(ApiError::bad_request),
    }
}
