//! HTTP request handlers for the dashboard API.
//!
//! Query parameters that are absent deserialize to empty strings, so a
//! missing parameter and an empty one are rejected the same way.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use logvault_core::LogFileEntry;
use serde::{Deserialize, Serialize};

use crate::error::DashboardResult;
use crate::state::DashboardState;

/// Query parameters naming one partition.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PartitionQuery {
    /// Bucket name.
    pub bucket: String,
    /// Environment segment.
    pub env: String,
    /// Application segment.
    pub app_name: String,
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,
}

/// Query parameters for a search.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchQuery {
    /// Bucket name.
    pub bucket: String,
    /// Environment segment.
    pub env: String,
    /// Application segment.
    pub app_name: String,
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,
    /// Literal, case-sensitive text to look for.
    pub query: String,
}

/// Query parameters naming one object.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ContentQuery {
    /// Bucket name.
    pub bucket: String,
    /// Full object key.
    pub key: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status message.
    pub status: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
}

/// Handle GET /api/health - health check endpoint.
pub async fn health_check(State(state): State<Arc<DashboardState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.uptime_secs(),
    })
}

/// Handle GET /api/config/buckets - configured bucket names.
pub async fn list_buckets(State(state): State<Arc<DashboardState>>) -> Json<Vec<String>> {
    Json(state.service().list_buckets())
}

/// Handle GET /api/logs - log files of one partition.
pub async fn list_log_files(
    State(state): State<Arc<DashboardState>>,
    Query(query): Query<PartitionQuery>,
) -> DashboardResult<Json<Vec<LogFileEntry>>> {
    let files = state
        .service()
        .list_log_files(&query.bucket, &query.env, &query.app_name, &query.date)
        .await?;
    Ok(Json(files))
}

/// Handle GET /api/log-content - full text of one file.
pub async fn get_log_content(
    State(state): State<Arc<DashboardState>>,
    Query(query): Query<ContentQuery>,
) -> DashboardResult<String> {
    let content = state.service().get_log_content(&query.bucket, &query.key).await?;
    Ok(content)
}

/// Handle GET /api/search - names of files containing the query text.
pub async fn search_logs(
    State(state): State<Arc<DashboardState>>,
    Query(query): Query<SearchQuery>,
) -> DashboardResult<Json<Vec<String>>> {
    let matches = state
        .service()
        .search_logs(
            &query.bucket,
            &query.env,
            &query.app_name,
            &query.date,
            &query.query,
        )
        .await?;
    Ok(Json(matches))
}
