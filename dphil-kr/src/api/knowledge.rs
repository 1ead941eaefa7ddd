//! Knowledge API handlers
//!
//! GET /knowledge/:name, GET /knowledge/:name/status,
//! POST /knowledge/:name/refresh, POST /knowledge/research,
//! POST /knowledge/refresh-stale

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::models::{KnowledgeRecord, ResearchPayload, ResearchStatus};
use crate::services::KnowledgeStatus;
use crate::AppState;

/// Knowledge record as returned to clients
#[derive(Debug, Serialize, Deserialize)]
pub struct KnowledgeResponse {
    pub name: String,
    pub status: ResearchStatus,
    /// Keyed by source name. A source that returned no data on the latest
    /// attempt keeps its earlier entry, so an entry's own `fetched_at` may
    /// predate `updated_at`.
    pub payload: ResearchPayload,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<KnowledgeRecord> for KnowledgeResponse {
    fn from(record: KnowledgeRecord) -> Self {
        Self {
            name: record.name,
            status: record.status,
            payload: record.payload,
            error: record.error,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    /// Run the staleness check (and possibly research) before reporting
    #[serde(default)]
    pub kick: bool,
}

/// POST /knowledge/research request
#[derive(Debug, Deserialize)]
pub struct ResearchRequest {
    pub names: Vec<String>,
}

/// Bulk trigger response
#[derive(Debug, Serialize, Deserialize)]
pub struct QueuedResponse {
    pub queued: usize,
}

/// GET /knowledge/:name
///
/// Returns the current record; starts background research when stale.
pub async fn get_knowledge(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<KnowledgeResponse>> {
    let record = state.knowledge.ensure_researched(&name).await?;
    Ok(Json(record.into()))
}

/// GET /knowledge/:name/status
///
/// Never creates a record unless `kick=true`.
pub async fn get_knowledge_status(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<KnowledgeStatus>> {
    let status = if query.kick {
        let record = state.knowledge.ensure_researched(&name).await?;
        KnowledgeStatus::from(&record)
    } else {
        state.knowledge.status(&name).await?
    };

    Ok(Json(status))
}

/// POST /knowledge/:name/refresh
pub async fn refresh_knowledge(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<KnowledgeResponse>> {
    tracing::info!(name = %name, "Forced knowledge refresh requested");

    let record = state.knowledge.force_refresh(&name).await?;
    Ok(Json(record.into()))
}

/// POST /knowledge/research
///
/// Called once per new conversation with its thinker names.
pub async fn research_thinkers(
    State(state): State<AppState>,
    Json(request): Json<ResearchRequest>,
) -> ApiResult<Json<QueuedResponse>> {
    let queued = state.knowledge.research_thinkers(&request.names).await?;

    tracing::debug!(requested = request.names.len(), queued, "Research requested for thinkers");

    Ok(Json(QueuedResponse { queued }))
}

/// POST /knowledge/refresh-stale
pub async fn refresh_stale(State(state): State<AppState>) -> ApiResult<Json<QueuedResponse>> {
    let queued = state.knowledge.refresh_all_stale().await?;
    Ok(Json(QueuedResponse { queued }))
}

/// Build knowledge routes
///
/// Static segments (`research`, `refresh-stale`, `events`) take priority
/// over `:name`.
pub fn knowledge_routes() -> Router<AppState> {
    Router::new()
        .route("/knowledge/research", post(research_thinkers))
        .route("/knowledge/refresh-stale", post(refresh_stale))
        .route("/knowledge/:name", get(get_knowledge))
        .route("/knowledge/:name/status", get(get_knowledge_status))
        .route("/knowledge/:name/refresh", post(refresh_knowledge))
}
