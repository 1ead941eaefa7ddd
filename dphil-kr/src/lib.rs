//! dphil-kr library interface
//!
//! Knowledge research service: caches third-party biographical data per
//! thinker, refreshes it in the background when stale, and serves it over
//! HTTP. Exposed as a library for integration testing.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use dphil_common::events::EventBus;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::db::KnowledgeStore;
use crate::services::{KnowledgeService, KnowledgeSource, ResearchOrchestrator, StalenessPolicy};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Query/refresh entry point
    pub knowledge: KnowledgeService,
    /// Research events for SSE clients
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire the orchestrator and knowledge service around a store
    ///
    /// # Arguments
    /// * `store` - Knowledge store shared by requests and background research
    /// * `sources` - Sources consulted on every research attempt
    /// * `policy` - Staleness policy applied by the knowledge service
    /// * `event_bus` - Research lifecycle events
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        sources: Vec<Arc<dyn KnowledgeSource>>,
        policy: StalenessPolicy,
        event_bus: EventBus,
    ) -> Self {
        let orchestrator = ResearchOrchestrator::new(store.clone(), sources, event_bus.clone());
        Self {
            knowledge: KnowledgeService::new(store, orchestrator, policy),
            event_bus,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .route("/knowledge/events", get(api::knowledge_event_stream))
        .merge(api::knowledge_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
