//! Test application wiring
//!
//! Builds the full router over an in-memory database with stub sources.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Response;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dphil_common::db::init_memory_database;
use dphil_common::events::EventBus;
use dphil_kr::db::{KnowledgeStore, SqliteKnowledgeStore};
use dphil_kr::services::{KnowledgeSource, SourceOutcome, StalenessPolicy};
use dphil_kr::AppState;

/// Source returning canned data for known subjects and counting calls
pub struct RecordingSource {
    known: Vec<(String, Value)>,
    calls: AtomicUsize,
}

impl RecordingSource {
    pub fn new(known: Vec<(&str, Value)>) -> Self {
        Self {
            known: known
                .into_iter()
                .map(|(name, data)| (name.to_string(), data))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KnowledgeSource for RecordingSource {
    fn name(&self) -> &'static str {
        "wikipedia"
    }

    async fn fetch(&self, subject: &str) -> SourceOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.known
            .iter()
            .find(|(name, _)| name == subject)
            .map(|(_, data)| data.clone())
            .into()
    }
}

pub struct TestApp {
    pub router: axum::Router,
    pub state: AppState,
    pub store: Arc<SqliteKnowledgeStore>,
}

impl TestApp {
    /// Wait until no research attempt is running
    pub async fn settle(&self) {
        self.state.knowledge.orchestrator().wait_idle().await;
    }
}

/// Test app with a single source
pub async fn create_test_app(source: Arc<dyn KnowledgeSource>) -> TestApp {
    create_test_app_with(vec![source]).await
}

pub async fn create_test_app_with(sources: Vec<Arc<dyn KnowledgeSource>>) -> TestApp {
    let pool = init_memory_database()
        .await
        .expect("Failed to create in-memory database");
    let store = Arc::new(SqliteKnowledgeStore::new(pool));

    let state = AppState::new(
        store.clone() as Arc<dyn KnowledgeStore>,
        sources,
        StalenessPolicy::default(),
        EventBus::new(100),
    );
    let router = dphil_kr::build_router(state.clone());

    TestApp {
        router,
        state,
        store,
    }
}

/// Collect a response body as JSON
pub async fn body_json(response: Response<Body>) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}
