//! Stub sources and stores shared by service unit tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dphil_common::db::init_memory_database;
use dphil_common::{Error, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};

use crate::db::{KnowledgeStore, SqliteKnowledgeStore};
use crate::models::{KnowledgeRecord, ResearchStatus};
use crate::services::source::{KnowledgeSource, SourceOutcome};

pub async fn memory_store() -> Arc<SqliteKnowledgeStore> {
    let pool = init_memory_database()
        .await
        .expect("Failed to create in-memory database");
    Arc::new(SqliteKnowledgeStore::new(pool))
}

/// Returns a fixed outcome and counts calls
pub struct CountingSource {
    name: &'static str,
    outcome: SourceOutcome,
    pub calls: AtomicUsize,
}

impl CountingSource {
    pub fn with_data(data: Value) -> Self {
        Self {
            name: "stub",
            outcome: SourceOutcome::Data(data),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn no_data() -> Self {
        Self::no_data_named("stub")
    }

    pub fn no_data_named(name: &'static str) -> Self {
        Self {
            name,
            outcome: SourceOutcome::NoData,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl KnowledgeSource for CountingSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self, _subject: &str) -> SourceOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// Blocks every fetch until [`GatedSource::release`] is called
pub struct GatedSource {
    data: Value,
    gate: Semaphore,
    called: Notify,
    pub calls: AtomicUsize,
}

impl GatedSource {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            gate: Semaphore::new(0),
            called: Notify::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Let all current and future fetches through
    pub fn release(&self) {
        self.gate.close();
    }

    pub async fn wait_until_called(&self) {
        let notified = self.called.notified();
        if self.calls.load(Ordering::SeqCst) > 0 {
            return;
        }
        notified.await;
    }
}

#[async_trait]
impl KnowledgeSource for GatedSource {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn fetch(&self, _subject: &str) -> SourceOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.called.notify_waiters();
        // Closed semaphore means released
        let _ = self.gate.acquire().await;
        SourceOutcome::Data(self.data.clone())
    }
}

pub struct PanickingSource;

#[async_trait]
impl KnowledgeSource for PanickingSource {
    fn name(&self) -> &'static str {
        "panicking"
    }

    async fn fetch(&self, _subject: &str) -> SourceOutcome {
        panic!("source bug");
    }
}

/// Store wrapper that rejects the first `failures` saves of finished records
///
/// Only complete records are rejected unless built with
/// [`FailingSaveStore::rejecting_failed_too`].
pub struct FailingSaveStore {
    inner: Arc<SqliteKnowledgeStore>,
    remaining_failures: AtomicUsize,
    reject_failed: bool,
}

impl FailingSaveStore {
    pub fn new(inner: Arc<SqliteKnowledgeStore>, failures: usize) -> Self {
        Self {
            inner,
            remaining_failures: AtomicUsize::new(failures),
            reject_failed: false,
        }
    }

    pub fn rejecting_failed_too(inner: Arc<SqliteKnowledgeStore>, failures: usize) -> Self {
        Self {
            reject_failed: true,
            ..Self::new(inner, failures)
        }
    }

    fn rejects(&self, status: ResearchStatus) -> bool {
        match status {
            ResearchStatus::Complete => true,
            ResearchStatus::Failed => self.reject_failed,
            _ => false,
        }
    }
}

#[async_trait]
impl KnowledgeStore for FailingSaveStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<KnowledgeRecord>> {
        self.inner.find_by_name(name).await
    }

    async fn insert(&self, record: &KnowledgeRecord) -> Result<()> {
        self.inner.insert(record).await
    }

    async fn get_or_create(&self, name: &str) -> Result<KnowledgeRecord> {
        self.inner.get_or_create(name).await
    }

    async fn save(&self, record: &mut KnowledgeRecord) -> Result<()> {
        if self.rejects(record.status)
            && self
                .remaining_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(Error::Internal("injected store failure".to_string()));
        }
        self.inner.save(record).await
    }

    async fn list_stale_complete(&self, older_than: DateTime<Utc>) -> Result<Vec<KnowledgeRecord>> {
        self.inner.list_stale_complete(older_than).await
    }
}

/// Store wrapper whose `get_or_create` fails for one name
pub struct FailingLookupStore {
    inner: Arc<SqliteKnowledgeStore>,
    failing_name: &'static str,
}

impl FailingLookupStore {
    pub fn new(inner: Arc<SqliteKnowledgeStore>, failing_name: &'static str) -> Self {
        Self { inner, failing_name }
    }
}

#[async_trait]
impl KnowledgeStore for FailingLookupStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<KnowledgeRecord>> {
        self.inner.find_by_name(name).await
    }

    async fn insert(&self, record: &KnowledgeRecord) -> Result<()> {
        self.inner.insert(record).await
    }

    async fn get_or_create(&self, name: &str) -> Result<KnowledgeRecord> {
        if name == self.failing_name {
            return Err(Error::Internal("injected lookup failure".to_string()));
        }
        self.inner.get_or_create(name).await
    }

    async fn save(&self, record: &mut KnowledgeRecord) -> Result<()> {
        self.inner.save(record).await
    }

    async fn list_stale_complete(&self, older_than: DateTime<Utc>) -> Result<Vec<KnowledgeRecord>> {
        self.inner.list_stale_complete(older_than).await
    }
}
