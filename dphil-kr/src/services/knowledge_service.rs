//! Knowledge query/refresh service
//!
//! The entry point for everything outside the research pipeline. Reads go
//! straight to the store; research is only ever started through the
//! orchestrator and never awaited.

use chrono::{DateTime, Utc};
use dphil_common::{Error, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::KnowledgeStore;
use crate::models::{KnowledgeRecord, ResearchStatus};
use crate::services::research_orchestrator::{ResearchOrchestrator, ResearchTrigger};
use crate::services::staleness::StalenessPolicy;

/// Lightweight research progress view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeStatus {
    pub name: String,
    pub status: ResearchStatus,
    pub has_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl KnowledgeStatus {
    /// Status of a name with no stored record
    pub fn unknown(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: ResearchStatus::Pending,
            has_data: false,
            updated_at: None,
        }
    }
}

impl From<&KnowledgeRecord> for KnowledgeStatus {
    fn from(record: &KnowledgeRecord) -> Self {
        Self {
            name: record.name.clone(),
            status: record.status,
            has_data: record.has_data(),
            updated_at: Some(record.updated_at),
        }
    }
}

#[derive(Clone)]
pub struct KnowledgeService {
    store: Arc<dyn KnowledgeStore>,
    orchestrator: ResearchOrchestrator,
    policy: StalenessPolicy,
}

impl KnowledgeService {
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        orchestrator: ResearchOrchestrator,
        policy: StalenessPolicy,
    ) -> Self {
        Self {
            store,
            orchestrator,
            policy,
        }
    }

    pub fn orchestrator(&self) -> &ResearchOrchestrator {
        &self.orchestrator
    }

    /// Stored record for `name`, if any; never triggers research
    pub async fn get_knowledge(&self, name: &str) -> Result<Option<KnowledgeRecord>> {
        let name = validate_name(name)?;
        self.store.find_by_name(name).await
    }

    /// Return the record immediately, starting research in the background
    /// if it is stale
    ///
    /// The returned record reflects the state before any research
    /// triggered by this call.
    pub async fn ensure_researched(&self, name: &str) -> Result<KnowledgeRecord> {
        let name = validate_name(name)?;
        let record = self.store.get_or_create(name).await?;

        if self.policy.is_stale(&record) {
            self.orchestrator.trigger_research(name);
        }

        Ok(record)
    }

    /// Return the record immediately, always starting research
    pub async fn force_refresh(&self, name: &str) -> Result<KnowledgeRecord> {
        let name = validate_name(name)?;
        let record = self.store.get_or_create(name).await?;
        self.orchestrator.trigger_research(name);
        Ok(record)
    }

    /// Trigger research for every complete record past the staleness
    /// threshold; returns how many were queued
    pub async fn refresh_all_stale(&self) -> Result<usize> {
        let stale = self
            .store
            .list_stale_complete(self.policy.cutoff(Utc::now()))
            .await?;

        for record in &stale {
            self.orchestrator.trigger_research(&record.name);
        }

        info!(count = stale.len(), "Queued stale knowledge for refresh");
        Ok(stale.len())
    }

    /// Research progress for `name` without creating a record
    pub async fn status(&self, name: &str) -> Result<KnowledgeStatus> {
        let name = validate_name(name)?;
        Ok(self
            .store
            .find_by_name(name)
            .await?
            .as_ref()
            .map(KnowledgeStatus::from)
            .unwrap_or_else(|| KnowledgeStatus::unknown(name)))
    }

    /// Ensure research for each distinct thinker of a new conversation
    ///
    /// Applies the [`Self::ensure_researched`] rule to every name, with
    /// duplicates collapsed. Returns the number of attempts started.
    /// A store error for one name is logged and that name skipped; only
    /// a blank name fails the call.
    pub async fn research_thinkers(&self, names: &[String]) -> Result<usize> {
        let mut seen = HashSet::new();
        let mut distinct = Vec::new();
        for name in names {
            let name = validate_name(name)?;
            if seen.insert(name) {
                distinct.push(name);
            }
        }

        let mut started = 0;
        for name in distinct {
            let record = match self.store.get_or_create(name).await {
                Ok(record) => record,
                Err(e) => {
                    warn!(name = %name, error = %e, "Failed to load knowledge record, skipping research");
                    continue;
                }
            };
            if self.policy.is_stale(&record)
                && self.orchestrator.trigger_research(name) == ResearchTrigger::Started
            {
                started += 1;
            }
        }

        Ok(started)
    }
}

/// Reject blank names; the name is otherwise used exactly as given
fn validate_name(name: &str) -> Result<&str> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("Thinker name must not be blank".to_string()));
    }
    Ok(name)
}
