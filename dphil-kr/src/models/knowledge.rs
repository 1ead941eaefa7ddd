//! Thinker knowledge record and research state machine
//!
//! Status progression within one research attempt:
//! PENDING/FAILED → IN_PROGRESS → COMPLETE | FAILED
//!
//! A fresh attempt may re-enter IN_PROGRESS from any prior state.

use chrono::{DateTime, Utc};
use dphil_common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Research results keyed by source name (e.g. `"wikipedia"`)
///
/// Each source defines its own sub-structure.
pub type ResearchPayload = Map<String, Value>;

/// Research status of a knowledge record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchStatus {
    /// No research has completed for the current attempt
    Pending,
    /// A research attempt is running
    InProgress,
    /// All sources finished (whether or not each found data)
    Complete,
    /// The attempt failed outside per-source error containment
    Failed,
}

impl ResearchStatus {
    /// Database / wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ResearchStatus::Pending => "pending",
            ResearchStatus::InProgress => "in_progress",
            ResearchStatus::Complete => "complete",
            ResearchStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ResearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResearchStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(ResearchStatus::Pending),
            "in_progress" => Ok(ResearchStatus::InProgress),
            "complete" => Ok(ResearchStatus::Complete),
            "failed" => Ok(ResearchStatus::Failed),
            other => Err(Error::Internal(format!("Unknown research status: {}", other))),
        }
    }
}

/// Cached research about one thinker
///
/// One record per distinct subject name, shared across all users and
/// conversations. `name` is an exact, case-sensitive key: "Einstein" and
/// "Albert Einstein" are different records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    /// Opaque identifier, assigned at creation
    pub id: Uuid,
    /// Canonical subject name
    pub name: String,
    /// Current research status
    pub status: ResearchStatus,
    /// Research results keyed by source name
    pub payload: ResearchPayload,
    /// Failure message, present only when `status` is `Failed`
    pub error: Option<String>,
    /// Creation time (set once)
    pub created_at: DateTime<Utc>,
    /// Last write time; sole input to staleness
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeRecord {
    /// Create a new pending record with an empty payload
    pub fn new_pending(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: ResearchStatus::Pending,
            payload: ResearchPayload::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Enter IN_PROGRESS for a new attempt, clearing any previous error
    pub fn begin_attempt(&mut self) {
        self.status = ResearchStatus::InProgress;
        self.error = None;
    }

    /// Finish the attempt successfully
    pub fn complete(&mut self) {
        self.status = ResearchStatus::Complete;
        self.error = None;
    }

    /// Finish the attempt with a failure message
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = ResearchStatus::Failed;
        self.error = Some(message.into());
    }

    /// Store one source's result, replacing that source's previous entry
    pub fn merge_source(&mut self, source: &str, data: Value) {
        self.payload.insert(source.to_string(), data);
    }

    /// True when any source has contributed data
    pub fn has_data(&self) -> bool {
        !self.payload.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_record_is_pending_and_empty() {
        let record = KnowledgeRecord::new_pending("Socrates");
        assert_eq!(record.name, "Socrates");
        assert_eq!(record.status, ResearchStatus::Pending);
        assert!(record.payload.is_empty());
        assert!(record.error.is_none());
        assert!(!record.has_data());
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn test_begin_attempt_clears_error() {
        let mut record = KnowledgeRecord::new_pending("Hypatia");
        record.fail("network down");
        assert_eq!(record.status, ResearchStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("network down"));

        record.begin_attempt();
        assert_eq!(record.status, ResearchStatus::InProgress);
        assert!(record.error.is_none());
    }

    #[test]
    fn test_complete_reenters_from_complete() {
        let mut record = KnowledgeRecord::new_pending("Kant");
        record.begin_attempt();
        record.complete();
        record.begin_attempt();
        assert_eq!(record.status, ResearchStatus::InProgress);
        record.complete();
        assert_eq!(record.status, ResearchStatus::Complete);
    }

    #[test]
    fn test_merge_source_replaces_entry() {
        let mut record = KnowledgeRecord::new_pending("Plato");
        record.merge_source("wikipedia", json!({"summary": "old"}));
        record.merge_source("wikipedia", json!({"summary": "new"}));

        assert!(record.has_data());
        assert_eq!(record.payload.len(), 1);
        assert_eq!(record.payload["wikipedia"]["summary"], "new");
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            ResearchStatus::Pending,
            ResearchStatus::InProgress,
            ResearchStatus::Complete,
            ResearchStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<ResearchStatus>().unwrap(), status);
        }
        assert!("done".parse::<ResearchStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_value(ResearchStatus::InProgress).unwrap();
        assert_eq!(json, json!("in_progress"));
    }
}
