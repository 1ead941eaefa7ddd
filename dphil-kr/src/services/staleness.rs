//! Staleness policy
//!
//! A record needs (re)research when it is not complete, or when its last
//! write is older than the threshold.

use chrono::{DateTime, Duration, Utc};

use crate::models::{KnowledgeRecord, ResearchStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    threshold: Duration,
}

impl StalenessPolicy {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    /// Staleness against the current time
    pub fn is_stale(&self, record: &KnowledgeRecord) -> bool {
        self.is_stale_at(record, Utc::now())
    }

    /// Staleness against a given instant
    ///
    /// Age exactly equal to the threshold is still fresh.
    pub fn is_stale_at(&self, record: &KnowledgeRecord, now: DateTime<Utc>) -> bool {
        if record.status != ResearchStatus::Complete {
            return true;
        }
        now - record.updated_at > self.threshold
    }

    /// `updated_at` cutoff for the stale sweep: complete records written
    /// strictly before this instant are stale
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.threshold
    }
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self::new(Duration::days(crate::config::DEFAULT_STALENESS_DAYS))
    }
}
