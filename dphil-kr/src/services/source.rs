//! Knowledge source abstraction
//!
//! A source gathers external data about a subject. Sources never fail from
//! the caller's point of view: every network, parsing or shape error is
//! collapsed to [`SourceOutcome::NoData`] inside the source, so one outage
//! cannot fail a research attempt or block other sources.

use async_trait::async_trait;
use serde_json::Value;

/// Result of asking one source about one subject
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome {
    /// Structured data, stored in the payload under the source's name
    Data(Value),
    /// Nothing usable (no match, or the source was unavailable)
    NoData,
}

impl From<Option<Value>> for SourceOutcome {
    fn from(value: Option<Value>) -> Self {
        match value {
            Some(data) => SourceOutcome::Data(data),
            None => SourceOutcome::NoData,
        }
    }
}

/// External data gatherer plugged into the research orchestrator
///
/// # Example
/// ```rust,ignore
/// struct QuotesSource;
///
/// #[async_trait::async_trait]
/// impl KnowledgeSource for QuotesSource {
///     fn name(&self) -> &'static str { "quotes" }
///
///     async fn fetch(&self, subject: &str) -> SourceOutcome {
///         SourceOutcome::NoData
///     }
/// }
/// ```
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// Payload key for this source's data
    fn name(&self) -> &'static str;

    /// Fetch best-effort data about `subject`
    async fn fetch(&self, subject: &str) -> SourceOutcome;
}
