//! Knowledge research services
//!
//! Bottom-up: sources fetch, the orchestrator runs single-flight attempts,
//! the knowledge service decides when to run them.

pub mod knowledge_service;
pub mod research_orchestrator;
pub mod source;
pub mod staleness;
pub mod wikipedia_client;

#[cfg(test)]
pub(crate) mod test_support;

pub use knowledge_service::{KnowledgeService, KnowledgeStatus};
pub use research_orchestrator::{ResearchOrchestrator, ResearchTrigger};
pub use source::{KnowledgeSource, SourceOutcome};
pub use staleness::StalenessPolicy;
pub use wikipedia_client::{WikipediaClient, WikipediaError, WikipediaSummary};
