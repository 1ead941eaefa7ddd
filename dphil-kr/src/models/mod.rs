//! Data models for dphil-kr (Knowledge Research service)

pub mod knowledge;

pub use knowledge::{KnowledgeRecord, ResearchPayload, ResearchStatus};
