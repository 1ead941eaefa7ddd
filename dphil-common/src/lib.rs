//! # Dining Philosophers Common Library
//!
//! Shared code for Dining Philosophers services including:
//! - Database initialization (thinker knowledge schema)
//! - Event types (KnowledgeEvent enum) and EventBus
//! - Configuration loading
//! - SSE helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
