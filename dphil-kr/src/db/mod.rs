//! Database access for dphil-kr
//!
//! Shared SQLite database; schema is created by `dphil_common::db::init`.

pub mod knowledge;

pub use knowledge::{KnowledgeStore, SqliteKnowledgeStore};
