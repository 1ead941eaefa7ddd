//! HTTP API handlers for dphil-kr
//!
//! REST endpoints over the knowledge service, plus an SSE stream of
//! research events.

pub mod health;
pub mod knowledge;
pub mod sse;

pub use health::health_routes;
pub use knowledge::knowledge_routes;
pub use sse::knowledge_event_stream;
