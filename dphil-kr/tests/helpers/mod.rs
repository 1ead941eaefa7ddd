//! Test Helper Utilities
//!
//! Shared utilities for testing dphil-kr

pub mod mock_wikipedia;
pub mod test_app;

pub use mock_wikipedia::{spawn_mock_wikipedia, MockPage, MockWikipedia};
pub use test_app::{body_json, create_test_app, create_test_app_with, RecordingSource, TestApp};
