//! In-process MediaWiki API stand-in
//!
//! Serves search, page and section queries for a fixed set of pages and
//! counts search requests.

#![allow(dead_code)]

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone)]
pub struct MockPage {
    pub page_id: &'static str,
    pub title: &'static str,
    pub extract: String,
    pub thumbnail: Option<&'static str>,
    pub sections: Vec<(&'static str, &'static str)>,
}

#[derive(Default)]
pub struct MockWikipedia {
    pages: Vec<MockPage>,
    searches: AtomicUsize,
}

impl MockWikipedia {
    pub fn new(pages: Vec<MockPage>) -> Self {
        Self {
            pages,
            searches: AtomicUsize::new(0),
        }
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    fn by_title(&self, title: &str) -> Option<&MockPage> {
        self.pages.iter().find(|page| page.title == title)
    }

    fn respond(&self, params: &HashMap<String, String>) -> Value {
        let get = |key: &str| params.get(key).map(String::as_str).unwrap_or_default();

        if get("list") == "search" {
            self.searches.fetch_add(1, Ordering::SeqCst);
            let hits: Vec<Value> = self
                .pages
                .iter()
                .filter(|page| page.title.contains(get("srsearch")))
                .take(1)
                .map(|page| json!({"title": page.title}))
                .collect();
            return json!({"query": {"search": hits}});
        }

        if get("action") == "parse" {
            let sections: Vec<Value> = self
                .by_title(get("page"))
                .map(|page| {
                    page.sections
                        .iter()
                        .map(|(index, line)| json!({"index": index, "line": line}))
                        .collect()
                })
                .unwrap_or_default();
            return json!({"parse": {"sections": sections}});
        }

        match self.by_title(get("titles")) {
            Some(page) => {
                let mut entry = json!({"title": page.title, "extract": page.extract});
                if let Some(thumbnail) = page.thumbnail {
                    entry["thumbnail"] = json!({"source": thumbnail});
                }
                json!({"query": {"pages": {page.page_id: entry}}})
            }
            None => json!({"query": {"pages": {"-1": {"title": get("titles"), "missing": ""}}}}),
        }
    }
}

async fn api(
    State(mock): State<Arc<MockWikipedia>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    Json(mock.respond(&params))
}

/// Serve `mock` on an ephemeral port; returns the API URL
pub async fn spawn_mock_wikipedia(mock: Arc<MockWikipedia>) -> String {
    let app = Router::new().route("/w/api.php", get(api)).with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/w/api.php", addr)
}
