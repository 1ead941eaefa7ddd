//! Wikipedia knowledge source
//!
//! Looks a subject up through the MediaWiki action API:
//! 1. Full-text search, keep the top-ranked page title
//! 2. Plain-text introduction (truncated), thumbnail URL and page id
//! 3. Section headings, keeping those that match an interesting topic
//!
//! Any failure degrades to "no data from Wikipedia"; see [`KnowledgeSource`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::KnowledgeConfig;
use crate::services::source::{KnowledgeSource, SourceOutcome};

/// Payload key for Wikipedia data
pub const SOURCE_NAME: &str = "wikipedia";

/// Section headings worth recording (case-insensitive substring match)
pub const INTERESTING_SECTIONS: &[&str] = &[
    "Philosophy",
    "Works",
    "Legacy",
    "Contributions",
    "Ideas",
    "Thought",
    "Beliefs",
    "Views",
    "Major works",
    "Notable works",
    "Influence",
    "Career",
    "Life",
    "Early life",
    "Biography",
];

/// Page id MediaWiki uses for a title that does not exist
const MISSING_PAGE_ID: &str = "-1";

/// Wikipedia client errors
#[derive(Debug, Error)]
pub enum WikipediaError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Data stored under `payload.wikipedia`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WikipediaSummary {
    /// Page title of the top search hit
    pub title: String,
    /// Plain-text introduction, truncated to the configured length
    pub summary: String,
    /// MediaWiki page id
    pub page_id: String,
    /// When this data was fetched
    pub fetched_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Interesting section heading → marker text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    query: Option<PageQuery>,
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default)]
    pages: BTreeMap<String, Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    title: Option<String>,
    #[serde(default)]
    extract: String,
    thumbnail: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    source: String,
}

#[derive(Debug, Deserialize)]
struct ParseResponse {
    parse: Option<ParseBody>,
}

#[derive(Debug, Deserialize)]
struct ParseBody {
    #[serde(default)]
    sections: Vec<SectionEntry>,
}

#[derive(Debug, Deserialize)]
struct SectionEntry {
    #[serde(default)]
    line: String,
    #[serde(default)]
    index: Value,
}

/// Wikipedia API client
pub struct WikipediaClient {
    http_client: reqwest::Client,
    api_url: String,
    summary_max_chars: usize,
    thumbnail_size: u32,
}

impl WikipediaClient {
    pub fn new(config: &KnowledgeConfig) -> Result<Self, WikipediaError> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| WikipediaError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            api_url: config.wikipedia_api_url.clone(),
            summary_max_chars: config.summary_max_chars,
            thumbnail_size: config.thumbnail_size,
        })
    }

    /// Look up a subject
    ///
    /// `Ok(None)` means Wikipedia has no matching page; that is not an error.
    pub async fn lookup(&self, subject: &str) -> Result<Option<WikipediaSummary>, WikipediaError> {
        let Some(title) = self.search_title(subject).await? else {
            debug!(subject = %subject, "No Wikipedia page found");
            return Ok(None);
        };

        let Some(mut summary) = self.fetch_page(&title).await? else {
            debug!(subject = %subject, title = %title, "Wikipedia search hit has no page");
            return Ok(None);
        };

        summary.sections = self.fetch_sections(&title).await;

        info!(
            subject = %subject,
            title = %summary.title,
            sections = summary.sections.as_ref().map(|s| s.len()).unwrap_or(0),
            "Retrieved Wikipedia summary"
        );

        Ok(Some(summary))
    }

    async fn get_json<T>(&self, params: &[(&str, &str)]) -> Result<T, WikipediaError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .http_client
            .get(&self.api_url)
            .query(params)
            .send()
            .await
            .map_err(|e| WikipediaError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(WikipediaError::ApiError(status.as_u16(), error_text));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| WikipediaError::ParseError(e.to_string()))
    }

    /// Title of the top-ranked search hit
    async fn search_title(&self, subject: &str) -> Result<Option<String>, WikipediaError> {
        let response: SearchResponse = self
            .get_json(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", subject),
                ("srlimit", "1"),
                ("format", "json"),
            ])
            .await?;

        Ok(response
            .query
            .and_then(|q| q.search.into_iter().next())
            .map(|hit| hit.title))
    }

    /// Introduction, thumbnail and page id for a title
    async fn fetch_page(&self, title: &str) -> Result<Option<WikipediaSummary>, WikipediaError> {
        let thumbnail_size = self.thumbnail_size.to_string();
        let response: PageResponse = self
            .get_json(&[
                ("action", "query"),
                ("titles", title),
                ("prop", "extracts|pageimages|info"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("pithumbsize", thumbnail_size.as_str()),
                ("format", "json"),
            ])
            .await?;

        let pages = response.query.map(|q| q.pages).unwrap_or_default();

        Ok(pages
            .into_iter()
            .find(|(page_id, _)| page_id != MISSING_PAGE_ID)
            .map(|(page_id, page)| WikipediaSummary {
                title: page.title.unwrap_or_else(|| title.to_string()),
                summary: truncate_chars(&page.extract, self.summary_max_chars),
                page_id,
                fetched_at: Utc::now(),
                image_url: page.thumbnail.map(|t| t.source),
                sections: None,
            }))
    }

    /// Interesting sections of a page, or `None` if there are none
    ///
    /// Failures are logged and yield `None`: a page without sections is
    /// still a useful result.
    async fn fetch_sections(&self, title: &str) -> Option<BTreeMap<String, String>> {
        let response: ParseResponse = match self
            .get_json(&[
                ("action", "parse"),
                ("page", title),
                ("prop", "sections"),
                ("format", "json"),
            ])
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!(title = %title, error = %e, "Failed to fetch Wikipedia sections");
                return None;
            }
        };

        let sections: BTreeMap<String, String> = response
            .parse
            .map(|p| p.sections)
            .unwrap_or_default()
            .into_iter()
            .filter(|section| is_interesting_section(&section.line))
            .map(|section| {
                let marker = format!("Section {}: {}", section_index(&section.index), section.line);
                (section.line, marker)
            })
            .collect();

        if sections.is_empty() {
            None
        } else {
            Some(sections)
        }
    }
}

#[async_trait]
impl KnowledgeSource for WikipediaClient {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn fetch(&self, subject: &str) -> SourceOutcome {
        match self.lookup(subject).await {
            Ok(Some(summary)) => match serde_json::to_value(&summary) {
                Ok(value) => SourceOutcome::Data(value),
                Err(e) => {
                    warn!(subject = %subject, error = %e, "Failed to encode Wikipedia data");
                    SourceOutcome::NoData
                }
            },
            Ok(None) => SourceOutcome::NoData,
            Err(e) => {
                warn!(subject = %subject, error = %e, "Failed to fetch Wikipedia data");
                SourceOutcome::NoData
            }
        }
    }
}

/// Case-insensitive substring match against [`INTERESTING_SECTIONS`]
pub fn is_interesting_section(heading: &str) -> bool {
    let heading = heading.to_lowercase();
    INTERESTING_SECTIONS
        .iter()
        .any(|topic| heading.contains(&topic.to_lowercase()))
}

/// Keep at most `max_chars` characters (never splits a code point)
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_offset, _)) => text[..byte_offset].to_string(),
        None => text.to_string(),
    }
}

fn section_index(index: &Value) -> String {
    match index {
        Value::String(s) => s.clone(),
        Value::Null => "?".to_string(),
        other => other.to_string(),
    }
}
