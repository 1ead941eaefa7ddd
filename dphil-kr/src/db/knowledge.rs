//! Knowledge store: durable CRUD over thinker knowledge records
//!
//! Records are keyed by exact subject name. The store enforces name
//! uniqueness; single-writer-per-name is the orchestrator's job.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use dphil_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{KnowledgeRecord, ResearchPayload, ResearchStatus};

/// Persistent storage for knowledge records
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Look up a record by exact name
    async fn find_by_name(&self, name: &str) -> Result<Option<KnowledgeRecord>>;

    /// Insert a brand-new record, keeping its timestamps as given
    ///
    /// Fails with a uniqueness violation if the name already exists.
    async fn insert(&self, record: &KnowledgeRecord) -> Result<()>;

    /// Return the existing record, or create and return a pending one
    async fn get_or_create(&self, name: &str) -> Result<KnowledgeRecord>;

    /// Upsert a record, stamping `updated_at` with the current time
    async fn save(&self, record: &mut KnowledgeRecord) -> Result<()>;

    /// Complete records whose `updated_at` is strictly before `older_than`
    async fn list_stale_complete(&self, older_than: DateTime<Utc>) -> Result<Vec<KnowledgeRecord>>;
}

/// SQLite-backed knowledge store
///
/// Every call checks a connection out of the pool, so background research
/// never shares a connection with a request handler.
#[derive(Debug, Clone)]
pub struct SqliteKnowledgeStore {
    pool: SqlitePool,
}

impl SqliteKnowledgeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KnowledgeStore for SqliteKnowledgeStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<KnowledgeRecord>> {
        load_knowledge_by_name(&self.pool, name).await
    }

    async fn insert(&self, record: &KnowledgeRecord) -> Result<()> {
        insert_knowledge(&self.pool, record).await
    }

    async fn get_or_create(&self, name: &str) -> Result<KnowledgeRecord> {
        if let Some(existing) = load_knowledge_by_name(&self.pool, name).await? {
            return Ok(existing);
        }

        let record = KnowledgeRecord::new_pending(name);
        match insert_knowledge(&self.pool, &record).await {
            Ok(()) => {
                tracing::debug!(name = %name, id = %record.id, "Created pending knowledge record");
                Ok(record)
            }
            // Lost a first-lookup race with another writer; theirs is the record
            Err(e) if e.is_unique_violation() => load_knowledge_by_name(&self.pool, name)
                .await?
                .ok_or_else(|| Error::Internal(format!("Knowledge record vanished after conflict: {}", name))),
            Err(e) => Err(e),
        }
    }

    async fn save(&self, record: &mut KnowledgeRecord) -> Result<()> {
        record.updated_at = Utc::now();
        save_knowledge(&self.pool, record).await
    }

    async fn list_stale_complete(&self, older_than: DateTime<Utc>) -> Result<Vec<KnowledgeRecord>> {
        load_stale_complete(&self.pool, older_than).await
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

fn record_from_row(row: &SqliteRow) -> Result<KnowledgeRecord> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let research_data: String = row.try_get("research_data")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    let payload: ResearchPayload = serde_json::from_str(&research_data)?;

    Ok(KnowledgeRecord {
        id: Uuid::parse_str(&id)
            .map_err(|e| Error::Internal(format!("Invalid knowledge id {}: {}", id, e)))?,
        name: row.try_get("name")?,
        status: status.parse::<ResearchStatus>()?,
        payload,
        error: row.try_get("error_message")?,
        created_at: parse_timestamp(&created_at, "created_at")?,
        updated_at: parse_timestamp(&updated_at, "updated_at")?,
    })
}

/// Load a knowledge record by exact name
pub async fn load_knowledge_by_name(pool: &SqlitePool, name: &str) -> Result<Option<KnowledgeRecord>> {
    let row = sqlx::query(
        r#"
        SELECT id, name, status, research_data, error_message, created_at, updated_at
        FROM thinker_knowledge
        WHERE name = ?
        "#,
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(record_from_row).transpose()
}

/// Insert a new knowledge record
pub async fn insert_knowledge(pool: &SqlitePool, record: &KnowledgeRecord) -> Result<()> {
    let research_data = serde_json::to_string(&record.payload)?;

    sqlx::query(
        r#"
        INSERT INTO thinker_knowledge (
            id, name, status, research_data, error_message, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.id.to_string())
    .bind(&record.name)
    .bind(record.status.as_str())
    .bind(&research_data)
    .bind(&record.error)
    .bind(format_timestamp(&record.created_at))
    .bind(format_timestamp(&record.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// Upsert a knowledge record by id
///
/// `name` and `created_at` are immutable once stored.
pub async fn save_knowledge(pool: &SqlitePool, record: &KnowledgeRecord) -> Result<()> {
    let research_data = serde_json::to_string(&record.payload)?;

    sqlx::query(
        r#"
        INSERT INTO thinker_knowledge (
            id, name, status, research_data, error_message, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            status = excluded.status,
            research_data = excluded.research_data,
            error_message = excluded.error_message,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(record.id.to_string())
    .bind(&record.name)
    .bind(record.status.as_str())
    .bind(&research_data)
    .bind(&record.error)
    .bind(format_timestamp(&record.created_at))
    .bind(format_timestamp(&record.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// Load complete records last written before `older_than`
pub async fn load_stale_complete(pool: &SqlitePool, older_than: DateTime<Utc>) -> Result<Vec<KnowledgeRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, status, research_data, error_message, created_at, updated_at
        FROM thinker_knowledge
        WHERE status = 'complete' AND updated_at < ?
        ORDER BY updated_at ASC
        "#,
    )
    .bind(format_timestamp(&older_than))
    .fetch_all(pool)
    .await?;

    rows.iter().map(record_from_row).collect()
}
