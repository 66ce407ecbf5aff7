//! services/api/src/adapters/db.rs
//!
//! This module contains the history store adapter, which is the concrete
//! implementation of the `HistoryStore` port from the `core` crate. It
//! persists the append-only report log in SQLite using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use solaudit_core::domain::{AuditMode, HistoryEntry, Report, ReportSection};
use solaudit_core::ports::{HistoryStore, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A SQLite-backed adapter that implements the `HistoryStore` port.
/// Appends go through a single writer connection, so concurrent sessions
/// are serialized rather than interleaved.
#[derive(Clone)]
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    /// Creates a new `SqliteHistoryStore`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ReportRecord {
    seq: i64,
    id: String,
    contract_name: String,
    mode: String,
    title: String,
    source_digest: String,
    body: String,
    created_at: DateTime<Utc>,
}

impl ReportRecord {
    fn to_domain(self) -> PortResult<HistoryEntry> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| PortError::Unexpected(format!("corrupt report id '{}': {}", self.id, e)))?;
        let mode: AuditMode = self
            .mode
            .parse()
            .map_err(|e| PortError::Unexpected(format!("corrupt report mode: {}", e)))?;
        let sections: Vec<ReportSection> = serde_json::from_str(&self.body)
            .map_err(|e| PortError::Unexpected(format!("corrupt report body: {}", e)))?;

        Ok(HistoryEntry {
            position: self.seq,
            report: Report {
                id,
                contract_name: self.contract_name,
                mode,
                title: self.title,
                source_digest: self.source_digest,
                sections,
                created_at: self.created_at,
            },
        })
    }
}

//=========================================================================================
// `HistoryStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn append(&self, report: &Report) -> PortResult<HistoryEntry> {
        let body = serde_json::to_string(&report.sections)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let record = sqlx::query_as::<_, ReportRecord>(
            "INSERT INTO reports (id, contract_name, mode, title, source_digest, body, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             RETURNING seq, id, contract_name, mode, title, source_digest, body, created_at",
        )
        .bind(report.id.to_string())
        .bind(&report.contract_name)
        .bind(report.mode.to_string())
        .bind(&report.title)
        .bind(&report.source_digest)
        .bind(body)
        .bind(report.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        record.to_domain()
    }

    async fn list(&self) -> PortResult<Vec<HistoryEntry>> {
        let records = sqlx::query_as::<_, ReportRecord>(
            "SELECT seq, id, contract_name, mode, title, source_digest, body, created_at \
             FROM reports ORDER BY seq DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(ReportRecord::to_domain).collect()
    }

    async fn get(&self, id: Uuid) -> PortResult<Report> {
        let record = sqlx::query_as::<_, ReportRecord>(
            "SELECT seq, id, contract_name, mode, title, source_digest, body, created_at \
             FROM reports WHERE id = ?1",
        )
        .bind(id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Report {} not found", id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;

        record.to_domain().map(|entry| entry.report)
    }
}
