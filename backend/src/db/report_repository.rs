use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::ReportStatus;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::db::models::{NewReport, Report};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid data format: {0}")]
    InvalidData(String),
}

/// Append-only store of verified reports.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn insert(&self, report: NewReport) -> Result<Report, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<Report>, RepositoryError>;
}

#[derive(Clone)]
pub struct SqliteReportRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct ReportRow {
    id: i64,
    lat: f64,
    lon: f64,
    image_path: String,
    status: String,
    timestamp: DateTime<Utc>,
    ai_analysis: String,
    confidence: f64,
}

impl TryFrom<ReportRow> for Report {
    type Error = RepositoryError;

    fn try_from(row: ReportRow) -> Result<Self, Self::Error> {
        let status = ReportStatus::from_str(&row.status).map_err(|_| {
            RepositoryError::InvalidData(format!("unknown status '{}' on report {}", row.status, row.id))
        })?;
        Ok(Report {
            id: row.id,
            lat: row.lat,
            lon: row.lon,
            image_path: row.image_path,
            status,
            timestamp: row.timestamp,
            ai_analysis: row.ai_analysis,
            confidence: row.confidence,
        })
    }
}

impl SqliteReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database file and ensures the schema exists.
    pub async fn connect(db_path: &Path) -> Result<Self, RepositoryError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let repo = Self::new(pool);
        repo.init().await?;
        log::info!("Report database ready at {}", db_path.display());
        Ok(repo)
    }

    pub async fn init(&self) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reports (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              lat REAL NOT NULL,
              lon REAL NOT NULL,
              image_path TEXT NOT NULL,
              status TEXT NOT NULL,
              timestamp TEXT NOT NULL,
              ai_analysis TEXT NOT NULL,
              confidence REAL NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ReportStore for SqliteReportRepository {
    async fn insert(&self, report: NewReport) -> Result<Report, RepositoryError> {
        let timestamp = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO reports (lat, lon, image_path, status, timestamp, ai_analysis, confidence)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(report.lat)
        .bind(report.lon)
        .bind(&report.image_path)
        .bind(report.status.to_string())
        .bind(timestamp)
        .bind(&report.ai_analysis)
        .bind(report.confidence)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            log::error!("Failed to insert report for {}: {:?}", report.image_path, e);
            RepositoryError::Database(e)
        })?;

        let id = result.last_insert_rowid();
        log::info!("✅ Stored report {} ({})", id, report.image_path);
        Ok(report.into_report(id, timestamp))
    }

    async fn list_all(&self) -> Result<Vec<Report>, RepositoryError> {
        let rows = sqlx::query_as::<_, ReportRow>(
            r#"
            SELECT id, lat, lon, image_path, status, timestamp, ai_analysis, confidence
            FROM reports ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Report::try_from).collect()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Single-connection in-memory database; more connections would each see an empty DB.
    pub async fn in_memory_repository() -> SqliteReportRepository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let repo = SqliteReportRepository::new(pool);
        repo.init().await.unwrap();
        repo
    }
}
