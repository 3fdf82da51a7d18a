use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{info, instrument};

use super::{SourceStore, StoreError};
use crate::model::SourceRecord;

const SOURCE_COLUMNS: &str =
    "source_id, display_name, database_id, page_id, is_active, description, created_at";

/// Open a single-connection pool, creating the database file if needed.
pub async fn connect(database_url: &str) -> Result<SqlitePool, StoreError> {
    let normalized = prepare_sqlite_url(database_url);
    let options = SqliteConnectOptions::from_str(&normalized)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Expand a leading `~/` in file-backed SQLite URLs and make sure the parent
/// directory exists. In-memory and non-sqlite URLs pass through.
fn prepare_sqlite_url(url: &str) -> String {
    let Some(rest) = url.strip_prefix("sqlite:") else {
        return url.to_string();
    };
    if rest.starts_with(":memory") {
        return url.to_string();
    }

    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let (path, query) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };
    if path.is_empty() {
        return url.to_string();
    }

    let path = match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(tail), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), tail),
        _ => path.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    match query {
        Some(q) => format!("sqlite://{}?{}", path, q),
        None => format!("sqlite://{}", path),
    }
}

fn row_to_source(row: &SqliteRow) -> Result<SourceRecord, sqlx::Error> {
    Ok(SourceRecord {
        source_id: row.try_get("source_id")?,
        display_name: row.try_get("display_name")?,
        database_id: row.try_get("database_id")?,
        page_id: row.try_get("page_id")?,
        is_active: row.try_get("is_active")?,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
    })
}

#[derive(Debug, Clone)]
pub struct SqliteSourceStore {
    pool: SqlitePool,
}

impl SqliteSourceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect and migrate in one step.
    pub async fn open(database_url: &str) -> Result<Self, StoreError> {
        let pool = connect(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl SourceStore for SqliteSourceStore {
    #[instrument(skip_all)]
    async fn get_active_sources(&self) -> Result<Vec<SourceRecord>, StoreError> {
        let sql = format!(
            "SELECT {SOURCE_COLUMNS} FROM sources WHERE is_active = 1 ORDER BY created_at, source_id"
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        let sources = rows
            .iter()
            .map(row_to_source)
            .collect::<Result<Vec<_>, _>>()?;
        info!(count = sources.len(), "active sources loaded");
        Ok(sources)
    }

    #[instrument(skip_all)]
    async fn list_sources(&self) -> Result<Vec<SourceRecord>, StoreError> {
        let sql = format!("SELECT {SOURCE_COLUMNS} FROM sources ORDER BY created_at, source_id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(row_to_source)
            .collect::<Result<Vec<_>, _>>()?)
    }

    #[instrument(skip(self))]
    async fn get_source(&self, source_id: &str) -> Result<Option<SourceRecord>, StoreError> {
        let sql = format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE source_id = ?");
        let row = sqlx::query(&sql)
            .bind(source_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_source).transpose()?)
    }

    #[instrument(skip_all, fields(source_id = %source.source_id))]
    async fn save_source(&self, source: &SourceRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO sources \
                (source_id, display_name, database_id, page_id, is_active, description, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(source_id) DO UPDATE SET \
                display_name = excluded.display_name, \
                database_id = excluded.database_id, \
                page_id = excluded.page_id, \
                is_active = excluded.is_active, \
                description = excluded.description, \
                updated_at = excluded.updated_at",
        )
        .bind(&source.source_id)
        .bind(&source.display_name)
        .bind(&source.database_id)
        .bind(&source.page_id)
        .bind(source.is_active)
        .bind(&source.description)
        .bind(source.created_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        info!(name = %source.display_name, "source saved");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_source(&self, source_id: &str) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM sources WHERE source_id = ?")
            .bind(source_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
