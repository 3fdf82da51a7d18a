//! Source store: where multi-source deployments keep their `SourceRecord`s.
//!
//! - `repo`: the SQLite implementation and pool/migration helpers.
//!
//! The pipeline never writes here; operators manage records through the
//! `sources` binary.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::SourceRecord;

pub mod repo;

pub use repo::{connect, run_migrations, SqliteSourceStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Active sources in configured order (creation time, then id).
    async fn get_active_sources(&self) -> Result<Vec<SourceRecord>, StoreError>;

    /// Every source, active or not, in configured order.
    async fn list_sources(&self) -> Result<Vec<SourceRecord>, StoreError>;

    async fn get_source(&self, source_id: &str) -> Result<Option<SourceRecord>, StoreError>;

    /// Insert or update. `source_id` and `created_at` of an existing record
    /// are never rewritten.
    async fn save_source(&self, source: &SourceRecord) -> Result<(), StoreError>;

    /// Returns whether a record was removed.
    async fn delete_source(&self, source_id: &str) -> Result<bool, StoreError>;
}
