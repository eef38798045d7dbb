//! Persistence gateway
//!
//! `ItemStore` is the pipeline's only view of storage: resolve the
//! reference rows for a source once, then save items one atomic
//! item+files group at a time.

use async_trait::async_trait;
use thiserror::Error;

use tapestry_common::{NormalizedFile, NormalizedItem, RefIds};

pub mod postgres;

pub use postgres::PgItemStore;

/// Storage failure, classified for the pipeline's halt decision.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A reference row is missing. Reference tables are populated by
    /// migration; this is a hard stop for the source, not retried.
    #[error("{table} entry '{name}' not found; reference tables must be seeded before ingestion")]
    ReferenceNotFound { table: &'static str, name: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn reference_not_found(table: &'static str, name: impl Into<String>) -> Self {
        Self::ReferenceNotFound {
            table,
            name: name.into(),
        }
    }

    /// True when the connection itself is unusable, in which case the
    /// pipeline halts instead of skipping to the next record.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            StoreError::Database(
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            )
        )
    }
}

/// Reference resolution plus the atomic upsert of one item and its files.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Look up the ids for a source's reference rows. Lookup only; never
    /// creates rows.
    async fn resolve_references(
        &self,
        source: &str,
        media_type: &str,
        license: &str,
    ) -> Result<RefIds, StoreError>;

    /// Upsert the item keyed on `(source_id, source_item_id)` and insert
    /// any files not yet present, all in one transaction. Returns the
    /// item's id. Calling twice with identical input changes nothing but
    /// the item's `updated_at`.
    async fn save_item(
        &self,
        refs: &RefIds,
        item: &NormalizedItem,
        files: &[NormalizedFile],
    ) -> Result<i64, StoreError>;
}
