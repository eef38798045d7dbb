//! Normalized record model shared across Tapestry
//!
//! One `NormalizedItem` plus zero or more `NormalizedFile`s is the
//! canonical output of every source mapper, whatever the provider's own
//! envelope looks like. Reference ids (`RefIds`) are resolved separately
//! so mappers stay pure.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Canonical unit of ingested content, before reference resolution.
///
/// `source_item_id` is the provider's stable identifier for the record;
/// `(source, source_item_id)` is the natural key the persistence layer
/// upserts on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedItem {
    pub source_item_id: String,
    pub title: String,
    pub description: Option<String>,
    pub creator_override: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub source_url: String,
    /// Provider metadata stored verbatim as JSONB; never interpreted here.
    pub extra_info: serde_json::Value,
}

/// A downloadable asset attached to an item.
///
/// Files are insert-only: re-ingestion may add new files to an item but
/// never rewrites an existing row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFile {
    pub file_url: String,
    pub format: Option<String>,
    pub size: Option<i64>,
    pub notes: Option<String>,
}

impl NormalizedFile {
    pub fn new(file_url: impl Into<String>) -> Self {
        Self {
            file_url: file_url.into(),
            format: None,
            size: None,
            notes: None,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_size(mut self, size: i64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Resolved foreign keys for one source's pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefIds {
    pub source_id: i32,
    pub type_id: i32,
    pub license_id: i32,
}
