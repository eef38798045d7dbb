//! Shared helpers for integration tests: a scripted source that talks to
//! a wiremock server and an in-memory stand-in for the persistence
//! gateway.
#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use tapestry_common::{NormalizedFile, NormalizedItem, RefIds};
use tapestry_ingest::page::{PageCursor, PageRequest, SourcePage};
use tapestry_ingest::source::{IngestSource, MapError, MappedRecord, RunParams};
use tapestry_ingest::store::{ItemStore, StoreError};

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tapestry_ingest=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// A source whose pages live on a mock HTTP server. Envelope:
/// `{"records": [...], "cursor": "..."}`, records need an `id`.
pub struct TestSource {
    name: String,
    base_url: String,
}

impl TestSource {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
        }
    }
}

impl IngestSource for TestSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn media_type(&self) -> &str {
        "Text"
    }

    fn license(&self) -> &str {
        "Public Domain"
    }

    fn request_for(&self, cursor: &PageCursor, _params: &RunParams) -> PageRequest {
        match cursor {
            PageCursor::Token(token) => {
                PageRequest::get(format!("{}/page?cursor={}", self.base_url, token))
            },
            _ => PageRequest::get(format!("{}/page", self.base_url)),
        }
    }

    fn parse_page(&self, body: &str) -> Result<SourcePage, MapError> {
        let envelope: Value = serde_json::from_str(body)?;
        let records = envelope
            .get("records")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| MapError::Envelope("missing `records`".into()))?;
        let next = envelope
            .get("cursor")
            .and_then(Value::as_str)
            .map(|c| PageCursor::Token(c.to_string()));
        Ok(SourcePage::new(records, next))
    }

    fn map_record(&self, raw: &Value) -> Result<MappedRecord, MapError> {
        let id = raw
            .get("id")
            .and_then(Value::as_str)
            .ok_or(MapError::MissingField("id"))?;
        let item = NormalizedItem {
            source_item_id: id.to_string(),
            title: raw
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or("Untitled")
                .to_string(),
            description: None,
            creator_override: None,
            publication_date: None,
            source_url: format!("{}/items/{}", self.base_url, id),
            extra_info: raw.clone(),
        };
        Ok(MappedRecord {
            item,
            files: Vec::new(),
        })
    }
}

/// In-memory `ItemStore` that records every save and can be scripted to
/// fail in the ways the pipeline must tolerate.
#[derive(Default)]
pub struct InMemoryStore {
    pub saved: Mutex<Vec<(RefIds, NormalizedItem, Vec<NormalizedFile>)>>,
    /// Source name whose reference resolution fails.
    pub missing_reference_for: Option<String>,
    /// `source_item_id` whose save fails with a per-record error.
    pub fail_on: Option<String>,
    /// After this many successful saves, fail with a connection-fatal
    /// error.
    pub fatal_after: Option<usize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved_items(&self) -> Vec<NormalizedItem> {
        self.saved
            .lock()
            .unwrap()
            .iter()
            .map(|(_, item, _)| item.clone())
            .collect()
    }

    pub fn saved_count(&self) -> usize {
        self.saved.lock().unwrap().len()
    }
}

#[async_trait]
impl ItemStore for InMemoryStore {
    async fn resolve_references(
        &self,
        source: &str,
        _media_type: &str,
        license: &str,
    ) -> Result<RefIds, StoreError> {
        if self.missing_reference_for.as_deref() == Some(source) {
            return Err(StoreError::reference_not_found("licenses", license));
        }
        Ok(RefIds {
            source_id: 1,
            type_id: 1,
            license_id: 1,
        })
    }

    async fn save_item(
        &self,
        refs: &RefIds,
        item: &NormalizedItem,
        files: &[NormalizedFile],
    ) -> Result<i64, StoreError> {
        let mut saved = self.saved.lock().unwrap();

        if let Some(limit) = self.fatal_after {
            if saved.len() >= limit {
                return Err(StoreError::Database(sqlx::Error::PoolClosed));
            }
        }
        if self.fail_on.as_deref() == Some(item.source_item_id.as_str()) {
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        }

        saved.push((*refs, item.clone(), files.to_vec()));
        Ok(saved.len() as i64)
    }
}
