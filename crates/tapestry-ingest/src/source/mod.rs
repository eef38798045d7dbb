//! The per-source contract
//!
//! Every provider plugs into the pipeline through `IngestSource`: how to
//! build the request for a cursor, how to read the provider's page
//! envelope, and how to map one raw record to the normalized model.
//! Mapping is pure — no I/O, no panics on missing optional fields — so
//! the pipeline alone owns sequencing, pacing, and persistence.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use tapestry_common::{NormalizedFile, NormalizedItem};

use crate::config::IngestConfig;
use crate::page::{PageCursor, PageRequest, SourcePage};

pub mod creative_commons;
pub mod internet_archive;
pub mod library_of_congress;
pub mod public_domain_review;
pub mod smithsonian;
pub mod wikimedia_commons;

pub use creative_commons::CreativeCommonsSource;
pub use internet_archive::InternetArchiveSource;
pub use library_of_congress::LibraryOfCongressSource;
pub use public_domain_review::PublicDomainReviewSource;
pub use smithsonian::SmithsonianSource;
pub use wikimedia_commons::WikimediaCommonsSource;

/// A record (or page) the source could not make sense of. One record's
/// `MapError` skips that record; a page-envelope `MapError` ends the run
/// early.
#[derive(Error, Debug)]
pub enum MapError {
    #[error("unexpected envelope: {0}")]
    Envelope(String),

    #[error("record missing required field `{0}`")]
    MissingField(&'static str),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Output of mapping one raw record.
#[derive(Debug, Clone)]
pub struct MappedRecord {
    pub item: NormalizedItem,
    pub files: Vec<NormalizedFile>,
}

/// Per-run parameters for the on-demand entrypoint: an optional query to
/// spot-check instead of the source's default sweep.
#[derive(Debug, Clone, Default)]
pub struct RunParams {
    pub query: Option<String>,
}

impl RunParams {
    pub fn with_query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
        }
    }
}

/// One external provider: pagination interpretation plus pure record
/// mapping.
///
/// `name`, `media_type`, and `license` must match rows in the reference
/// tables; resolution failure is fatal for the source's run.
pub trait IngestSource: Send + Sync {
    fn name(&self) -> &str;

    fn media_type(&self) -> &str;

    fn license(&self) -> &str;

    /// Build the request for the given cursor. Called with
    /// `PageCursor::Start` first, then with whatever `parse_page`
    /// returned as `next`.
    fn request_for(&self, cursor: &PageCursor, params: &RunParams) -> PageRequest;

    /// Interpret the provider's own page envelope (JSON or HTML).
    fn parse_page(&self, body: &str) -> Result<SourcePage, MapError>;

    /// Map one raw record. Pure; must tolerate missing optional fields.
    fn map_record(&self, raw: &Value) -> Result<MappedRecord, MapError>;
}

/// The sources registered for a full run, in their fixed execution
/// order. Sources whose required credentials are absent are skipped with
/// a warning rather than registered to fail.
pub fn registry(config: &IngestConfig) -> Vec<Arc<dyn IngestSource>> {
    let mut sources: Vec<Arc<dyn IngestSource>> = vec![
        Arc::new(InternetArchiveSource::new()),
        Arc::new(WikimediaCommonsSource::new()),
        Arc::new(LibraryOfCongressSource::new()),
        Arc::new(CreativeCommonsSource::new()),
    ];

    match &config.smithsonian_api_key {
        Some(key) => sources.push(Arc::new(SmithsonianSource::new(key.clone()))),
        None => warn!("SMITHSONIAN_API_KEY not set; skipping Smithsonian Open Access"),
    }

    sources.push(Arc::new(PublicDomainReviewSource::new()));
    sources
}

/// Fetch a required string field from a raw record.
pub(crate) fn required_str<'a>(
    record: &'a Value,
    field: &'static str,
) -> Result<&'a str, MapError> {
    record
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or(MapError::MissingField(field))
}

/// Fetch an optional string field, treating blank values as absent.
pub(crate) fn optional_str(record: &Value, field: &str) -> Option<String> {
    record
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
