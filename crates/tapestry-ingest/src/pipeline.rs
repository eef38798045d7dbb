//! The per-source ingestion pipeline
//!
//! Drives one source end to end: pace, fetch (optionally through a
//! rotated proxy), parse the page, then map and persist each record with
//! per-record error isolation. Owns the continuation state machine.
//!
//! Termination rules, in order of evaluation per page:
//! - a transport failure or an uninterpretable page envelope ends the run
//!   early with a warning,
//! - an empty record list ends the run,
//! - an absent next cursor ends the run,
//! - a next cursor equal to the one just fetched ends the run (guards
//!   against providers that echo the final cursor forever).
//!
//! Only a missing reference row (or a dead database connection) is fatal
//! beyond the current record.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::fetch::Fetcher;
use crate::page::PageCursor;
use crate::source::{IngestSource, RunParams};
use crate::store::{ItemStore, StoreError};
use crate::throttle::RequestPacer;

/// Cap on error messages carried in a summary; skips beyond the cap are
/// still counted.
pub const MAX_REPORTED_ERRORS: usize = 10;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The source was drained to its last page.
    Completed,
    /// A transport error or unreadable page ended the run early.
    FetchAborted,
    /// The database connection became unusable mid-run.
    StoreHalted,
}

/// Terminal summary of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub source: String,
    pub outcome: RunOutcome,
    pub pages_fetched: u32,
    pub records_seen: u64,
    pub records_persisted: u64,
    pub records_skipped: u64,
    /// First `MAX_REPORTED_ERRORS` failure messages, each attributed to a
    /// record or page.
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    fn new(source: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            source: source.to_string(),
            outcome: RunOutcome::Completed,
            pages_fetched: 0,
            records_seen: 0,
            records_persisted: 0,
            records_skipped: 0,
            errors: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn push_error(&mut self, message: String) {
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(message);
        }
    }

    fn skip_record(&mut self, label: &str, reason: &dyn std::fmt::Display) {
        self.records_skipped += 1;
        self.push_error(format!("{}: {}", label, reason));
    }

    fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

/// Identify a record in logs by whatever id-ish field it carries.
fn record_label(raw: &Value, ordinal: u64) -> String {
    for field in ["id", "identifier", "title"] {
        if let Some(value) = raw.get(field).and_then(Value::as_str) {
            return format!("record {}={}", field, value);
        }
    }
    format!("record #{}", ordinal)
}

/// One source's ingestion run.
pub struct IngestionPipeline {
    source: Arc<dyn IngestSource>,
    store: Arc<dyn ItemStore>,
    fetcher: Fetcher,
    pacer: RequestPacer,
}

impl IngestionPipeline {
    pub fn new(
        source: Arc<dyn IngestSource>,
        store: Arc<dyn ItemStore>,
        fetcher: Fetcher,
        pacer: RequestPacer,
    ) -> Self {
        Self {
            source,
            store,
            fetcher,
            pacer,
        }
    }

    /// Run the source to completion.
    ///
    /// Returns `Err` only for source-fatal reference resolution failures;
    /// everything else is absorbed into the summary.
    pub async fn run(&self, params: &RunParams) -> Result<RunSummary, StoreError> {
        let name = self.source.name().to_string();
        let mut summary = RunSummary::new(&name);
        info!(source = %name, run_id = %summary.run_id, "starting ingestion run");

        let refs = self
            .store
            .resolve_references(
                self.source.name(),
                self.source.media_type(),
                self.source.license(),
            )
            .await?;

        let mut cursor = PageCursor::Start;
        'pages: loop {
            self.pacer.acquire().await;
            let request = self.source.request_for(&cursor, params);
            debug!(source = %name, url = %request.url, "fetching page");

            let body = match self.fetcher.fetch(&request).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(source = %name, url = %request.url, error = %e, "transport error, ending run early");
                    summary.push_error(format!("fetch {}: {}", request.url, e));
                    summary.outcome = RunOutcome::FetchAborted;
                    break;
                },
            };
            summary.pages_fetched += 1;

            let page = match self.source.parse_page(&body) {
                Ok(page) => page,
                Err(e) => {
                    warn!(source = %name, url = %request.url, error = %e, "unreadable page, ending run early");
                    summary.push_error(format!("parse {}: {}", request.url, e));
                    summary.outcome = RunOutcome::FetchAborted;
                    break;
                },
            };

            if page.records.is_empty() {
                debug!(source = %name, "empty page, run complete");
                break;
            }

            for raw in &page.records {
                summary.records_seen += 1;
                let label = record_label(raw, summary.records_seen);

                let mapped = match self.source.map_record(raw) {
                    Ok(mapped) => mapped,
                    Err(e) => {
                        warn!(source = %name, record = %label, error = %e, "skipping unmappable record");
                        summary.skip_record(&label, &e);
                        continue;
                    },
                };

                match self
                    .store
                    .save_item(&refs, &mapped.item, &mapped.files)
                    .await
                {
                    Ok(_) => summary.records_persisted += 1,
                    Err(e) if e.is_connection_fatal() => {
                        error!(source = %name, record = %label, error = %e, "database connection unusable, halting run");
                        summary.skip_record(&label, &e);
                        summary.outcome = RunOutcome::StoreHalted;
                        break 'pages;
                    },
                    Err(e) => {
                        warn!(source = %name, record = %label, error = %e, "failed to persist record");
                        summary.skip_record(&label, &e);
                    },
                }
            }

            match page.next {
                None => break,
                Some(next) if next == cursor => {
                    warn!(source = %name, cursor = %next, "cursor unchanged, ending run to avoid a loop");
                    break;
                },
                Some(next) => cursor = next,
            }
        }

        summary.finish();
        info!(
            source = %name,
            run_id = %summary.run_id,
            outcome = ?summary.outcome,
            pages = summary.pages_fetched,
            seen = summary.records_seen,
            persisted = summary.records_persisted,
            skipped = summary.records_skipped,
            "ingestion run finished"
        );
        Ok(summary)
    }
}
