//! Multi-source orchestration
//!
//! Runs every registered source's pipeline to completion in a fixed
//! order, sequentially. One source's failure is logged and the next
//! source still runs. The orchestrator owns the shared connection pool
//! and releases it exactly once at shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{error, info, warn};
use uuid::Uuid;

use tapestry_common::TapestryError;

use crate::config::IngestConfig;
use crate::fetch::Fetcher;
use crate::pipeline::{IngestionPipeline, RunSummary};
use crate::proxy::ProxyRotator;
use crate::source::{self, IngestSource, RunParams};
use crate::store::{ItemStore, PgItemStore};
use crate::throttle::RequestPacer;

/// A source-level failure in an orchestrated run.
#[derive(Debug, Clone, Serialize)]
pub struct SourceFailure {
    pub source: String,
    pub error: String,
}

/// Aggregate report of one orchestrated run across all sources.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub summaries: Vec<RunSummary>,
    pub failures: Vec<SourceFailure>,
}

impl RunReport {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            summaries: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn total_persisted(&self) -> u64 {
        self.summaries.iter().map(|s| s.records_persisted).sum()
    }

    pub fn total_skipped(&self) -> u64 {
        self.summaries.iter().map(|s| s.records_skipped).sum()
    }

    /// Log the per-source accounting. Every failure ends up here or in a
    /// summary; nothing vanishes silently.
    pub fn log_summary(&self) {
        info!(
            run_id = %self.run_id,
            sources_completed = self.summaries.len(),
            sources_failed = self.failures.len(),
            persisted = self.total_persisted(),
            skipped = self.total_skipped(),
            "run report"
        );
        for summary in &self.summaries {
            info!(
                source = %summary.source,
                outcome = ?summary.outcome,
                pages = summary.pages_fetched,
                persisted = summary.records_persisted,
                skipped = summary.records_skipped,
                "source summary"
            );
            for message in &summary.errors {
                warn!(source = %summary.source, "  {}", message);
            }
        }
        for failure in &self.failures {
            error!(source = %failure.source, error = %failure.error, "source failed");
        }
    }
}

/// Sequences pipeline runs across the configured sources.
pub struct Orchestrator {
    pool: Option<PgPool>,
    store: Arc<dyn ItemStore>,
    sources: Vec<Arc<dyn IngestSource>>,
    rotator: Option<Arc<ProxyRotator>>,
    request_timeout: Duration,
    request_delay: Duration,
}

impl Orchestrator {
    /// Production constructor: Postgres store, registered sources, proxy
    /// rotation from configuration. The pool handed in here is closed by
    /// `shutdown`.
    pub fn from_config(pool: PgPool, config: &IngestConfig) -> tapestry_common::Result<Self> {
        let rotator = ProxyRotator::from_config(config.proxy_list.as_deref())
            .map_err(|e| TapestryError::config(e.to_string()))?;
        let rotator = (!rotator.is_empty()).then(|| Arc::new(rotator));

        Ok(Self {
            store: Arc::new(PgItemStore::new(pool.clone())),
            pool: Some(pool),
            sources: source::registry(config),
            rotator,
            request_timeout: config.request_timeout(),
            request_delay: config.request_delay(),
        })
    }

    /// Assemble from explicit parts. Used by tests and by callers that
    /// manage the pool themselves (pass `pool: None` and `shutdown`
    /// becomes a no-op).
    pub fn with_parts(
        store: Arc<dyn ItemStore>,
        sources: Vec<Arc<dyn IngestSource>>,
        request_timeout: Duration,
        request_delay: Duration,
        pool: Option<PgPool>,
    ) -> Self {
        Self {
            pool,
            store,
            sources,
            rotator: None,
            request_timeout,
            request_delay,
        }
    }

    /// Attach proxy rotation to an orchestrator built from parts.
    pub fn with_rotator(mut self, rotator: Option<Arc<ProxyRotator>>) -> Self {
        self.rotator = rotator;
        self
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    fn pipeline_for(
        &self,
        source: Arc<dyn IngestSource>,
    ) -> Result<IngestionPipeline, crate::fetch::TransportError> {
        let fetcher = Fetcher::new(self.request_timeout, self.rotator.clone())?;
        // The delay budget is per pipeline instance.
        let pacer = RequestPacer::new(self.request_delay);
        Ok(IngestionPipeline::new(
            source,
            Arc::clone(&self.store),
            fetcher,
            pacer,
        ))
    }

    /// Run every registered source, in order, to completion.
    pub async fn run_all(&self) -> RunReport {
        let mut report = RunReport::new();
        info!(run_id = %report.run_id, sources = self.sources.len(), "starting orchestrated run");

        for source in &self.sources {
            let name = source.name().to_string();
            let pipeline = match self.pipeline_for(Arc::clone(source)) {
                Ok(p) => p,
                Err(e) => {
                    error!(source = %name, error = %e, "failed to construct pipeline");
                    report.failures.push(SourceFailure {
                        source: name,
                        error: e.to_string(),
                    });
                    continue;
                },
            };

            match pipeline.run(&RunParams::default()).await {
                Ok(summary) => report.summaries.push(summary),
                Err(e) => {
                    // A missing reference row (or a resolution-time
                    // database error) fails this source only.
                    error!(source = %name, error = %e, "source run failed");
                    report.failures.push(SourceFailure {
                        source: name,
                        error: e.to_string(),
                    });
                },
            }
        }

        report.finished_at = Some(Utc::now());
        report
    }

    /// Run a single source by name (case- and separator-insensitive, so
    /// `internet-archive` matches "Internet Archive").
    pub async fn run_source(
        &self,
        name: &str,
        params: &RunParams,
    ) -> tapestry_common::Result<RunSummary> {
        let source = self
            .sources
            .iter()
            .find(|s| names_match(s.name(), name))
            .cloned()
            .ok_or_else(|| TapestryError::UnknownSource(name.to_string()))?;

        let pipeline = self
            .pipeline_for(source)
            .map_err(|e| TapestryError::Network(e.to_string()))?;
        pipeline
            .run(params)
            .await
            .map_err(|e| TapestryError::Database(e.to_string()))
    }

    /// Release the shared pool. Consumes the orchestrator, so the pool is
    /// closed at most once.
    pub async fn shutdown(self) {
        if let Some(pool) = self.pool {
            pool.close().await;
            info!("database pool closed");
        }
    }
}

fn names_match(registered: &str, requested: &str) -> bool {
    let canon = |s: &str| {
        s.chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect::<String>()
    };
    canon(registered) == canon(requested)
}
