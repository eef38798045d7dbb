//! Tapestry Ingest Library
//!
//! The ingestion core: one uniform pipeline over many heterogeneous
//! providers of publicly-licensed creative works.
//!
//! # Architecture
//!
//! - **config**: environment-driven ingestion configuration
//! - **proxy**: round-robin proxy rotation
//! - **throttle**: per-pipeline minimum inter-request delay
//! - **fetch**: HTTP transport with timeout + proxy support
//! - **page**: pagination cursors and request/page shapes
//! - **source**: the per-provider contract (pagination + pure mapping)
//!   and its implementations
//! - **store**: reference resolution and the atomic item+files upsert
//! - **pipeline**: the per-source ingestion state machine
//! - **orchestrator**: sequential multi-source runs and the run report
//!
//! # Example
//!
//! ```no_run
//! use tapestry_ingest::{config::IngestConfig, orchestrator::Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let pool = config.database.create_pool().await?;
//!     let orchestrator = Orchestrator::from_config(pool, &config)?;
//!     let report = orchestrator.run_all().await;
//!     report.log_summary();
//!     orchestrator.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod fetch;
pub mod orchestrator;
pub mod page;
pub mod pipeline;
pub mod proxy;
pub mod source;
pub mod store;
pub mod throttle;

pub use fetch::{Fetcher, TransportError};
pub use orchestrator::{Orchestrator, RunReport};
pub use page::{PageCursor, PageRequest, SourcePage};
pub use pipeline::{IngestionPipeline, RunOutcome, RunSummary};
pub use proxy::{ProxyEndpoint, ProxyRotator};
pub use source::{IngestSource, MapError, MappedRecord, RunParams};
pub use store::{ItemStore, PgItemStore, StoreError};
pub use throttle::RequestPacer;
