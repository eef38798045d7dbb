//! Tapestry Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging, and error handling for the Tapestry workspace.
//!
//! # Overview
//!
//! This crate provides functionality used across all Tapestry members:
//!
//! - **Error Handling**: the workspace-wide error and result types
//! - **Logging**: tracing initialization driven by environment variables
//! - **Types**: the normalized record model shared by the ingestion
//!   pipeline and the trigger server

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, TapestryError};
pub use types::{NormalizedFile, NormalizedItem, RefIds};
