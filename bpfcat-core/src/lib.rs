//! # bpfcat-core
//!
//! Core library for bpfcat - a catalog and analytics service for
//! eBPF-related GitHub repositories.
//!
//! This library provides:
//! - Domain types for repositories and their analysis snapshots
//! - Database storage layer with SQLite
//! - HTTP clients for the external analyzer services
//! - Pure aggregation routines behind the insight views
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! The catalog holds one row per repository plus immutable, timestamped
//! snapshots produced by each analyzer run:
//! - **Analysis:** GitHub metadata (stars, forks, commits, ...)
//! - **PrimitiveAnalysis:** eBPF feature counts (helpers, maps, attach
//!   points, program types)
//! - **OverheadTest:** baseline vs. instrumented benchmark results
//!
//! ## Example
//!
//! ```rust,no_run
//! use bpfcat_core::{Config, Database};
//!
//! // Load configuration
//! let config = Config::load().expect("failed to load config");
//!
//! // Open database
//! let db = Database::open(&config.resolved_database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//! ```

// Re-export commonly used items at the crate root
pub use analyzer::{AnalyzerClient, MetadataReport, PrimitiveReport};
pub use config::Config;
pub use db::{Database, RepoQuery, SortField, SortOrder};
pub use error::{Error, Result};
pub use types::*;

// Public modules
pub mod analytics;
pub mod analyzer;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod prefs;
pub mod types;
