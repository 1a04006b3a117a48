//! Database storage layer
//!
//! SQLite-backed catalog store: one row per repository plus immutable,
//! timestamped snapshot tables for each analyzer kind.

mod catalog;
pub mod schema;

pub use catalog::{Database, NewOverheadTest, NewRepo, RepoPatch, RepoQuery, SortField, SortOrder};
