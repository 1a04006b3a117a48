//! Clients for the external analyzer services
//!
//! Two HTTP collaborators feed the catalog: the GitHub metadata analyzer
//! and the eBPF primitive analyzer. Both are opaque services; this module
//! owns the request shapes, the response parsing, and nothing else.

mod client;
mod report;

pub use client::AnalyzerClient;
pub use report::{MetadataReport, PrimitiveReport, PrimitiveTotals, ProgramSections};
