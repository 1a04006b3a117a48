//! Core domain types for bpfcat
//!
//! These types represent the canonical catalog model shared by the storage
//! layer, the REST API, and the analytics routines.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Repo** | A cataloged GitHub repository tracked by this system |
//! | **Category** | A fixed classification label, with an explicit `Uncategorized` variant |
//! | **Analysis** | A timestamped snapshot of GitHub repository metadata |
//! | **PrimitiveAnalysis** | A timestamped snapshot of eBPF static-analysis counts |
//! | **OverheadTest** | A timestamped benchmark comparing baseline vs. instrumented runs |
//!
//! Every snapshot kind is immutable once created and many-to-one with its
//! repo; the "latest" snapshot is the one with the maximum timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Frequency map produced by the analyzers: feature name -> occurrence count.
///
/// BTreeMap keeps serialization order stable across runs.
pub type CountMap = BTreeMap<String, i64>;

// ============================================
// Category
// ============================================

/// Repository classification.
///
/// A closed set: the ten labels assigned by the original taxonomy plus an
/// explicit `Uncategorized` variant. `Uncategorized` is stored as SQL NULL
/// and rendered as the wire string `"UNCATEGORIZED"`; there is no
/// `Option<Category>` anywhere in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    CloudNativeNetworking,
    DefensiveSecurity,
    DeveloperToolingFrameworks,
    EducationalDemonstrationResources,
    KernelDataplaneNetworking,
    Observability,
    OffensiveSecurity,
    OperationsOrchestrationLifecycle,
    PlatformRuntimeAcceleration,
    RuntimeSecurity,
    Uncategorized,
}

impl Category {
    /// All variants, in taxonomy order.
    pub const ALL: [Category; 11] = [
        Category::CloudNativeNetworking,
        Category::DefensiveSecurity,
        Category::DeveloperToolingFrameworks,
        Category::EducationalDemonstrationResources,
        Category::KernelDataplaneNetworking,
        Category::Observability,
        Category::OffensiveSecurity,
        Category::OperationsOrchestrationLifecycle,
        Category::PlatformRuntimeAcceleration,
        Category::RuntimeSecurity,
        Category::Uncategorized,
    ];

    /// Returns the identifier used on the wire and in query parameters
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::CloudNativeNetworking => "CLOUD_NATIVE_NETWORKING",
            Category::DefensiveSecurity => "DEFENSIVE_SECURITY",
            Category::DeveloperToolingFrameworks => "DEVELOPER_TOOLING_FRAMEWORKS",
            Category::EducationalDemonstrationResources => "EDUCATIONAL_DEMONSTRATION_RESOURCES",
            Category::KernelDataplaneNetworking => "KERNEL_DATAPLANE_NETWORKING",
            Category::Observability => "OBSERVABILITY",
            Category::OffensiveSecurity => "OFFENSIVE_SECURITY",
            Category::OperationsOrchestrationLifecycle => "OPERATIONS_ORCHESTRATION_LIFECYCLE",
            Category::PlatformRuntimeAcceleration => "PLATFORM_RUNTIME_ACCELERATION",
            Category::RuntimeSecurity => "RUNTIME_SECURITY",
            Category::Uncategorized => "UNCATEGORIZED",
        }
    }

    /// Returns a human-friendly display label
    pub fn display_name(&self) -> String {
        if *self == Category::Uncategorized {
            return "Uncategorized".to_string();
        }
        self.as_str().replace('_', " ")
    }

    /// Maps a nullable database column to a category.
    ///
    /// NULL means uncategorized; an unrecognized stored label also falls
    /// back to `Uncategorized` rather than failing the whole row.
    pub fn from_db(value: Option<&str>) -> Category {
        match value {
            None => Category::Uncategorized,
            Some(s) => s.parse().unwrap_or(Category::Uncategorized),
        }
    }

    /// Maps a category to its nullable database representation
    pub fn to_db(&self) -> Option<&'static str> {
        match self {
            Category::Uncategorized => None,
            other => Some(other.as_str()),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .find(|c| c.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown category: {}", s))
    }
}

// ============================================
// Repo
// ============================================

/// A cataloged GitHub repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repo {
    /// Catalog identifier
    pub id: i64,
    /// Repository URL (unique across the catalog)
    pub url: String,
    /// Display name, derived from the URL when not supplied
    pub name: String,
    /// Classification label
    pub category: Category,
    /// Short description (deferred to the analyzer on create)
    pub description: Option<String>,
    /// Classification rationale from the taxonomy review
    pub rationale: Option<String>,
    /// Suggested new class when no existing category fit
    pub suggested_new_class: Option<String>,
    /// When this repo was added to the catalog
    pub created_at: DateTime<Utc>,
}

// ============================================
// Snapshot rows
// ============================================

/// GitHub metadata snapshot from one metadata-analyzer run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub id: i64,
    pub repo_id: i64,
    pub stars: Option<i64>,
    pub forks: Option<i64>,
    pub watchers: Option<i64>,
    pub issues: Option<i64>,
    pub commits: Option<i64>,
    pub language: Option<String>,
    pub clone_url: Option<String>,
    pub default_branch: Option<String>,
    pub readme_text: Option<String>,
    pub repo_created_at: Option<DateTime<Utc>>,
    pub repo_updated_at: Option<DateTime<Utc>>,
    pub analyzed_at: DateTime<Utc>,
}

/// eBPF feature snapshot from one primitive-analyzer run.
///
/// Totals are derived at ingest time: occurrence totals are sums over the
/// corresponding frequency map, `total_program_types` is the unique key
/// count of `program_types_inferred`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimitiveAnalysis {
    pub id: i64,
    pub repo_id: i64,
    pub total_helpers: i64,
    pub total_maps: i64,
    pub total_programs: i64,
    pub total_program_types: i64,
    pub total_attach_points: i64,
    pub helpers: CountMap,
    pub map_types: CountMap,
    pub attach_types: CountMap,
    pub program_sections: CountMap,
    pub program_types_inferred: CountMap,
    pub program_type_tokens: CountMap,
    pub analyzed_at: DateTime<Utc>,
}

/// Performance benchmark snapshot: baseline vs. instrumented run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverheadTest {
    pub id: i64,
    pub repo_id: i64,
    pub runs: Option<i64>,
    pub warmup_runs: Option<i64>,
    pub duration_ms: Option<i64>,
    pub baseline_cpu_pct: Option<f64>,
    pub instrumented_cpu_pct: Option<f64>,
    pub baseline_latency_ms: Option<f64>,
    pub instrumented_latency_ms: Option<f64>,
    pub baseline_throughput: Option<f64>,
    pub instrumented_throughput: Option<f64>,
    pub tested_at: DateTime<Utc>,
}

// ============================================
// Listing projections
// ============================================

/// Latest-analysis fields flattened onto a listing row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub stars: Option<i64>,
    pub forks: Option<i64>,
    pub watchers: Option<i64>,
    pub issues: Option<i64>,
    pub commits: Option<i64>,
    pub language: Option<String>,
    pub repo_created_at: Option<DateTime<Utc>>,
    pub analyzed_at: DateTime<Utc>,
}

/// Latest-primitive fields flattened onto a listing row.
///
/// Carries the frequency maps the insight aggregations need, not just the
/// totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimitiveSummary {
    pub total_helpers: i64,
    pub total_maps: i64,
    pub total_programs: i64,
    pub total_program_types: i64,
    pub total_attach_points: i64,
    pub helpers: CountMap,
    pub map_types: CountMap,
    pub attach_types: CountMap,
    pub program_types_inferred: CountMap,
    pub analyzed_at: DateTime<Utc>,
}

/// One row of the repo listing: catalog columns plus the latest snapshot of
/// each analyzer kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoOverview {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub category: Category,
    pub rationale: Option<String>,
    pub suggested_new_class: Option<String>,
    pub created_at: DateTime<Utc>,
    pub latest_analysis: Option<AnalysisSummary>,
    pub latest_primitive: Option<PrimitiveSummary>,
}

/// Catalog-wide counts attached to every listing response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSummary {
    pub total_repos: i64,
    pub categorized: i64,
    pub uncategorized: i64,
    pub analyzed: i64,
    pub primitive_analyzed: i64,
}

/// Page metadata for the listing response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total_items: i64,
    pub total_pages: u32,
}

/// Full listing response: page of rows, catalog summary, page metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoPage {
    pub data: Vec<RepoOverview>,
    pub summary: CatalogSummary,
    pub pagination: Pagination,
}

/// Repo detail: catalog columns plus the full snapshot history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoDetail {
    #[serde(flatten)]
    pub repo: Repo,
    pub analysis: Vec<Analysis>,
    pub primitives: Vec<PrimitiveAnalysis>,
    pub tests: Vec<OverheadTest>,
}

// ============================================
// URL helpers
// ============================================

/// Derives a repo name from its URL: the last non-empty path segment, with
/// a trailing `.git` stripped (case-insensitive). Falls back to the input
/// when the URL has no path segments at all.
pub fn derive_repo_name(url: &str) -> String {
    let cleaned = url.trim();
    let without_git = if cleaned.to_ascii_lowercase().ends_with(".git") {
        &cleaned[..cleaned.len() - 4]
    } else {
        cleaned
    };
    without_git
        .split('/')
        .filter(|s| !s.is_empty())
        .next_back()
        .unwrap_or(cleaned)
        .to_string()
}

/// Normalizes a bulk-import entry to a full HTTPS GitHub URL.
///
/// Entries that already carry a scheme (or are protocol-relative) pass
/// through unchanged; `owner/repo` shorthand is prefixed with
/// `https://github.com/`.
pub fn normalize_repo_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") || trimmed.starts_with("//") {
        trimmed.to_string()
    } else {
        format!("https://github.com/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip() {
        for cat in Category::ALL {
            assert_eq!(cat.as_str().parse::<Category>().unwrap(), cat);
        }
    }

    #[test]
    fn test_category_db_mapping() {
        assert_eq!(Category::Uncategorized.to_db(), None);
        assert_eq!(
            Category::Observability.to_db(),
            Some("OBSERVABILITY")
        );
        assert_eq!(Category::from_db(None), Category::Uncategorized);
        assert_eq!(
            Category::from_db(Some("RUNTIME_SECURITY")),
            Category::RuntimeSecurity
        );
        // Unknown stored label degrades instead of failing the row
        assert_eq!(Category::from_db(Some("bogus")), Category::Uncategorized);
    }

    #[test]
    fn test_category_serde_wire_format() {
        let json = serde_json::to_string(&Category::CloudNativeNetworking).unwrap();
        assert_eq!(json, "\"CLOUD_NATIVE_NETWORKING\"");
        let json = serde_json::to_string(&Category::Uncategorized).unwrap();
        assert_eq!(json, "\"UNCATEGORIZED\"");
    }

    #[test]
    fn test_derive_repo_name() {
        assert_eq!(derive_repo_name("https://github.com/cilium/ebpf"), "ebpf");
        assert_eq!(
            derive_repo_name("https://github.com/cilium/ebpf.git"),
            "ebpf"
        );
        assert_eq!(
            derive_repo_name("https://github.com/cilium/ebpf.GIT"),
            "ebpf"
        );
        // Trailing slash leaves an empty segment that must be skipped
        assert_eq!(derive_repo_name("https://github.com/cilium/ebpf/"), "ebpf");
        assert_eq!(derive_repo_name("  https://github.com/a/b  "), "b");
    }

    #[test]
    fn test_normalize_repo_url() {
        assert_eq!(
            normalize_repo_url("cilium/ebpf"),
            "https://github.com/cilium/ebpf"
        );
        assert_eq!(
            normalize_repo_url("https://github.com/cilium/ebpf"),
            "https://github.com/cilium/ebpf"
        );
        assert_eq!(
            normalize_repo_url("  iovisor/bcc  "),
            "https://github.com/iovisor/bcc"
        );
    }

    #[test]
    fn test_display_name() {
        assert_eq!(
            Category::CloudNativeNetworking.display_name(),
            "CLOUD NATIVE NETWORKING"
        );
        assert_eq!(Category::Uncategorized.display_name(), "Uncategorized");
    }
}
