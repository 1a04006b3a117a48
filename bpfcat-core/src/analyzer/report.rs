//! Analyzer response payloads
//!
//! The metadata analyzer speaks camelCase JSON; the primitive analyzer
//! speaks snake_case with frequency maps. Every field is optional or
//! defaulted so a partial analyzer response still persists what it has.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::types::CountMap;

/// Response from the GitHub metadata analyzer
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetadataReport {
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
    pub analyzed_at: Option<DateTime<Utc>>,
}

/// Section-name frequencies reported by the primitive analyzer
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProgramSections {
    pub sec_full: CountMap,
}

/// Response from the eBPF primitive analyzer
///
/// Frequency maps keyed by feature name (helper function, map type,
/// attach type, inferred program type).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PrimitiveReport {
    pub helpers: CountMap,
    pub map_types: CountMap,
    pub attach_types: CountMap,
    pub program_sections: ProgramSections,
    pub program_types_inferred: CountMap,
    pub program_types_tokens: CountMap,
}

/// Totals derived from a primitive report's frequency maps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveTotals {
    pub helpers: i64,
    pub maps: i64,
    pub programs: i64,
    pub program_types: i64,
    pub attach_points: i64,
}

impl PrimitiveReport {
    /// Derive the stored totals: sums over the frequency maps, plus the
    /// number of distinct inferred program types.
    pub fn totals(&self) -> PrimitiveTotals {
        PrimitiveTotals {
            helpers: sum_counts(&self.helpers),
            maps: sum_counts(&self.map_types),
            programs: sum_counts(&self.program_types_inferred),
            program_types: self.program_types_inferred.len() as i64,
            attach_points: sum_counts(&self.attach_types),
        }
    }
}

fn sum_counts(map: &CountMap) -> i64 {
    map.values().sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_report_parses_camel_case() {
        let json = r#"{
            "stars": 1200,
            "forks": 80,
            "language": "C",
            "cloneUrl": "https://github.com/iovisor/bcc.git",
            "defaultBranch": "master",
            "repoCreatedAt": "2015-04-28T10:00:00Z",
            "analyzedAt": "2026-01-05T12:00:00Z"
        }"#;
        let report: MetadataReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.stars, Some(1200));
        assert_eq!(report.clone_url.as_deref(), Some("https://github.com/iovisor/bcc.git"));
        assert_eq!(report.default_branch.as_deref(), Some("master"));
        assert!(report.repo_created_at.is_some());
        assert!(report.watchers.is_none());
    }

    #[test]
    fn test_primitive_report_parses_snake_case_maps() {
        let json = r#"{
            "helpers": {"bpf_map_lookup_elem": 7, "bpf_probe_read": 2},
            "map_types": {"BPF_MAP_TYPE_HASH": 3},
            "attach_types": {"kprobe": 4, "xdp": 1},
            "program_sections": {"sec_full": {"kprobe/tcp_connect": 2}},
            "program_types_inferred": {"kprobe": 4, "xdp": 1}
        }"#;
        let report: PrimitiveReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.helpers.get("bpf_map_lookup_elem"), Some(&7));
        assert_eq!(report.program_sections.sec_full.len(), 1);
        // Missing maps default to empty
        assert!(report.program_types_tokens.is_empty());
    }

    #[test]
    fn test_totals() {
        let json = r#"{
            "helpers": {"bpf_map_lookup_elem": 7, "bpf_probe_read": 2},
            "map_types": {"BPF_MAP_TYPE_HASH": 3},
            "attach_types": {"kprobe": 4, "xdp": 1},
            "program_types_inferred": {"kprobe": 4, "xdp": 1}
        }"#;
        let report: PrimitiveReport = serde_json::from_str(json).unwrap();
        let totals = report.totals();
        assert_eq!(totals.helpers, 9);
        assert_eq!(totals.maps, 3);
        assert_eq!(totals.attach_points, 5);
        assert_eq!(totals.programs, 5);
        assert_eq!(totals.program_types, 2);
    }

    #[test]
    fn test_empty_report_totals_are_zero() {
        let report = PrimitiveReport::default();
        let totals = report.totals();
        assert_eq!(totals.helpers, 0);
        assert_eq!(totals.program_types, 0);
    }
}
