//! Feature-level insight aggregations
//!
//! Distributions, histograms, and the two feature-by-program-type heatmaps.
//! All inputs are the latest primitive analysis per repo; repos without one
//! are skipped.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::types::{CountMap, RepoOverview};

/// Complexity histogram bucket labels, by total program count.
pub const COMPLEXITY_BUCKETS: [&str; 9] =
    ["0", "1", "2", "3", "4-5", "6-8", "9-13", "14-21", "22+"];

/// Total map-type usage across the catalog.
pub fn map_type_distribution(repos: &[RepoOverview]) -> CountMap {
    sum_maps(repos, |p| &p.map_types)
}

/// Total attach-point usage across the catalog.
pub fn attach_point_frequency(repos: &[RepoOverview]) -> CountMap {
    sum_maps(repos, |p| &p.attach_types)
}

/// Number of repos using each inferred program type.
///
/// Counts repos, not occurrences: a repo with forty kprobe programs still
/// contributes one to `kprobe`.
pub fn program_type_repo_counts(repos: &[RepoOverview]) -> CountMap {
    let mut out = CountMap::new();
    for prim in primitives(repos) {
        for key in prim.program_types_inferred.keys() {
            *out.entry(key.clone()).or_insert(0) += 1;
        }
    }
    out
}

/// The `n` most-used helper functions, by total occurrence count descending
/// (ties broken by name).
pub fn top_helpers(repos: &[RepoOverview], n: usize) -> Vec<(String, i64)> {
    let totals = sum_maps(repos, |p| &p.helpers);
    let mut ranked: Vec<(String, i64)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked
}

/// Repo counts per complexity bucket, keyed by total program count.
///
/// Only repos with a primitive analysis are bucketed.
pub fn complexity_histogram(repos: &[RepoOverview]) -> [i64; 9] {
    let mut buckets = [0i64; 9];
    for prim in primitives(repos) {
        buckets[bucket_index(prim.total_programs)] += 1;
    }
    buckets
}

fn bucket_index(programs: i64) -> usize {
    match programs {
        0..=3 => programs as usize,
        4..=5 => 4,
        6..=8 => 5,
        9..=13 => 6,
        14..=21 => 7,
        _ => 8,
    }
}

/// Helper-by-program-type co-occurrence heatmap.
///
/// Rows are the top helpers; columns are every inferred program type in the
/// catalog. A repo credits its full helper count to each program type it
/// contains.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HelperHeatmap {
    pub helpers: Vec<String>,
    pub program_types: Vec<String>,
    /// cells[helper_idx][program_type_idx]
    pub cells: Vec<Vec<i64>>,
}

pub fn helper_program_heatmap(repos: &[RepoOverview], top_n: usize) -> HelperHeatmap {
    let helpers: Vec<String> = top_helpers(repos, top_n)
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    let program_types = collect_program_types(repos);

    let mut cells = vec![vec![0i64; program_types.len()]; helpers.len()];
    for prim in primitives(repos) {
        for (hi, helper) in helpers.iter().enumerate() {
            let Some(&count) = prim.helpers.get(helper) else {
                continue;
            };
            for key in prim.program_types_inferred.keys() {
                if let Some(pi) = program_types.iter().position(|p| p == key) {
                    cells[hi][pi] += count;
                }
            }
        }
    }

    HelperHeatmap {
        helpers,
        program_types,
        cells,
    }
}

/// Attach-point-by-program-type heatmap.
///
/// Rows are the top attach points; attach counts are spread over the repo's
/// program types in proportion to each type's share of the repo's programs.
/// Repos with attach points but no inferred program types land in an
/// `Unknown` column.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachHeatmap {
    pub attach_points: Vec<String>,
    pub program_types: Vec<String>,
    /// cells[attach_idx][program_type_idx], fractional weights
    pub cells: Vec<Vec<f64>>,
}

pub fn attach_program_heatmap(repos: &[RepoOverview], top_n: usize) -> AttachHeatmap {
    let ranked = {
        let totals = attach_point_frequency(repos);
        let mut ranked: Vec<(String, i64)> = totals.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(top_n);
        ranked
    };
    let attach_points: Vec<String> = ranked.into_iter().map(|(name, _)| name).collect();

    let needs_unknown = primitives(repos)
        .any(|p| !p.attach_types.is_empty() && p.program_types_inferred.is_empty());
    let mut program_types = collect_program_types(repos);
    if needs_unknown {
        program_types.push("Unknown".to_string());
    }

    let mut cells = vec![vec![0f64; program_types.len()]; attach_points.len()];
    for prim in primitives(repos) {
        let total_programs: i64 = prim.program_types_inferred.values().sum();
        for (ai, attach) in attach_points.iter().enumerate() {
            let Some(&count) = prim.attach_types.get(attach) else {
                continue;
            };
            if total_programs > 0 {
                for (key, &type_count) in &prim.program_types_inferred {
                    if let Some(pi) = program_types.iter().position(|p| p == key) {
                        cells[ai][pi] += count as f64 * type_count as f64 / total_programs as f64;
                    }
                }
            } else if let Some(pi) = program_types.iter().position(|p| p == "Unknown") {
                cells[ai][pi] += count as f64;
            }
        }
    }

    AttachHeatmap {
        attach_points,
        program_types,
        cells,
    }
}

fn primitives(
    repos: &[RepoOverview],
) -> impl Iterator<Item = &crate::types::PrimitiveSummary> {
    repos.iter().filter_map(|r| r.latest_primitive.as_ref())
}

fn sum_maps<'a>(
    repos: &'a [RepoOverview],
    select: fn(&'a crate::types::PrimitiveSummary) -> &'a CountMap,
) -> CountMap {
    let mut out = CountMap::new();
    for prim in primitives(repos) {
        for (key, count) in select(prim) {
            *out.entry(key.clone()).or_insert(0) += count;
        }
    }
    out
}

fn collect_program_types(repos: &[RepoOverview]) -> Vec<String> {
    let set: BTreeSet<String> = primitives(repos)
        .flat_map(|p| p.program_types_inferred.keys().cloned())
        .collect();
    set.into_iter().collect()
}
