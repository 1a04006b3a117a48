//! Per-category aggregates and growth timeline

use std::collections::BTreeMap;

use chrono::Datelike;
use serde::Serialize;

use super::round2;
use crate::types::{Category, RepoOverview};

/// Aggregate statistics for one category.
///
/// Star totals come from the latest metadata analysis; feature averages
/// come from the latest primitive analysis and are computed over the
/// repos in the category that have one.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAggregate {
    pub category: Category,
    pub repo_count: i64,
    /// Share of the whole catalog, percent, two decimals
    pub percentage: f64,
    pub total_stars: i64,
    pub avg_helpers: f64,
    pub avg_maps: f64,
    pub avg_programs: f64,
    pub avg_program_types: f64,
    pub avg_attach_points: f64,
}

/// Aggregate the catalog per category, sorted by repo count descending.
///
/// Categories with no repos are omitted.
pub fn category_aggregates(repos: &[RepoOverview]) -> Vec<CategoryAggregate> {
    let total = repos.len() as f64;
    let mut out = Vec::new();

    for category in Category::ALL {
        let members: Vec<&RepoOverview> =
            repos.iter().filter(|r| r.category == category).collect();
        if members.is_empty() {
            continue;
        }

        let repo_count = members.len() as i64;
        let total_stars: i64 = members
            .iter()
            .filter_map(|r| r.latest_analysis.as_ref())
            .filter_map(|a| a.stars)
            .sum();

        let prims: Vec<_> = members
            .iter()
            .filter_map(|r| r.latest_primitive.as_ref())
            .collect();
        let prim_count = prims.len() as f64;
        let avg = |f: fn(&crate::types::PrimitiveSummary) -> i64| -> f64 {
            if prims.is_empty() {
                0.0
            } else {
                round2(prims.iter().map(|p| f(p)).sum::<i64>() as f64 / prim_count)
            }
        };

        out.push(CategoryAggregate {
            category,
            repo_count,
            percentage: round2(repo_count as f64 / total * 100.0),
            total_stars,
            avg_helpers: avg(|p| p.total_helpers),
            avg_maps: avg(|p| p.total_maps),
            avg_programs: avg(|p| p.total_programs),
            avg_program_types: avg(|p| p.total_program_types),
            avg_attach_points: avg(|p| p.total_attach_points),
        });
    }

    out.sort_by(|a, b| b.repo_count.cmp(&a.repo_count).then(a.category.cmp(&b.category)));
    out
}

/// Chart-shaped projections of the aggregates. Each returns labelled
/// series ready for a bar or pie renderer.
impl CategoryAggregate {
    /// (display label, repo count) pairs
    pub fn distribution(aggregates: &[CategoryAggregate]) -> Vec<(String, i64)> {
        aggregates
            .iter()
            .map(|a| (a.category.display_name(), a.repo_count))
            .collect()
    }

    /// (display label, percentage of catalog) pairs
    pub fn percentages(aggregates: &[CategoryAggregate]) -> Vec<(String, f64)> {
        aggregates
            .iter()
            .map(|a| (a.category.display_name(), a.percentage))
            .collect()
    }

    /// (display label, total stars) pairs, re-sorted by stars descending
    pub fn popularity(aggregates: &[CategoryAggregate]) -> Vec<(String, i64)> {
        let mut out: Vec<(String, i64)> = aggregates
            .iter()
            .map(|a| (a.category.display_name(), a.total_stars))
            .collect();
        out.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        out
    }

    /// Per-category rows of the five feature averages, in the order
    /// helpers, maps, programs, program types, attach points.
    pub fn feature_matrix(aggregates: &[CategoryAggregate]) -> Vec<(String, [f64; 5])> {
        aggregates
            .iter()
            .map(|a| {
                (
                    a.category.display_name(),
                    [
                        a.avg_helpers,
                        a.avg_maps,
                        a.avg_programs,
                        a.avg_program_types,
                        a.avg_attach_points,
                    ],
                )
            })
            .collect()
    }
}

/// One year of the cumulative growth timeline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePoint {
    pub year: i32,
    /// Cumulative repo count per category up to and including this year
    pub cumulative: BTreeMap<Category, i64>,
    pub total: i64,
}

/// Cumulative per-category repo counts by year.
///
/// Only repos with a metadata analysis participate; each is dated by the
/// upstream repository creation time, falling back to the catalog entry
/// time when the analyzer did not report one.
pub fn category_timeline(repos: &[RepoOverview]) -> Vec<TimelinePoint> {
    let mut by_year: BTreeMap<i32, BTreeMap<Category, i64>> = BTreeMap::new();

    for repo in repos {
        let Some(analysis) = &repo.latest_analysis else {
            continue;
        };
        let dated = analysis.repo_created_at.unwrap_or(repo.created_at);
        *by_year
            .entry(dated.year())
            .or_default()
            .entry(repo.category)
            .or_insert(0) += 1;
    }

    let mut running: BTreeMap<Category, i64> = BTreeMap::new();
    let mut out = Vec::with_capacity(by_year.len());
    for (year, counts) in by_year {
        for (category, count) in counts {
            *running.entry(category).or_insert(0) += count;
        }
        out.push(TimelinePoint {
            year,
            cumulative: running.clone(),
            total: running.values().sum(),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::types::{AnalysisSummary, PrimitiveSummary};

    fn overview(id: i64, category: Category) -> RepoOverview {
        RepoOverview {
            id,
            name: format!("repo{}", id),
            url: format!("https://github.com/x/repo{}", id),
            description: None,
            category,
            rationale: None,
            suggested_new_class: None,
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            latest_analysis: None,
            latest_primitive: None,
        }
    }

    fn analysis(stars: i64, created_year: Option<i32>) -> AnalysisSummary {
        AnalysisSummary {
            stars: Some(stars),
            forks: None,
            watchers: None,
            issues: None,
            commits: None,
            language: None,
            repo_created_at: created_year
                .map(|y| Utc.with_ymd_and_hms(y, 3, 15, 0, 0, 0).unwrap()),
            analyzed_at: Utc::now(),
        }
    }

    fn primitive(helpers: i64, programs: i64) -> PrimitiveSummary {
        PrimitiveSummary {
            total_helpers: helpers,
            total_maps: 0,
            total_programs: programs,
            total_program_types: 1,
            total_attach_points: 0,
            helpers: Default::default(),
            map_types: Default::default(),
            attach_types: Default::default(),
            program_types_inferred: Default::default(),
            analyzed_at: Utc::now(),
        }
    }

    #[test]
    fn test_aggregates_counts_and_percentages() {
        let mut a = overview(1, Category::Observability);
        a.latest_analysis = Some(analysis(100, None));
        let mut b = overview(2, Category::Observability);
        b.latest_analysis = Some(analysis(50, None));
        let c = overview(3, Category::RuntimeSecurity);

        let aggs = category_aggregates(&[a, b, c]);
        assert_eq!(aggs.len(), 2);
        // Largest category first
        assert_eq!(aggs[0].category, Category::Observability);
        assert_eq!(aggs[0].repo_count, 2);
        assert_eq!(aggs[0].percentage, 66.67);
        assert_eq!(aggs[0].total_stars, 150);
        assert_eq!(aggs[1].repo_count, 1);
        assert_eq!(aggs[1].percentage, 33.33);
    }

    #[test]
    fn test_averages_only_over_primitive_analyzed_repos() {
        let mut a = overview(1, Category::Observability);
        a.latest_primitive = Some(primitive(10, 4));
        let mut b = overview(2, Category::Observability);
        b.latest_primitive = Some(primitive(5, 2));
        // No primitive analysis; does not drag the averages down
        let c = overview(3, Category::Observability);

        let aggs = category_aggregates(&[a, b, c]);
        assert_eq!(aggs[0].avg_helpers, 7.5);
        assert_eq!(aggs[0].avg_programs, 3.0);
    }

    #[test]
    fn test_category_without_primitives_has_zero_averages() {
        let repos = vec![overview(1, Category::OffensiveSecurity)];
        let aggs = category_aggregates(&repos);
        assert_eq!(aggs[0].avg_helpers, 0.0);
    }

    #[test]
    fn test_empty_catalog() {
        assert!(category_aggregates(&[]).is_empty());
        assert!(category_timeline(&[]).is_empty());
    }

    #[test]
    fn test_timeline_cumulative_by_year() {
        let mut a = overview(1, Category::Observability);
        a.latest_analysis = Some(analysis(0, Some(2020)));
        let mut b = overview(2, Category::Observability);
        b.latest_analysis = Some(analysis(0, Some(2022)));
        let mut c = overview(3, Category::RuntimeSecurity);
        c.latest_analysis = Some(analysis(0, Some(2022)));
        // Never analyzed; excluded from the timeline
        let d = overview(4, Category::RuntimeSecurity);

        let timeline = category_timeline(&[a, b, c, d]);
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].year, 2020);
        assert_eq!(timeline[0].total, 1);
        assert_eq!(timeline[1].year, 2022);
        assert_eq!(timeline[1].total, 3);
        assert_eq!(
            timeline[1].cumulative.get(&Category::Observability),
            Some(&2)
        );
        assert_eq!(
            timeline[1].cumulative.get(&Category::RuntimeSecurity),
            Some(&1)
        );
    }

    #[test]
    fn test_popularity_resorted_by_stars() {
        let mut a = overview(1, Category::Observability);
        a.latest_analysis = Some(analysis(10, None));
        let mut b = overview(2, Category::RuntimeSecurity);
        b.latest_analysis = Some(analysis(900, None));
        let mut c = overview(3, Category::Observability);
        c.latest_analysis = Some(analysis(5, None));

        let aggs = category_aggregates(&[a, b, c]);
        let popularity = CategoryAggregate::popularity(&aggs);
        assert_eq!(popularity[0], ("RUNTIME SECURITY".to_string(), 900));
        assert_eq!(popularity[1], ("OBSERVABILITY".to_string(), 15));
    }

    #[test]
    fn test_timeline_falls_back_to_catalog_date() {
        let mut a = overview(1, Category::Observability);
        a.latest_analysis = Some(analysis(0, None));

        let timeline = category_timeline(&[a]);
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].year, 2024);
    }
}
