//! Catalog analytics
//!
//! Pure aggregation routines over listing rows. Everything here takes
//! `&[RepoOverview]` and returns plain data; callers fetch the rows once
//! and derive as many views as they need.
//!
//! Repos missing the relevant snapshot are skipped per aggregation rather
//! than failing it: a repo without a primitive analysis simply contributes
//! nothing to feature counts.

mod category;
mod insights;

pub use category::{category_aggregates, category_timeline, CategoryAggregate, TimelinePoint};
pub use insights::{
    attach_point_frequency, attach_program_heatmap, complexity_histogram, helper_program_heatmap,
    map_type_distribution, program_type_repo_counts, top_helpers, AttachHeatmap, HelperHeatmap,
    COMPLEXITY_BUCKETS,
};

/// Round to two decimal places, matching the wire precision of every
/// percentage and average this crate reports.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
