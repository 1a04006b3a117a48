//! bpfcat-insights - catalog insight reports
//!
//! Prints category and eBPF-feature aggregates over the catalog. Category
//! filters are remembered across runs; selections that no longer match the
//! catalog are silently dropped.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use bpfcat_core::analytics::{
    attach_program_heatmap, category_aggregates, category_timeline, complexity_histogram,
    top_helpers, CategoryAggregate, TimelinePoint, COMPLEXITY_BUCKETS,
};
use bpfcat_core::prefs::{reconcile_selection, PrefsStore};
use bpfcat_core::types::{CatalogSummary, Category, RepoOverview};
use bpfcat_core::{Config, Database};

const PREFS_KEY: &str = "insights";

#[derive(Parser, Debug)]
#[command(name = "bpfcat-insights")]
#[command(about = "Insight reports over the bpfcat repository catalog")]
#[command(version)]
struct Args {
    /// Category filter (repeatable); remembered across runs
    #[arg(long = "category")]
    categories: Vec<String>,

    /// Case-insensitive search across name, description, and URL
    #[arg(long)]
    search: Option<String>,

    /// Number of top helpers to show
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// Emit JSON instead of the terminal report
    #[arg(long)]
    json: bool,

    /// Forget the saved category selection
    #[arg(long)]
    reset: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InsightsReport {
    summary: CatalogSummary,
    categories: Vec<CategoryAggregate>,
    timeline: Vec<TimelinePoint>,
    complexity: Vec<(String, i64)>,
    top_helpers: Vec<(String, i64)>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard = bpfcat_core::logging::init(&config.logging).ok();

    let db_path = config.resolved_database_path();
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    let prefs = PrefsStore::open_default();
    let selection = resolve_selection(&args, &db, &prefs)?;
    let categories = parse_categories(&selection)?;

    let repos = load_repos(&db, args.search.as_deref(), &categories)?;
    let summary = db.catalog_summary().context("failed to read summary")?;

    let report = InsightsReport {
        summary,
        categories: category_aggregates(&repos),
        timeline: category_timeline(&repos),
        complexity: COMPLEXITY_BUCKETS
            .iter()
            .zip(complexity_histogram(&repos))
            .map(|(label, count)| (label.to_string(), count))
            .collect(),
        top_helpers: top_helpers(&repos, args.top),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, &repos, &selection);
    }

    Ok(())
}

/// Resolve the active category selection: CLI flags win, otherwise the
/// saved selection, reconciled against what the catalog actually has.
fn resolve_selection(args: &Args, db: &Database, prefs: &PrefsStore) -> Result<Vec<String>> {
    if args.reset {
        prefs.save(PREFS_KEY, &Vec::<String>::new())?;
        return Ok(Vec::new());
    }

    let requested = if args.categories.is_empty() {
        prefs.load::<Vec<String>>(PREFS_KEY).unwrap_or_default()
    } else {
        args.categories.clone()
    };

    let available: Vec<String> = db
        .categories_in_catalog()
        .context("failed to list categories")?
        .iter()
        .map(|c| c.as_str().to_string())
        .collect();
    let selection = reconcile_selection(&requested, &available);

    prefs.save(PREFS_KEY, &selection)?;
    Ok(selection)
}

fn parse_categories(selection: &[String]) -> Result<Vec<Category>> {
    selection
        .iter()
        .map(|s| s.parse::<Category>().map_err(anyhow::Error::msg))
        .collect()
}

fn load_repos(
    db: &Database,
    search: Option<&str>,
    categories: &[Category],
) -> Result<Vec<RepoOverview>> {
    let mut repos = db
        .repo_overviews(search, None)
        .context("failed to load repos")?;
    if !categories.is_empty() {
        repos.retain(|r| categories.contains(&r.category));
    }
    Ok(repos)
}

fn print_report(report: &InsightsReport, repos: &[RepoOverview], selection: &[String]) {
    println!();
    println!("bpfcat catalog insights");
    println!("{}", "=".repeat(60));
    println!(
        "  {} repos tracked, {} analyzed, {} with primitive analysis",
        report.summary.total_repos, report.summary.analyzed, report.summary.primitive_analyzed
    );
    if !selection.is_empty() {
        println!("  filter: {}", selection.join(", "));
    }
    println!();

    if repos.is_empty() {
        println!("  No repos match the current filter.");
        println!();
        return;
    }

    println!("CATEGORIES");
    println!(
        "  {:<40} {:>6} {:>7} {:>9}",
        "category", "repos", "share", "stars"
    );
    for agg in &report.categories {
        println!(
            "  {:<40} {:>6} {:>6.2}% {:>9}",
            agg.category.display_name(),
            agg.repo_count,
            agg.percentage,
            agg.total_stars
        );
    }
    println!();

    if !report.timeline.is_empty() {
        println!("GROWTH (cumulative repos by upstream creation year)");
        for point in &report.timeline {
            println!("  {:<6} {}", point.year, point.total);
        }
        println!();
    }

    println!("COMPLEXITY (programs per repo)");
    for (label, count) in &report.complexity {
        println!("  {:<6} {}", label, count);
    }
    println!();

    if !report.top_helpers.is_empty() {
        println!("TOP HELPERS");
        for (name, count) in &report.top_helpers {
            println!("  {:<32} {}", name, count);
        }
        println!();
    }

    let heatmap = attach_program_heatmap(repos, 8);
    if !heatmap.attach_points.is_empty() && !heatmap.program_types.is_empty() {
        println!("ATTACH POINTS x PROGRAM TYPES");
        println!("  {:<24} {}", "", heatmap.program_types.join("  "));
        for (i, attach) in heatmap.attach_points.iter().enumerate() {
            let row: Vec<String> = heatmap.cells[i].iter().map(|v| format!("{:.1}", v)).collect();
            println!("  {:<24} {}", attach, row.join("  "));
        }
        println!();
    }
}
