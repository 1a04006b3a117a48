//! Catalog repository layer
//!
//! Provides query and insert operations for repos and their snapshot
//! history. All "latest snapshot" lookups go through a single
//! most-recent-child helper instead of three hand-rolled copies.

use crate::analyzer::{MetadataReport, PrimitiveReport};
use crate::error::{Error, Result};
use crate::types::*;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::cmp::Ordering;
use std::path::Path;
use std::sync::Mutex;

/// Input for creating a repo. Name is derived from the URL when omitted.
#[derive(Debug, Clone)]
pub struct NewRepo {
    pub name: Option<String>,
    pub url: String,
}

/// Patchable repo fields.
///
/// The outer `Option` distinguishes "field absent" from "set to null":
/// `Some(None)` clears a nullable column. Category needs no inner option
/// since `Uncategorized` is an explicit variant.
#[derive(Debug, Clone, Default)]
pub struct RepoPatch {
    pub category: Option<Category>,
    pub description: Option<Option<String>>,
    pub rationale: Option<Option<String>>,
    pub suggested_new_class: Option<Option<String>>,
}

/// Input for recording an overhead test run.
#[derive(Debug, Clone, Default)]
pub struct NewOverheadTest {
    pub runs: Option<i64>,
    pub warmup_runs: Option<i64>,
    pub duration_ms: Option<i64>,
    pub baseline_cpu_pct: Option<f64>,
    pub instrumented_cpu_pct: Option<f64>,
    pub baseline_latency_ms: Option<f64>,
    pub instrumented_latency_ms: Option<f64>,
    pub baseline_throughput: Option<f64>,
    pub instrumented_throughput: Option<f64>,
    pub tested_at: Option<DateTime<Utc>>,
}

/// Listing sort field. Direct fields order in SQL; analysis-derived fields
/// sort in memory because they live on the latest analysis row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    Name,
    Id,
    Stars,
    Forks,
    Watchers,
    Issues,
    Commits,
    RepoCreatedAt,
}

impl SortField {
    /// Parses a query-string value; unknown fields fall back to `createdAt`.
    pub fn parse(s: &str) -> SortField {
        match s {
            "createdAt" => SortField::CreatedAt,
            "name" => SortField::Name,
            "id" => SortField::Id,
            "stars" => SortField::Stars,
            "forks" => SortField::Forks,
            "watchers" => SortField::Watchers,
            "issues" => SortField::Issues,
            "commits" => SortField::Commits,
            "repoCreatedAt" => SortField::RepoCreatedAt,
            _ => SortField::CreatedAt,
        }
    }

    /// SQL column expression for directly sortable fields.
    fn direct_column(&self) -> Option<&'static str> {
        match self {
            SortField::CreatedAt => Some("created_at"),
            SortField::Name => Some("name COLLATE NOCASE"),
            SortField::Id => Some("id"),
            _ => None,
        }
    }
}

/// Sort direction; defaults to descending like the listing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> SortOrder {
        if s.eq_ignore_ascii_case("asc") {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }

    fn sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Listing query: free-text search, category filter, sort, pagination.
#[derive(Debug, Clone)]
pub struct RepoQuery {
    pub search: Option<String>,
    pub category: Option<Category>,
    pub sort: SortField,
    pub order: SortOrder,
    pub page: u32,
    pub page_size: u32,
}

impl Default for RepoQuery {
    fn default() -> Self {
        Self {
            search: None,
            category: None,
            sort: SortField::CreatedAt,
            order: SortOrder::Desc,
            page: 1,
            page_size: 25,
        }
    }
}

/// Database handle (single connection behind a mutex)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Foreign keys drive the snapshot cascade on repo delete; WAL for
        // better concurrency under the server.
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    // ============================================
    // Repo CRUD
    // ============================================

    /// Create a repo. Category and description start null pending analysis.
    ///
    /// Returns [`Error::DuplicateUrl`] when the URL is already cataloged and
    /// [`Error::Validation`] when the URL is missing.
    pub fn create_repo(&self, new: &NewRepo) -> Result<Repo> {
        let url = new.url.trim().to_string();
        if url.is_empty() {
            return Err(Error::Validation("url required".to_string()));
        }
        let name = match new.name.as_deref().map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => derive_repo_name(&url),
        };

        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO repos (url, name, category, description, rationale,
                               suggested_new_class, created_at)
            VALUES (?1, ?2, NULL, NULL, NULL, NULL, ?3)
            "#,
            params![url, name, Utc::now().to_rfc3339()],
        )
        .map_err(|e| map_unique_violation(e, &url))?;

        let id = conn.last_insert_rowid();
        Self::fetch_repo(&conn, id)?.ok_or(Error::RepoNotFound(id))
    }

    /// Get a repo by id
    pub fn get_repo(&self, id: i64) -> Result<Option<Repo>> {
        let conn = self.conn.lock().unwrap();
        Self::fetch_repo(&conn, id)
    }

    /// Get a repo with its full snapshot history
    pub fn get_repo_detail(&self, id: i64) -> Result<Option<RepoDetail>> {
        let conn = self.conn.lock().unwrap();
        let Some(repo) = Self::fetch_repo(&conn, id)? else {
            return Ok(None);
        };

        let analysis = Self::collect_children(
            &conn,
            "SELECT * FROM analyses WHERE repo_id = ?1 ORDER BY analyzed_at DESC",
            id,
            Self::row_to_analysis,
        )?;
        let primitives = Self::collect_children(
            &conn,
            "SELECT * FROM primitive_analyses WHERE repo_id = ?1 ORDER BY analyzed_at DESC",
            id,
            Self::row_to_primitive,
        )?;
        let tests = Self::collect_children(
            &conn,
            "SELECT * FROM overhead_tests WHERE repo_id = ?1 ORDER BY tested_at DESC",
            id,
            Self::row_to_test,
        )?;

        Ok(Some(RepoDetail {
            repo,
            analysis,
            primitives,
            tests,
        }))
    }

    /// Patch category/description/rationale/suggestedNewClass on a repo
    pub fn update_repo(&self, id: i64, patch: &RepoPatch) -> Result<Repo> {
        let conn = self.conn.lock().unwrap();
        Self::ensure_repo(&conn, id)?;

        if let Some(category) = patch.category {
            conn.execute(
                "UPDATE repos SET category = ?1 WHERE id = ?2",
                params![category.to_db(), id],
            )?;
        }
        if let Some(description) = &patch.description {
            conn.execute(
                "UPDATE repos SET description = ?1 WHERE id = ?2",
                params![description, id],
            )?;
        }
        if let Some(rationale) = &patch.rationale {
            conn.execute(
                "UPDATE repos SET rationale = ?1 WHERE id = ?2",
                params![rationale, id],
            )?;
        }
        if let Some(suggested) = &patch.suggested_new_class {
            conn.execute(
                "UPDATE repos SET suggested_new_class = ?1 WHERE id = ?2",
                params![suggested, id],
            )?;
        }

        Self::fetch_repo(&conn, id)?.ok_or(Error::RepoNotFound(id))
    }

    /// Delete a repo; snapshot rows cascade. Returns false when the id is
    /// unknown.
    pub fn delete_repo(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute("DELETE FROM repos WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    // ============================================
    // Listing
    // ============================================

    /// List repos with search/filter/sort/pagination plus catalog summary.
    pub fn list_repos(&self, query: &RepoQuery) -> Result<RepoPage> {
        let order_sql = match query.sort.direct_column() {
            Some(column) => format!("{} {}", column, query.order.sql()),
            // Stable base order; the derived sort below rearranges it
            None => "created_at DESC".to_string(),
        };

        let mut rows =
            self.query_overviews(query.search.as_deref(), query.category, &order_sql)?;

        if query.sort.direct_column().is_none() {
            sort_by_derived(&mut rows, query.sort, query.order);
        }

        let total_items = rows.len() as i64;
        let page_size = query.page_size.max(1);
        let page = query.page.max(1);
        let total_pages = (total_items as u32).div_ceil(page_size);
        let start = ((page - 1) as usize).saturating_mul(page_size as usize);

        let data: Vec<RepoOverview> = rows
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .collect();

        Ok(RepoPage {
            data,
            summary: self.catalog_summary()?,
            pagination: Pagination {
                page,
                page_size,
                total_items,
                total_pages,
            },
        })
    }

    /// All matching overview rows in catalog order, without pagination.
    ///
    /// Used by the insights CLI, which aggregates over the whole catalog.
    pub fn repo_overviews(
        &self,
        search: Option<&str>,
        category: Option<Category>,
    ) -> Result<Vec<RepoOverview>> {
        self.query_overviews(search, category, "created_at DESC")
    }

    fn query_overviews(
        &self,
        search: Option<&str>,
        category: Option<Category>,
        order_by: &str,
    ) -> Result<Vec<RepoOverview>> {
        let conn = self.conn.lock().unwrap();

        let mut clauses: Vec<&str> = Vec::new();
        let mut bind: Vec<String> = Vec::new();

        if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search.to_lowercase());
            clauses.push(
                "(LOWER(name) LIKE ? OR LOWER(COALESCE(description, '')) LIKE ? OR LOWER(url) LIKE ?)",
            );
            bind.push(pattern.clone());
            bind.push(pattern.clone());
            bind.push(pattern);
        }
        match category {
            None => {}
            Some(Category::Uncategorized) => clauses.push("category IS NULL"),
            Some(cat) => {
                clauses.push("category = ?");
                bind.push(cat.as_str().to_string());
            }
        }

        let mut sql = String::from("SELECT * FROM repos");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(order_by);

        let mut stmt = conn.prepare(&sql)?;
        let repos = stmt
            .query_map(params_from_iter(bind.iter()), Self::row_to_repo)?
            .collect::<rusqlite::Result<Vec<Repo>>>()?;

        // Sequential latest-snapshot lookups per repo; acceptable at the
        // catalog scale this system targets.
        let mut out = Vec::with_capacity(repos.len());
        for repo in repos {
            let latest_analysis =
                Self::latest_child(&conn, "analyses", "analyzed_at", repo.id, Self::row_to_analysis)?
                    .map(analysis_summary);
            let latest_primitive = Self::latest_child(
                &conn,
                "primitive_analyses",
                "analyzed_at",
                repo.id,
                Self::row_to_primitive,
            )?
            .map(primitive_summary);

            out.push(RepoOverview {
                id: repo.id,
                name: repo.name,
                url: repo.url,
                description: repo.description,
                category: repo.category,
                rationale: repo.rationale,
                suggested_new_class: repo.suggested_new_class,
                created_at: repo.created_at,
                latest_analysis,
                latest_primitive,
            });
        }
        Ok(out)
    }

    /// Catalog-wide counts (independent of any listing filter)
    pub fn catalog_summary(&self) -> Result<CatalogSummary> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            r#"
            SELECT
                (SELECT COUNT(*) FROM repos),
                (SELECT COUNT(*) FROM repos WHERE category IS NOT NULL),
                (SELECT COUNT(*) FROM repos WHERE category IS NULL),
                (SELECT COUNT(DISTINCT repo_id) FROM analyses),
                (SELECT COUNT(DISTINCT repo_id) FROM primitive_analyses)
            "#,
            [],
            |row| {
                Ok(CatalogSummary {
                    total_repos: row.get(0)?,
                    categorized: row.get(1)?,
                    uncategorized: row.get(2)?,
                    analyzed: row.get(3)?,
                    primitive_analyzed: row.get(4)?,
                })
            },
        )
        .map_err(Error::from)
    }

    /// Repo ids in a category, in catalog order
    pub fn repo_ids_in_category(&self, category: Category) -> Result<Vec<i64>> {
        let conn = self.conn.lock().unwrap();
        let (sql, bind): (&str, Vec<String>) = match category.to_db() {
            None => ("SELECT id FROM repos WHERE category IS NULL ORDER BY id", vec![]),
            Some(label) => (
                "SELECT id FROM repos WHERE category = ? ORDER BY id",
                vec![label.to_string()],
            ),
        };
        let mut stmt = conn.prepare(sql)?;
        let ids = stmt
            .query_map(params_from_iter(bind.iter()), |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    /// Distinct categories present in the catalog (including Uncategorized
    /// when null-category repos exist)
    pub fn categories_in_catalog(&self) -> Result<Vec<Category>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT DISTINCT category FROM repos ORDER BY category")?;
        let labels = stmt
            .query_map([], |row| row.get::<_, Option<String>>(0))?
            .collect::<rusqlite::Result<Vec<Option<String>>>>()?;
        let mut cats: Vec<Category> = labels
            .iter()
            .map(|l| Category::from_db(l.as_deref()))
            .collect();
        cats.sort();
        cats.dedup();
        Ok(cats)
    }

    // ============================================
    // Snapshot inserts
    // ============================================

    /// Persist one metadata-analyzer run as a new Analysis row
    pub fn insert_analysis(&self, repo_id: i64, report: &MetadataReport) -> Result<Analysis> {
        let conn = self.conn.lock().unwrap();
        Self::ensure_repo(&conn, repo_id)?;

        let analyzed_at = report.analyzed_at.unwrap_or_else(Utc::now);
        conn.execute(
            r#"
            INSERT INTO analyses (repo_id, stars, forks, watchers, issues, commits,
                                  language, clone_url, default_branch, readme_text,
                                  repo_created_at, repo_updated_at, analyzed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                repo_id,
                report.stars,
                report.forks,
                report.watchers,
                report.issues,
                report.commits,
                report.language,
                report.clone_url,
                report.default_branch,
                report.readme_text,
                report.repo_created_at.map(|t| t.to_rfc3339()),
                report.repo_updated_at.map(|t| t.to_rfc3339()),
                analyzed_at.to_rfc3339(),
            ],
        )?;

        let id = conn.last_insert_rowid();
        conn.query_row("SELECT * FROM analyses WHERE id = ?1", [id], Self::row_to_analysis)
            .map_err(Error::from)
    }

    /// Persist one primitive-analyzer run, computing the derived totals
    pub fn insert_primitive_analysis(
        &self,
        repo_id: i64,
        report: &PrimitiveReport,
    ) -> Result<PrimitiveAnalysis> {
        let conn = self.conn.lock().unwrap();
        Self::ensure_repo(&conn, repo_id)?;

        let totals = report.totals();
        conn.execute(
            r#"
            INSERT INTO primitive_analyses (repo_id, total_helpers, total_maps,
                                            total_programs, total_program_types,
                                            total_attach_points, helpers, map_types,
                                            attach_types, program_sections,
                                            program_types_inferred, program_type_tokens,
                                            analyzed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                repo_id,
                totals.helpers,
                totals.maps,
                totals.programs,
                totals.program_types,
                totals.attach_points,
                serde_json::to_string(&report.helpers)?,
                serde_json::to_string(&report.map_types)?,
                serde_json::to_string(&report.attach_types)?,
                serde_json::to_string(&report.program_sections.sec_full)?,
                serde_json::to_string(&report.program_types_inferred)?,
                serde_json::to_string(&report.program_types_tokens)?,
                Utc::now().to_rfc3339(),
            ],
        )?;

        let id = conn.last_insert_rowid();
        conn.query_row(
            "SELECT * FROM primitive_analyses WHERE id = ?1",
            [id],
            Self::row_to_primitive,
        )
        .map_err(Error::from)
    }

    /// Record an overhead benchmark run
    pub fn insert_overhead_test(
        &self,
        repo_id: i64,
        test: &NewOverheadTest,
    ) -> Result<OverheadTest> {
        let conn = self.conn.lock().unwrap();
        Self::ensure_repo(&conn, repo_id)?;

        let tested_at = test.tested_at.unwrap_or_else(Utc::now);
        conn.execute(
            r#"
            INSERT INTO overhead_tests (repo_id, runs, warmup_runs, duration_ms,
                                        baseline_cpu_pct, instrumented_cpu_pct,
                                        baseline_latency_ms, instrumented_latency_ms,
                                        baseline_throughput, instrumented_throughput,
                                        tested_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                repo_id,
                test.runs,
                test.warmup_runs,
                test.duration_ms,
                test.baseline_cpu_pct,
                test.instrumented_cpu_pct,
                test.baseline_latency_ms,
                test.instrumented_latency_ms,
                test.baseline_throughput,
                test.instrumented_throughput,
                tested_at.to_rfc3339(),
            ],
        )?;

        let id = conn.last_insert_rowid();
        conn.query_row("SELECT * FROM overhead_tests WHERE id = ?1", [id], Self::row_to_test)
            .map_err(Error::from)
    }

    // ============================================
    // Snapshot reads
    // ============================================

    /// All analyses for a repo, newest first
    pub fn analyses_for_repo(&self, repo_id: i64) -> Result<Vec<Analysis>> {
        let conn = self.conn.lock().unwrap();
        Self::ensure_repo(&conn, repo_id)?;
        Self::collect_children(
            &conn,
            "SELECT * FROM analyses WHERE repo_id = ?1 ORDER BY analyzed_at DESC",
            repo_id,
            Self::row_to_analysis,
        )
    }

    /// All primitive analyses for a repo, newest first
    pub fn primitives_for_repo(&self, repo_id: i64) -> Result<Vec<PrimitiveAnalysis>> {
        let conn = self.conn.lock().unwrap();
        Self::ensure_repo(&conn, repo_id)?;
        Self::collect_children(
            &conn,
            "SELECT * FROM primitive_analyses WHERE repo_id = ?1 ORDER BY analyzed_at DESC",
            repo_id,
            Self::row_to_primitive,
        )
    }

    /// All overhead tests for a repo, newest first
    pub fn tests_for_repo(&self, repo_id: i64) -> Result<Vec<OverheadTest>> {
        let conn = self.conn.lock().unwrap();
        Self::ensure_repo(&conn, repo_id)?;
        Self::collect_children(
            &conn,
            "SELECT * FROM overhead_tests WHERE repo_id = ?1 ORDER BY tested_at DESC",
            repo_id,
            Self::row_to_test,
        )
    }

    /// Get a single analysis by id
    pub fn get_analysis(&self, id: i64) -> Result<Analysis> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM analyses WHERE id = ?1", [id], Self::row_to_analysis)
            .optional()?
            .ok_or(Error::SnapshotNotFound {
                kind: "analysis",
                id,
            })
    }

    /// Get a single primitive analysis by id
    pub fn get_primitive_analysis(&self, id: i64) -> Result<PrimitiveAnalysis> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM primitive_analyses WHERE id = ?1",
            [id],
            Self::row_to_primitive,
        )
        .optional()?
        .ok_or(Error::SnapshotNotFound {
            kind: "primitive analysis",
            id,
        })
    }

    /// Get a single overhead test by id
    pub fn get_overhead_test(&self, id: i64) -> Result<OverheadTest> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM overhead_tests WHERE id = ?1",
            [id],
            Self::row_to_test,
        )
        .optional()?
        .ok_or(Error::SnapshotNotFound {
            kind: "overhead test",
            id,
        })
    }

    /// Latest primitive analysis for a repo, if any
    pub fn latest_primitive(&self, repo_id: i64) -> Result<Option<PrimitiveAnalysis>> {
        let conn = self.conn.lock().unwrap();
        Self::latest_child(
            &conn,
            "primitive_analyses",
            "analyzed_at",
            repo_id,
            Self::row_to_primitive,
        )
    }

    /// Latest metadata analysis for a repo, if any
    pub fn latest_analysis(&self, repo_id: i64) -> Result<Option<Analysis>> {
        let conn = self.conn.lock().unwrap();
        Self::latest_child(&conn, "analyses", "analyzed_at", repo_id, Self::row_to_analysis)
    }

    // ============================================
    // Internals
    // ============================================

    /// Most-recent-child query: the row with the maximum timestamp for a
    /// repo. Shared across all three snapshot kinds.
    fn latest_child<T>(
        conn: &Connection,
        table: &str,
        ts_column: &str,
        repo_id: i64,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Option<T>> {
        let sql = format!(
            "SELECT * FROM {} WHERE repo_id = ?1 ORDER BY {} DESC, id DESC LIMIT 1",
            table, ts_column
        );
        conn.query_row(&sql, [repo_id], map)
            .optional()
            .map_err(Error::from)
    }

    fn collect_children<T>(
        conn: &Connection,
        sql: &str,
        repo_id: i64,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map([repo_id], map)?
            .collect::<rusqlite::Result<Vec<T>>>()?;
        Ok(rows)
    }

    fn fetch_repo(conn: &Connection, id: i64) -> Result<Option<Repo>> {
        conn.query_row("SELECT * FROM repos WHERE id = ?1", [id], Self::row_to_repo)
            .optional()
            .map_err(Error::from)
    }

    fn ensure_repo(conn: &Connection, id: i64) -> Result<()> {
        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM repos WHERE id = ?1",
            [id],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(Error::RepoNotFound(id));
        }
        Ok(())
    }

    fn row_to_repo(row: &Row) -> rusqlite::Result<Repo> {
        let category: Option<String> = row.get("category")?;
        let created_at: String = row.get("created_at")?;
        Ok(Repo {
            id: row.get("id")?,
            url: row.get("url")?,
            name: row.get("name")?,
            category: Category::from_db(category.as_deref()),
            description: row.get("description")?,
            rationale: row.get("rationale")?,
            suggested_new_class: row.get("suggested_new_class")?,
            created_at: parse_ts(&created_at),
        })
    }

    fn row_to_analysis(row: &Row) -> rusqlite::Result<Analysis> {
        let analyzed_at: String = row.get("analyzed_at")?;
        Ok(Analysis {
            id: row.get("id")?,
            repo_id: row.get("repo_id")?,
            stars: row.get("stars")?,
            forks: row.get("forks")?,
            watchers: row.get("watchers")?,
            issues: row.get("issues")?,
            commits: row.get("commits")?,
            language: row.get("language")?,
            clone_url: row.get("clone_url")?,
            default_branch: row.get("default_branch")?,
            readme_text: row.get("readme_text")?,
            repo_created_at: parse_ts_opt(row.get("repo_created_at")?),
            repo_updated_at: parse_ts_opt(row.get("repo_updated_at")?),
            analyzed_at: parse_ts(&analyzed_at),
        })
    }

    fn row_to_primitive(row: &Row) -> rusqlite::Result<PrimitiveAnalysis> {
        let analyzed_at: String = row.get("analyzed_at")?;
        Ok(PrimitiveAnalysis {
            id: row.get("id")?,
            repo_id: row.get("repo_id")?,
            total_helpers: row.get("total_helpers")?,
            total_maps: row.get("total_maps")?,
            total_programs: row.get("total_programs")?,
            total_program_types: row.get("total_program_types")?,
            total_attach_points: row.get("total_attach_points")?,
            helpers: parse_count_map(row.get("helpers")?),
            map_types: parse_count_map(row.get("map_types")?),
            attach_types: parse_count_map(row.get("attach_types")?),
            program_sections: parse_count_map(row.get("program_sections")?),
            program_types_inferred: parse_count_map(row.get("program_types_inferred")?),
            program_type_tokens: parse_count_map(row.get("program_type_tokens")?),
            analyzed_at: parse_ts(&analyzed_at),
        })
    }

    fn row_to_test(row: &Row) -> rusqlite::Result<OverheadTest> {
        let tested_at: String = row.get("tested_at")?;
        Ok(OverheadTest {
            id: row.get("id")?,
            repo_id: row.get("repo_id")?,
            runs: row.get("runs")?,
            warmup_runs: row.get("warmup_runs")?,
            duration_ms: row.get("duration_ms")?,
            baseline_cpu_pct: row.get("baseline_cpu_pct")?,
            instrumented_cpu_pct: row.get("instrumented_cpu_pct")?,
            baseline_latency_ms: row.get("baseline_latency_ms")?,
            instrumented_latency_ms: row.get("instrumented_latency_ms")?,
            baseline_throughput: row.get("baseline_throughput")?,
            instrumented_throughput: row.get("instrumented_throughput")?,
            tested_at: parse_ts(&tested_at),
        })
    }
}

/// Unique-constraint failures on repos.url surface as duplicate errors
fn map_unique_violation(err: rusqlite::Error, url: &str) -> Error {
    if let rusqlite::Error::SqliteFailure(code, _) = &err {
        if code.code == rusqlite::ErrorCode::ConstraintViolation {
            return Error::DuplicateUrl(url.to_string());
        }
    }
    Error::Database(err)
}

fn analysis_summary(a: Analysis) -> AnalysisSummary {
    AnalysisSummary {
        stars: a.stars,
        forks: a.forks,
        watchers: a.watchers,
        issues: a.issues,
        commits: a.commits,
        language: a.language,
        repo_created_at: a.repo_created_at,
        analyzed_at: a.analyzed_at,
    }
}

fn primitive_summary(p: PrimitiveAnalysis) -> PrimitiveSummary {
    PrimitiveSummary {
        total_helpers: p.total_helpers,
        total_maps: p.total_maps,
        total_programs: p.total_programs,
        total_program_types: p.total_program_types,
        total_attach_points: p.total_attach_points,
        helpers: p.helpers,
        map_types: p.map_types,
        attach_types: p.attach_types,
        program_types_inferred: p.program_types_inferred,
        analyzed_at: p.analyzed_at,
    }
}

/// In-memory sort for analysis-derived fields. Repos without a usable key
/// (no analysis, or a null metric) sort last in either direction.
fn sort_by_derived(rows: &mut [RepoOverview], field: SortField, order: SortOrder) {
    rows.sort_by(|a, b| {
        let ka = derived_key(field, a);
        let kb = derived_key(field, b);
        match (ka, kb) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => match order {
                SortOrder::Asc => x.cmp(&y),
                SortOrder::Desc => y.cmp(&x),
            },
        }
    });
}

fn derived_key(field: SortField, row: &RepoOverview) -> Option<i64> {
    let analysis = row.latest_analysis.as_ref()?;
    match field {
        SortField::Stars => analysis.stars,
        SortField::Forks => analysis.forks,
        SortField::Watchers => analysis.watchers,
        SortField::Issues => analysis.issues,
        SortField::Commits => analysis.commits,
        SortField::RepoCreatedAt => analysis.repo_created_at.map(|t| t.timestamp()),
        _ => None,
    }
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_ts_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_count_map(s: String) -> CountMap {
    serde_json::from_str(&s).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::PrimitiveReport;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn add_repo(db: &Database, url: &str) -> Repo {
        db.create_repo(&NewRepo {
            name: None,
            url: url.to_string(),
        })
        .unwrap()
    }

    fn metadata_with_stars(stars: i64) -> MetadataReport {
        MetadataReport {
            stars: Some(stars),
            ..Default::default()
        }
    }

    fn primitive_report(programs: &[(&str, i64)]) -> PrimitiveReport {
        let mut report = PrimitiveReport::default();
        for (k, v) in programs {
            report.program_types_inferred.insert(k.to_string(), *v);
        }
        report
    }

    #[test]
    fn test_create_derives_name_from_url() {
        let db = test_db();
        let repo = add_repo(&db, "https://github.com/cilium/tetragon.git");
        assert_eq!(repo.name, "tetragon");
        assert_eq!(repo.category, Category::Uncategorized);
        assert!(repo.description.is_none());
    }

    #[test]
    fn test_create_missing_url_rejected() {
        let db = test_db();
        let err = db
            .create_repo(&NewRepo {
                name: None,
                url: "   ".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_duplicate_url_conflict() {
        let db = test_db();
        add_repo(&db, "https://github.com/iovisor/bcc");
        let err = db
            .create_repo(&NewRepo {
                name: Some("other".to_string()),
                url: "https://github.com/iovisor/bcc".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateUrl(_)));
    }

    #[test]
    fn test_update_repo_patch_semantics() {
        let db = test_db();
        let repo = add_repo(&db, "https://github.com/cilium/cilium");

        let updated = db
            .update_repo(
                repo.id,
                &RepoPatch {
                    category: Some(Category::Observability),
                    description: Some(Some("an eBPF dataplane".to_string())),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.category, Category::Observability);
        assert_eq!(updated.description.as_deref(), Some("an eBPF dataplane"));

        // Clearing a nullable field and resetting the category
        let updated = db
            .update_repo(
                repo.id,
                &RepoPatch {
                    category: Some(Category::Uncategorized),
                    description: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.category, Category::Uncategorized);
        assert!(updated.description.is_none());
    }

    #[test]
    fn test_update_missing_repo() {
        let db = test_db();
        let err = db.update_repo(42, &RepoPatch::default()).unwrap_err();
        assert!(matches!(err, Error::RepoNotFound(42)));
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let db = test_db();
        add_repo(&db, "https://github.com/cilium/Tetragon");
        add_repo(&db, "https://github.com/iovisor/bcc");

        let page = db
            .list_repos(&RepoQuery {
                search: Some("TETRA".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].name, "Tetragon");

        // URL matches count too
        let page = db
            .list_repos(&RepoQuery {
                search: Some("iovisor".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].name, "bcc");
    }

    #[test]
    fn test_uncategorized_filter_returns_null_category_rows() {
        let db = test_db();
        let a = add_repo(&db, "https://github.com/a/one");
        let b = add_repo(&db, "https://github.com/b/two");
        db.update_repo(
            b.id,
            &RepoPatch {
                category: Some(Category::RuntimeSecurity),
                ..Default::default()
            },
        )
        .unwrap();

        let page = db
            .list_repos(&RepoQuery {
                category: Some(Category::Uncategorized),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].id, a.id);

        let page = db
            .list_repos(&RepoQuery {
                category: Some(Category::RuntimeSecurity),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].id, b.id);
    }

    #[test]
    fn test_sort_by_stars_desc_unanalyzed_last() {
        let db = test_db();
        let low = add_repo(&db, "https://github.com/x/low");
        let high = add_repo(&db, "https://github.com/x/high");
        let never = add_repo(&db, "https://github.com/x/never");
        db.insert_analysis(low.id, &metadata_with_stars(10)).unwrap();
        db.insert_analysis(high.id, &metadata_with_stars(500)).unwrap();

        let page = db
            .list_repos(&RepoQuery {
                sort: SortField::Stars,
                order: SortOrder::Desc,
                ..Default::default()
            })
            .unwrap();
        let ids: Vec<i64> = page.data.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![high.id, low.id, never.id]);

        let stars: Vec<Option<i64>> = page
            .data
            .iter()
            .map(|r| r.latest_analysis.as_ref().and_then(|a| a.stars))
            .collect();
        assert_eq!(stars, vec![Some(500), Some(10), None]);

        // Ascending still keeps the analysis-less repo last
        let page = db
            .list_repos(&RepoQuery {
                sort: SortField::Stars,
                order: SortOrder::Asc,
                ..Default::default()
            })
            .unwrap();
        let ids: Vec<i64> = page.data.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![low.id, high.id, never.id]);
    }

    #[test]
    fn test_latest_analysis_is_newest_snapshot() {
        let db = test_db();
        let repo = add_repo(&db, "https://github.com/x/repo");
        db.insert_analysis(repo.id, &metadata_with_stars(1)).unwrap();
        db.insert_analysis(repo.id, &metadata_with_stars(2)).unwrap();

        let page = db.list_repos(&RepoQuery::default()).unwrap();
        let latest = page.data[0].latest_analysis.as_ref().unwrap();
        assert_eq!(latest.stars, Some(2));

        // Full history remains available
        let history = db.analyses_for_repo(repo.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].stars, Some(2));
    }

    #[test]
    fn test_pagination_metadata() {
        let db = test_db();
        for i in 0..7 {
            add_repo(&db, &format!("https://github.com/x/repo{}", i));
        }

        let page = db
            .list_repos(&RepoQuery {
                sort: SortField::Id,
                order: SortOrder::Asc,
                page: 2,
                page_size: 3,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.data.len(), 3);
        assert_eq!(page.pagination.total_items, 7);
        assert_eq!(page.pagination.total_pages, 3);
        assert_eq!(page.pagination.page, 2);
        let ids: Vec<i64> = page.data.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![4, 5, 6]);
    }

    #[test]
    fn test_catalog_summary_counts() {
        let db = test_db();
        let a = add_repo(&db, "https://github.com/x/a");
        let b = add_repo(&db, "https://github.com/x/b");
        db.update_repo(
            a.id,
            &RepoPatch {
                category: Some(Category::Observability),
                ..Default::default()
            },
        )
        .unwrap();
        db.insert_analysis(a.id, &metadata_with_stars(5)).unwrap();
        db.insert_primitive_analysis(b.id, &primitive_report(&[("kprobe", 2)]))
            .unwrap();

        let summary = db.catalog_summary().unwrap();
        assert_eq!(summary.total_repos, 2);
        assert_eq!(summary.categorized, 1);
        assert_eq!(summary.uncategorized, 1);
        assert_eq!(summary.analyzed, 1);
        assert_eq!(summary.primitive_analyzed, 1);
    }

    #[test]
    fn test_primitive_totals_derived_from_maps() {
        let db = test_db();
        let repo = add_repo(&db, "https://github.com/x/prims");
        let mut report = primitive_report(&[("kprobe", 3), ("xdp", 2)]);
        report.helpers.insert("bpf_map_lookup_elem".to_string(), 4);
        report.helpers.insert("bpf_probe_read".to_string(), 1);
        report.map_types.insert("BPF_MAP_TYPE_HASH".to_string(), 2);
        report.attach_types.insert("kprobe".to_string(), 5);

        let row = db.insert_primitive_analysis(repo.id, &report).unwrap();
        assert_eq!(row.total_programs, 5);
        assert_eq!(row.total_program_types, 2);
        assert_eq!(row.total_helpers, 5);
        assert_eq!(row.total_maps, 2);
        assert_eq!(row.total_attach_points, 5);
        assert_eq!(row.program_types_inferred.get("kprobe"), Some(&3));
    }

    #[test]
    fn test_delete_cascades_snapshots() {
        let db = test_db();
        let repo = add_repo(&db, "https://github.com/x/doomed");
        db.insert_analysis(repo.id, &metadata_with_stars(9)).unwrap();
        db.insert_primitive_analysis(repo.id, &primitive_report(&[("xdp", 1)]))
            .unwrap();
        let test = db
            .insert_overhead_test(repo.id, &NewOverheadTest::default())
            .unwrap();

        assert!(db.delete_repo(repo.id).unwrap());
        assert!(db.get_repo(repo.id).unwrap().is_none());
        assert!(matches!(
            db.analyses_for_repo(repo.id).unwrap_err(),
            Error::RepoNotFound(_)
        ));
        assert!(matches!(
            db.get_overhead_test(test.id).unwrap_err(),
            Error::SnapshotNotFound { .. }
        ));

        // Second delete reports unknown id
        assert!(!db.delete_repo(repo.id).unwrap());
    }

    #[test]
    fn test_repo_detail_includes_history() {
        let db = test_db();
        let repo = add_repo(&db, "https://github.com/x/detail");
        db.insert_analysis(repo.id, &metadata_with_stars(1)).unwrap();
        db.insert_primitive_analysis(repo.id, &primitive_report(&[("tracepoint", 1)]))
            .unwrap();
        db.insert_overhead_test(repo.id, &NewOverheadTest::default())
            .unwrap();

        let detail = db.get_repo_detail(repo.id).unwrap().unwrap();
        assert_eq!(detail.analysis.len(), 1);
        assert_eq!(detail.primitives.len(), 1);
        assert_eq!(detail.tests.len(), 1);

        assert!(db.get_repo_detail(9999).unwrap().is_none());
    }

    #[test]
    fn test_categories_in_catalog() {
        let db = test_db();
        let a = add_repo(&db, "https://github.com/x/a");
        add_repo(&db, "https://github.com/x/b");
        db.update_repo(
            a.id,
            &RepoPatch {
                category: Some(Category::Observability),
                ..Default::default()
            },
        )
        .unwrap();

        let cats = db.categories_in_catalog().unwrap();
        assert_eq!(
            cats,
            vec![Category::Observability, Category::Uncategorized]
        );
    }

    #[test]
    fn test_repo_ids_in_category() {
        let db = test_db();
        let a = add_repo(&db, "https://github.com/x/a");
        let b = add_repo(&db, "https://github.com/x/b");
        db.update_repo(
            a.id,
            &RepoPatch {
                category: Some(Category::Observability),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(
            db.repo_ids_in_category(Category::Observability).unwrap(),
            vec![a.id]
        );
        assert_eq!(
            db.repo_ids_in_category(Category::Uncategorized).unwrap(),
            vec![b.id]
        );
    }
}
