//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: Initial schema
    r#"
    -- ============================================
    -- Catalog: one row per tracked repository
    -- ============================================

    CREATE TABLE IF NOT EXISTS repos (
        id                  INTEGER PRIMARY KEY AUTOINCREMENT,
        url                 TEXT NOT NULL UNIQUE,
        name                TEXT NOT NULL,
        category            TEXT,               -- NULL = uncategorized
        description         TEXT,
        rationale           TEXT,
        suggested_new_class TEXT,
        created_at          DATETIME NOT NULL
    );

    -- ============================================
    -- Snapshots: immutable, one row per analyzer run
    -- ============================================

    CREATE TABLE IF NOT EXISTS analyses (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        repo_id          INTEGER NOT NULL REFERENCES repos(id) ON DELETE CASCADE,
        stars            INTEGER,
        forks            INTEGER,
        watchers         INTEGER,
        issues           INTEGER,
        commits          INTEGER,
        language         TEXT,
        clone_url        TEXT,
        default_branch   TEXT,
        readme_text      TEXT,
        repo_created_at  DATETIME,
        repo_updated_at  DATETIME,
        analyzed_at      DATETIME NOT NULL
    );

    CREATE TABLE IF NOT EXISTS primitive_analyses (
        id                     INTEGER PRIMARY KEY AUTOINCREMENT,
        repo_id                INTEGER NOT NULL REFERENCES repos(id) ON DELETE CASCADE,
        total_helpers          INTEGER NOT NULL,
        total_maps             INTEGER NOT NULL,
        total_programs         INTEGER NOT NULL,
        total_program_types    INTEGER NOT NULL,
        total_attach_points    INTEGER NOT NULL,

        -- Frequency maps: feature name -> occurrence count
        helpers                JSON NOT NULL,
        map_types              JSON NOT NULL,
        attach_types           JSON NOT NULL,
        program_sections       JSON NOT NULL,
        program_types_inferred JSON NOT NULL,
        program_type_tokens    JSON NOT NULL,

        analyzed_at            DATETIME NOT NULL
    );

    CREATE TABLE IF NOT EXISTS overhead_tests (
        id                      INTEGER PRIMARY KEY AUTOINCREMENT,
        repo_id                 INTEGER NOT NULL REFERENCES repos(id) ON DELETE CASCADE,
        runs                    INTEGER,
        warmup_runs             INTEGER,
        duration_ms             INTEGER,
        baseline_cpu_pct        REAL,
        instrumented_cpu_pct    REAL,
        baseline_latency_ms     REAL,
        instrumented_latency_ms REAL,
        baseline_throughput     REAL,
        instrumented_throughput REAL,
        tested_at               DATETIME NOT NULL
    );

    -- ============================================
    -- Indexes
    -- ============================================

    CREATE INDEX IF NOT EXISTS idx_repos_category ON repos(category);
    CREATE INDEX IF NOT EXISTS idx_repos_created ON repos(created_at DESC);
    CREATE INDEX IF NOT EXISTS idx_analyses_repo ON analyses(repo_id, analyzed_at DESC);
    CREATE INDEX IF NOT EXISTS idx_primitive_analyses_repo
        ON primitive_analyses(repo_id, analyzed_at DESC);
    CREATE INDEX IF NOT EXISTS idx_overhead_tests_repo
        ON overhead_tests(repo_id, tested_at DESC);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        // Run migrations twice - should be idempotent
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let tables = ["repos", "analyses", "primitive_analyses", "overhead_tests"];

        for table in tables {
            let exists: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_snapshot_tables_cascade() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        run_migrations(&conn).unwrap();

        for table in ["analyses", "primitive_analyses", "overhead_tests"] {
            let fk_list: Vec<(String, String)> = conn
                .prepare(&format!("PRAGMA foreign_key_list({})", table))
                .unwrap()
                .query_map([], |row| {
                    Ok((row.get::<_, String>(2)?, row.get::<_, String>(6)?))
                })
                .unwrap()
                .filter_map(|r| r.ok())
                .collect();

            assert!(
                fk_list
                    .iter()
                    .any(|(parent, on_delete)| parent == "repos" && on_delete == "CASCADE"),
                "{} should cascade from repos",
                table
            );
        }
    }
}
