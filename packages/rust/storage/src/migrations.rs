//! SQL migration definitions for the article database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements. Every statement is written
//! with `IF NOT EXISTS` so a database created by an earlier tool with the
//! same `articles` layout is adopted in place.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: articles",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Ingested articles, keyed by URL hash
CREATE TABLE IF NOT EXISTS articles (
    id             TEXT PRIMARY KEY,
    source_name    TEXT,
    url            TEXT,
    title          TEXT,
    content        TEXT,
    published_date TEXT
);

CREATE INDEX IF NOT EXISTS idx_articles_source ON articles(source_name);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Ingestion run history",
            sql: r#"
CREATE TABLE IF NOT EXISTS ingest_runs (
    id          TEXT PRIMARY KEY,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
        Migration {
            version: 3,
            description: "Full-text search over article titles and bodies",
            sql: r#"
CREATE VIRTUAL TABLE IF NOT EXISTS articles_fts USING fts5(
    title,
    content,
    content=articles,
    content_rowid=rowid
);

-- Index rows that predate this migration
INSERT INTO articles_fts(articles_fts) VALUES ('rebuild');

-- Articles are insert-only; deletes are kept in sync for manual cleanup
CREATE TRIGGER IF NOT EXISTS articles_fts_insert AFTER INSERT ON articles BEGIN
    INSERT INTO articles_fts(rowid, title, content)
    VALUES (new.rowid, new.title, new.content);
END;

CREATE TRIGGER IF NOT EXISTS articles_fts_delete AFTER DELETE ON articles BEGIN
    INSERT INTO articles_fts(articles_fts, rowid, title, content)
    VALUES ('delete', old.rowid, old.title, old.content);
END;

INSERT INTO schema_migrations (version) VALUES (3);
"#,
        },
    ]
}
