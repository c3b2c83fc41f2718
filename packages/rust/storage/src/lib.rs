//! libSQL article store.
//!
//! The [`ArticleStore`] holds every ingested article keyed by the hash of its
//! URL, a history of ingestion runs, and a full-text index over titles and
//! bodies.
//!
//! **Access rules:**
//! - `ingest` / `run`: read-write via [`ArticleStore::open`]
//! - `articles list|search`: read-only via [`ArticleStore::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::Utc;
use feedwire_shared::{Article, FeedwireError, Result};
use libsql::{Connection, Database, params};
use uuid::Uuid;

/// Primary storage handle wrapping a libSQL database.
pub struct ArticleStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl ArticleStore {
    /// Open or create a database at `path` in read-write mode.
    ///
    /// Opening an already-initialised database is a no-op apart from applying
    /// any migrations it has not seen yet.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| FeedwireError::io(parent, e))?;
        }

        let (db, conn) = connect(path).await?;
        let store = Self {
            db,
            conn,
            readonly: false,
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Open an existing database at `path` for queries only.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FeedwireError::Storage(format!(
                "database not found: {}",
                path.display()
            )));
        }

        let (db, conn) = connect(path).await?;
        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        FeedwireError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(FeedwireError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Articles
    // -----------------------------------------------------------------------

    /// Whether an article with this id is already stored.
    pub async fn exists(&self, id: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query("SELECT 1 FROM articles WHERE id = ?1 LIMIT 1", params![id])
            .await
            .map_err(|e| FeedwireError::Storage(e.to_string()))?;

        let row = rows
            .next()
            .await
            .map_err(|e| FeedwireError::Storage(e.to_string()))?;
        Ok(row.is_some())
    }

    /// Insert a new article.
    ///
    /// Fails with [`FeedwireError::DuplicateKey`] if the id is already present;
    /// the stored row is left untouched.
    pub async fn insert(&self, article: &Article) -> Result<()> {
        self.check_writable()?;
        let affected = self
            .conn
            .execute(
                "INSERT INTO articles (id, source_name, url, title, content, published_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO NOTHING",
                params![
                    article.id.as_str(),
                    article.source_name.as_str(),
                    article.url.as_str(),
                    article.title.as_str(),
                    article.content.as_str(),
                    article.published_date.as_str()
                ],
            )
            .await
            .map_err(|e| FeedwireError::Storage(e.to_string()))?;

        if affected == 0 {
            return Err(FeedwireError::DuplicateKey {
                id: article.id.clone(),
            });
        }
        Ok(())
    }

    /// Fetch one article by id.
    pub async fn get(&self, id: &str) -> Result<Option<Article>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, source_name, url, title, content, published_date
                 FROM articles WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(|e| FeedwireError::Storage(e.to_string()))?;

        match rows
            .next()
            .await
            .map_err(|e| FeedwireError::Storage(e.to_string()))? {
            Some(row) => Ok(Some(row_to_article(&row)?)),
            None => Ok(None),
        }
    }

    /// Total number of stored articles.
    pub async fn count(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM articles", params![])
            .await
            .map_err(|e| FeedwireError::Storage(e.to_string()))?;

        match rows
            .next()
            .await
            .map_err(|e| FeedwireError::Storage(e.to_string()))? {
            Some(row) => Ok(row.get::<i64>(0).unwrap_or(0).max(0) as u64),
            None => Ok(0),
        }
    }

    /// Most recently inserted articles, newest first.
    pub async fn list_recent(&self, limit: u32, source: Option<&str>) -> Result<Vec<Article>> {
        let mut rows = match source {
            Some(source) => {
                self.conn
                    .query(
                        "SELECT id, source_name, url, title, content, published_date
                         FROM articles WHERE source_name = ?1
                         ORDER BY rowid DESC LIMIT ?2",
                        params![source, limit],
                    )
                    .await
            }
            None => {
                self.conn
                    .query(
                        "SELECT id, source_name, url, title, content, published_date
                         FROM articles ORDER BY rowid DESC LIMIT ?1",
                        params![limit],
                    )
                    .await
            }
        }
        .map_err(|e| FeedwireError::Storage(e.to_string()))?;

        let mut articles = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| FeedwireError::Storage(e.to_string()))?
        {
            articles.push(row_to_article(&row)?);
        }
        Ok(articles)
    }

    // -----------------------------------------------------------------------
    // Ingestion runs
    // -----------------------------------------------------------------------

    /// Record the start of an ingestion run. Returns the run id.
    pub async fn insert_ingest_run(&self) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO ingest_runs (id, started_at) VALUES (?1, ?2)",
                params![id.as_str(), now.as_str()],
            )
            .await
            .map_err(|e| FeedwireError::Storage(e.to_string()))?;
        Ok(id)
    }

    /// Mark an ingestion run finished and attach its counters.
    pub async fn finish_ingest_run(&self, id: &str, stats_json: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE ingest_runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, id],
            )
            .await
            .map_err(|e| FeedwireError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Past runs, newest first.
    pub async fn list_ingest_runs(&self, limit: u32) -> Result<Vec<IngestRun>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, started_at, finished_at, stats_json
                 FROM ingest_runs ORDER BY started_at DESC LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(|e| FeedwireError::Storage(e.to_string()))?;

        let mut runs = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| FeedwireError::Storage(e.to_string()))?
        {
            runs.push(IngestRun {
                id: row
                    .get::<String>(0)
                    .map_err(|e| FeedwireError::Storage(e.to_string()))?,
                started_at: row
                    .get::<String>(1)
                    .map_err(|e| FeedwireError::Storage(e.to_string()))?,
                finished_at: row.get::<String>(2).ok(),
                stats_json: row.get::<String>(3).ok(),
            });
        }
        Ok(runs)
    }

    // -----------------------------------------------------------------------
    // Full-text search
    // -----------------------------------------------------------------------

    /// Search article titles and bodies using FTS5.
    pub async fn search(&self, query: &str, limit: u32) -> Result<Vec<SearchResult>> {
        let mut rows = self
            .conn
            .query(
                "SELECT a.id, a.source_name, a.url, a.title, rank
                 FROM articles_fts fts
                 JOIN articles a ON a.rowid = fts.rowid
                 WHERE articles_fts MATCH ?1
                 ORDER BY rank
                 LIMIT ?2",
                params![query, limit],
            )
            .await
            .map_err(|e| FeedwireError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| FeedwireError::Storage(e.to_string()))?
        {
            let id: String = row
                .get(0)
                .map_err(|e| FeedwireError::Storage(e.to_string()))?;
            results.push(SearchResult {
                id,
                source_name: row.get::<String>(1).unwrap_or_default(),
                url: row.get::<String>(2).unwrap_or_default(),
                title: row.get::<String>(3).unwrap_or_default(),
                score: row.get::<f64>(4).unwrap_or(0.0),
            });
        }
        Ok(results)
    }
}

/// A search result from FTS5.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: String,
    pub source_name: String,
    pub url: String,
    pub title: String,
    /// FTS5 rank score (lower is better).
    pub score: f64,
}

/// One row of the ingestion run history.
#[derive(Debug, Clone)]
pub struct IngestRun {
    pub id: String,
    pub started_at: String,
    /// Unset while the run is in progress or if it was interrupted.
    pub finished_at: Option<String>,
    pub stats_json: Option<String>,
}

async fn connect(path: &Path) -> Result<(Database, Connection)> {
    let db = libsql::Builder::new_local(path)
        .build()
        .await
        .map_err(|e| FeedwireError::Storage(e.to_string()))?;

    let conn = db
        .connect()
        .map_err(|e| FeedwireError::Storage(e.to_string()))?;

    Ok((db, conn))
}

/// Convert a database row to an [`Article`].
///
/// Text columns other than the key may be NULL in databases written by older
/// tools; those read back as empty strings.
fn row_to_article(row: &libsql::Row) -> Result<Article> {
    Ok(Article {
        id: row
            .get::<String>(0)
            .map_err(|e| FeedwireError::Storage(e.to_string()))?,
        source_name: row.get::<String>(1).unwrap_or_default(),
        url: row.get::<String>(2).unwrap_or_default(),
        title: row.get::<String>(3).unwrap_or_default(),
        content: row.get::<String>(4).unwrap_or_default(),
        published_date: row.get::<String>(5).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_db_path() -> PathBuf {
        std::env::temp_dir().join(format!("feedwire_test_{}.db", Uuid::now_v7()))
    }

    /// Create a temp file store for testing.
    async fn test_store() -> ArticleStore {
        ArticleStore::open(&temp_db_path()).await.expect("open test db")
    }

    fn article(id: &str, title: &str, content: &str) -> Article {
        Article {
            id: id.into(),
            source_name: "X".into(),
            url: format!("http://a/{id}"),
            title: title.into(),
            content: content.into(),
            published_date: "2024-01-01".into(),
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let store = test_store().await;
        assert_eq!(store.get_schema_version().await, 3);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn idempotent_open() {
        let path = temp_db_path();
        let s1 = ArticleStore::open(&path).await.expect("first open");
        s1.insert(&article("h1", "T", "C")).await.unwrap();
        drop(s1);

        let s2 = ArticleStore::open(&path).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 3);
        assert_eq!(s2.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn adopts_existing_articles_table() {
        let path = temp_db_path();
        {
            let (_db, conn) = connect(&path).await.unwrap();
            conn.execute_batch(
                "CREATE TABLE articles (id TEXT PRIMARY KEY, source_name TEXT, url TEXT,
                     title TEXT, content TEXT, published_date TEXT);
                 INSERT INTO articles VALUES ('old', 'Legacy', 'http://old', 'Old story', 'legacy body', NULL);",
            )
            .await
            .unwrap();
        }

        let store = ArticleStore::open(&path).await.unwrap();
        let old = store.get("old").await.unwrap().unwrap();
        assert_eq!(old.source_name, "Legacy");
        assert_eq!(old.published_date, "");

        let hits = store.search("legacy", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn insert_then_get_round_trip() {
        let store = test_store().await;
        let a = Article {
            id: "h1".into(),
            source_name: "X".into(),
            url: "http://a/1".into(),
            title: "T".into(),
            content: "C".into(),
            published_date: "2024-01-01".into(),
        };

        assert!(!store.exists("h1").await.unwrap());
        store.insert(&a).await.unwrap();
        assert!(store.exists("h1").await.unwrap());
        assert_eq!(store.get("h1").await.unwrap(), Some(a));
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = test_store().await;
        store.insert(&article("h1", "First", "one")).await.unwrap();

        let err = store
            .insert(&article("h1", "Second", "two"))
            .await
            .unwrap_err();
        assert!(err.is_duplicate_key());

        let stored = store.get("h1").await.unwrap().unwrap();
        assert_eq!(stored.title, "First");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn list_recent_newest_first() {
        let store = test_store().await;
        for id in ["a", "b", "c"] {
            store.insert(&article(id, id, "body")).await.unwrap();
        }

        let recent = store.list_recent(2, None).await.unwrap();
        let ids: Vec<_> = recent.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);

        assert_eq!(store.list_recent(10, Some("X")).await.unwrap().len(), 3);
        assert!(store.list_recent(10, Some("Y")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_matches_title_and_body() {
        let store = test_store().await;
        store
            .insert(&article("a", "Central bank raises rates", "Inflation remains high."))
            .await
            .unwrap();
        store
            .insert(&article("b", "Local team wins", "The final whistle blew."))
            .await
            .unwrap();

        let hits = store.search("rates", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");

        let hits = store.search("whistle", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Local team wins");
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let path = temp_db_path();
        let rw = ArticleStore::open(&path).await.unwrap();
        rw.insert(&article("h1", "T", "C")).await.unwrap();
        drop(rw);

        let ro = ArticleStore::open_readonly(&path).await.unwrap();
        assert_eq!(ro.count().await.unwrap(), 1);
        assert!(ro.insert(&article("h2", "T", "C")).await.is_err());
        assert!(ro.insert_ingest_run().await.is_err());
    }

    #[tokio::test]
    async fn readonly_requires_existing_file() {
        assert!(ArticleStore::open_readonly(&temp_db_path()).await.is_err());
    }

    #[tokio::test]
    async fn ingest_run_lifecycle() {
        let store = test_store().await;
        let id = store.insert_ingest_run().await.unwrap();

        let runs = store.list_ingest_runs(10).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].finished_at.is_none());

        store
            .finish_ingest_run(&id, r#"{"inserted":2}"#)
            .await
            .unwrap();
        let runs = store.list_ingest_runs(10).await.unwrap();
        assert_eq!(runs[0].id, id);
        assert!(runs[0].finished_at.is_some());
        assert_eq!(runs[0].stats_json.as_deref(), Some(r#"{"inserted":2}"#));
    }

    #[tokio::test]
    async fn row_errors_propagate() {
        let store = test_store().await;
        assert!(!store.exists("missing").await.unwrap());
        assert!(store.get("missing").await.unwrap().is_none());

        // A view whose id overflows when evaluated fails while stepping rows.
        store
            .conn
            .execute_batch(
                "DROP TABLE articles;
                 CREATE VIEW articles AS SELECT
                     abs(-9223372036854775807 - 1) AS id, '' AS source_name, '' AS url,
                     '' AS title, '' AS content, '' AS published_date;",
            )
            .await
            .unwrap();

        assert!(matches!(
            store.exists("h1").await,
            Err(FeedwireError::Storage(_))
        ));
        assert!(matches!(store.get("h1").await, Err(FeedwireError::Storage(_))));
    }
}
