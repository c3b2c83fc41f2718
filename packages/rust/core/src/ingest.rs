//! Ingestion Pipeline: poll tier-1 feeds and store new articles.
//!
//! Strictly sequential: sources in table order, entries in feed order. The
//! `exists` check runs before any page is fetched, and the store's own
//! duplicate rejection is treated as a skip.

use feedwire_crawler::Fetcher;
use feedwire_discovery::FeedEntry;
use feedwire_shared::{Article, AuditRecord, FeedwireError, Result, Tier, url_hash};
use feedwire_storage::ArticleStore;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::pipeline::ProgressReporter;

/// Counters for one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Tier-1 sources processed.
    pub sources: usize,
    /// Feed entries seen across all sources.
    pub entries: usize,
    pub inserted: usize,
    pub skipped_duplicate: usize,
    /// Page fetched but extraction produced no text.
    pub skipped_empty: usize,
    /// Page could not be fetched (transport failure or non-200).
    pub failed_fetch: usize,
    /// Feeds that could not be fetched or parsed.
    pub feed_errors: usize,
}

/// What happened to a single feed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    Inserted,
    Duplicate,
    Empty,
    FetchFailed,
}

impl IngestReport {
    fn record(&mut self, outcome: EntryOutcome) {
        self.entries += 1;
        match outcome {
            EntryOutcome::Inserted => self.inserted += 1,
            EntryOutcome::Duplicate => self.skipped_duplicate += 1,
            EntryOutcome::Empty => self.skipped_empty += 1,
            EntryOutcome::FetchFailed => self.failed_fetch += 1,
        }
    }
}

/// Ingest every `TIER_1_RSS` record into `store`.
///
/// Only store failures other than duplicates abort the run; everything that
/// goes wrong with a feed or a page is logged and skipped.
#[instrument(skip_all, fields(records = records.len()))]
pub async fn ingest(
    fetcher: &dyn Fetcher,
    records: &[AuditRecord],
    store: &ArticleStore,
    progress: &dyn ProgressReporter,
) -> Result<IngestReport> {
    let run_id = store.insert_ingest_run().await?;
    let mut report = IngestReport::default();

    let tier1: Vec<_> = records
        .iter()
        .filter(|r| r.final_tier == Tier::Rss)
        .collect();
    info!(%run_id, sources = tier1.len(), "starting ingestion");

    for (i, record) in tier1.iter().enumerate() {
        report.sources += 1;
        progress.phase(&format!("[{}/{}] {}", i + 1, tier1.len(), record.name));

        let Some(feed_url) = record.verified_feed_url.as_deref() else {
            warn!(name = %record.name, "tier-1 record has no feed URL, skipping");
            report.feed_errors += 1;
            continue;
        };

        let feed = match feedwire_discovery::fetch_feed(fetcher, feed_url).await {
            Ok(feed) => feed,
            Err(e) => {
                warn!(name = %record.name, feed_url, error = %e, "feed unavailable, skipping source");
                report.feed_errors += 1;
                continue;
            }
        };

        let total = feed.entries.len();
        debug!(name = %record.name, entries = total, "feed fetched");

        for (n, entry) in feed.entries.iter().enumerate() {
            let outcome = ingest_entry(fetcher, store, &record.name, entry).await?;
            report.record(outcome);
            progress.entry_processed(&record.name, outcome, n + 1, total);
        }
    }

    let stats = serde_json::to_string(&report)
        .map_err(|e| FeedwireError::Storage(format!("failed to encode run stats: {e}")))?;
    store.finish_ingest_run(&run_id, &stats).await?;

    info!(
        %run_id,
        sources = report.sources,
        entries = report.entries,
        inserted = report.inserted,
        skipped_duplicate = report.skipped_duplicate,
        skipped_empty = report.skipped_empty,
        failed_fetch = report.failed_fetch,
        feed_errors = report.feed_errors,
        "ingestion complete"
    );
    Ok(report)
}

/// Process one feed entry.
pub async fn ingest_entry(
    fetcher: &dyn Fetcher,
    store: &ArticleStore,
    source_name: &str,
    entry: &FeedEntry,
) -> Result<EntryOutcome> {
    let id = url_hash(&entry.link);

    if store.exists(&id).await? {
        debug!(url = %entry.link, %id, "already stored, skipping");
        return Ok(EntryOutcome::Duplicate);
    }

    let page = match fetcher.get(&entry.link).await {
        Ok(page) if page.is_ok() => page,
        Ok(page) => {
            warn!(url = %entry.link, status = page.status, "article page not available");
            return Ok(EntryOutcome::FetchFailed);
        }
        Err(e) => {
            warn!(url = %entry.link, kind = %e.kind, error = %e.message, "article fetch failed");
            return Ok(EntryOutcome::FetchFailed);
        }
    };

    let extracted = match feedwire_extract::extract(&page.text(), &entry.link) {
        Ok(Some(extracted)) => extracted,
        Ok(None) => {
            warn!(url = %entry.link, "no article text extracted, skipping");
            return Ok(EntryOutcome::Empty);
        }
        Err(e) => {
            warn!(url = %entry.link, error = %e, "extraction failed, skipping");
            return Ok(EntryOutcome::Empty);
        }
    };

    if entry.title.is_empty() {
        debug!(url = %entry.link, headline = ?extracted.title, "entry has no title, storing it empty");
    }

    let article = Article {
        id,
        source_name: source_name.to_string(),
        url: entry.link.clone(),
        title: entry.title.clone(),
        content: extracted.text,
        published_date: entry.published.clone(),
    };

    match store.insert(&article).await {
        Ok(()) => {
            info!(source = source_name, title = %article.title, words = extracted.word_count, "inserted article");
            Ok(EntryOutcome::Inserted)
        }
        Err(e) if e.is_duplicate_key() => {
            debug!(url = %entry.link, "inserted concurrently, skipping");
            Ok(EntryOutcome::Duplicate)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SilentProgress;
    use feedwire_crawler::StaticFetcher;
    use feedwire_shared::{AccessStatus, SourceRecord};

    const FEED_URL: &str = "https://wire.example/rss";
    const LINK_A: &str = "https://wire.example/a";
    const LINK_B: &str = "https://wire.example/b";

    fn feed() -> String {
        format!(
            r#"<rss version="2.0"><channel><title>Wire</title>
            <item><title>Story A</title><link>{LINK_A}</link></item>
            <item><title>Story B</title><link>{LINK_B}</link>
                <pubDate>Mon, 01 Jan 2024 10:00:00 GMT</pubDate></item>
            </channel></rss>"#
        )
    }

    fn page(text: &str) -> String {
        format!("<html><body><article><p>{text}</p></article></body></html>")
    }

    fn tier1_record() -> AuditRecord {
        let source = SourceRecord {
            serial: 1,
            name: "Wire".into(),
            url: "https://wire.example".into(),
        };
        AuditRecord::new(&source, Some(FEED_URL.into()), AccessStatus::Accessible)
    }

    async fn temp_store() -> ArticleStore {
        let path =
            std::env::temp_dir().join(format!("feedwire_ingest_{}.db", uuid::Uuid::now_v7()));
        ArticleStore::open(&path).await.unwrap()
    }

    #[tokio::test]
    async fn skips_stored_entry_and_inserts_new_one() {
        let store = temp_store().await;
        store
            .insert(&Article {
                id: url_hash(LINK_A),
                source_name: "Wire".into(),
                url: LINK_A.into(),
                title: "Story A".into(),
                content: "old".into(),
                published_date: String::new(),
            })
            .await
            .unwrap();

        let fetcher = StaticFetcher::new()
            .respond(FEED_URL, 200, feed())
            .respond(LINK_A, 200, page("Fresh A body."))
            .respond(LINK_B, 200, page("Body of story B."));

        let report = ingest(&fetcher, &[tier1_record()], &store, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.inserted, 1);
        assert_eq!(report.skipped_duplicate, 1);
        assert_eq!(store.count().await.unwrap(), 2);
        // A was never refetched.
        assert_eq!(fetcher.call_count(LINK_A), 0);

        let b = store.get(&url_hash(LINK_B)).await.unwrap().unwrap();
        assert_eq!(b.url, LINK_B);
        assert_eq!(b.title, "Story B");
        assert_eq!(b.content, "Body of story B.");
        assert_eq!(b.source_name, "Wire");
        assert!(b.published_date.starts_with("2024-01-01"));

        let a = store.get(&url_hash(LINK_A)).await.unwrap().unwrap();
        assert_eq!(a.content, "old");
    }

    #[tokio::test]
    async fn second_run_inserts_nothing() {
        let store = temp_store().await;
        let fetcher = StaticFetcher::new()
            .respond(FEED_URL, 200, feed())
            .respond(LINK_A, 200, page("A body."))
            .respond(LINK_B, 200, page("B body."));
        let records = [tier1_record()];

        let first = ingest(&fetcher, &records, &store, &SilentProgress).await.unwrap();
        assert_eq!(first.inserted, 2);

        let second = ingest(&fetcher, &records, &store, &SilentProgress).await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped_duplicate, 2);
        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(store.list_ingest_runs(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_extraction_and_failed_fetch_are_skipped() {
        let store = temp_store().await;
        let fetcher = StaticFetcher::new()
            .respond(FEED_URL, 200, feed())
            .respond(LINK_A, 200, "<html><body><nav>Home</nav></body></html>")
            .respond(LINK_B, 503, "");

        let report = ingest(&fetcher, &[tier1_record()], &store, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.entries, 2);
        assert_eq!(report.skipped_empty, 1);
        assert_eq!(report.failed_fetch, 1);
        assert_eq!(report.inserted, 0);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn only_tier1_records_are_polled() {
        let store = temp_store().await;
        let source = SourceRecord {
            serial: 2,
            name: "Static".into(),
            url: "https://static.example".into(),
        };
        let records = [
            AuditRecord::new(&source, None, AccessStatus::Accessible),
            AuditRecord::new(&source, None, AccessStatus::Blocked(403)),
        ];
        let fetcher = StaticFetcher::new();

        let report = ingest(&fetcher, &records, &store, &SilentProgress).await.unwrap();

        assert_eq!(report, IngestReport::default());
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn broken_feed_does_not_stop_other_sources() {
        let store = temp_store().await;
        let broken = SourceRecord {
            serial: 1,
            name: "Broken".into(),
            url: "https://broken.example".into(),
        };
        let records = [
            AuditRecord::new(
                &broken,
                Some("https://broken.example/rss".into()),
                AccessStatus::Accessible,
            ),
            tier1_record(),
        ];
        let fetcher = StaticFetcher::new()
            .respond("https://broken.example/rss", 500, "")
            .respond(FEED_URL, 200, feed())
            .respond(LINK_A, 200, page("A body."))
            .respond(LINK_B, 200, page("B body."));

        let report = ingest(&fetcher, &records, &store, &SilentProgress).await.unwrap();

        assert_eq!(report.sources, 2);
        assert_eq!(report.feed_errors, 1);
        assert_eq!(report.inserted, 2);
    }

    #[tokio::test]
    async fn untitled_entry_keeps_empty_title() {
        let store = temp_store().await;
        let feed = format!(
            r#"<rss version="2.0"><channel><title>Wire</title>
            <item><link>{LINK_A}</link><description>No headline here</description></item>
            </channel></rss>"#
        );
        let fetcher = StaticFetcher::new().respond(FEED_URL, 200, feed).respond(
            LINK_A,
            200,
            "<html><head><title>Page title</title></head><body><article>\
             <h1>Page headline</h1><p>Body of an untitled story.</p></article></body></html>",
        );

        let report = ingest(&fetcher, &[tier1_record()], &store, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(report.inserted, 1);

        let a = store.get(&url_hash(LINK_A)).await.unwrap().unwrap();
        assert_eq!(a.title, "");
        assert!(a.content.contains("Body of an untitled story."));
    }

    #[tokio::test]
    async fn rows_written_by_the_legacy_ingester_are_skipped() {
        // Layout and id (hex MD5 of the URL) as written by the earlier tool.
        let path =
            std::env::temp_dir().join(format!("feedwire_legacy_{}.db", uuid::Uuid::now_v7()));
        {
            let db = libsql::Builder::new_local(&path).build().await.unwrap();
            let conn = db.connect().unwrap();
            conn.execute_batch(&format!(
                "CREATE TABLE articles (
                     id TEXT PRIMARY KEY, source_name TEXT, url TEXT,
                     title TEXT, content TEXT, published_date TEXT
                 );
                 INSERT INTO articles VALUES
                     ('2ab845ec0b5764f9303c85dc7d1125ba', 'Wire', '{LINK_A}', 'Story A', 'legacy', NULL);"
            ))
            .await
            .unwrap();
        }

        let store = ArticleStore::open(&path).await.unwrap();
        let fetcher = StaticFetcher::new()
            .respond(FEED_URL, 200, feed())
            .respond(LINK_A, 200, page("Fresh A body."))
            .respond(LINK_B, 200, page("Body of story B."));

        let report = ingest(&fetcher, &[tier1_record()], &store, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.inserted, 1);
        assert_eq!(report.skipped_duplicate, 1);
        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(fetcher.call_count(LINK_A), 0);
    }
}
