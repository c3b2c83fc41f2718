//! End-to-end runs: source list → audit table → article store.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use feedwire_crawler::Fetcher;
use feedwire_shared::{AppConfig, AuditConfig, AuditRecord, Result};
use feedwire_storage::ArticleStore;

use crate::auditor::{self, AuditSummary};
use crate::ingest::{self, EntryOutcome, IngestReport};
use crate::tables;

/// File locations and audit settings for a run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Input source list.
    pub sources_csv: PathBuf,
    /// Audit table, written by the audit stage and read by ingestion.
    pub audit_csv: PathBuf,
    /// Article database.
    pub db_path: PathBuf,
    pub audit: AuditConfig,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            sources_csv: PathBuf::from(&config.paths.sources_csv),
            audit_csv: PathBuf::from(&config.paths.audit_csv),
            db_path: PathBuf::from(&config.storage.db_path),
            audit: AuditConfig::from(config),
        }
    }
}

/// Result of the audit stage.
#[derive(Debug)]
pub struct AuditOutcome {
    pub records: Vec<AuditRecord>,
    pub summary: AuditSummary,
    pub elapsed: Duration,
}

/// Result of the ingestion stage.
#[derive(Debug)]
pub struct IngestOutcome {
    pub report: IngestReport,
    /// Articles in the store after the run.
    pub total_articles: u64,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called as each source finishes auditing (in completion order).
    fn source_audited(&self, record: &AuditRecord, current: usize, total: usize);
    /// Called after each feed entry is handled.
    fn entry_processed(&self, source: &str, outcome: EntryOutcome, current: usize, total: usize);
    /// Called when a stage completes.
    fn done(&self, message: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn source_audited(&self, _record: &AuditRecord, _current: usize, _total: usize) {}
    fn entry_processed(&self, _source: &str, _outcome: EntryOutcome, _current: usize, _total: usize) {}
    fn done(&self, _message: &str) {}
}

/// Audit the source list and write the audit table.
///
/// Fails only if the source list cannot be read or the audit table cannot be
/// written.
#[instrument(skip_all, fields(sources = %config.sources_csv.display()))]
pub async fn run_audit(
    config: &PipelineConfig,
    fetcher: Arc<dyn Fetcher>,
    progress: Arc<dyn ProgressReporter>,
) -> Result<AuditOutcome> {
    let start = Instant::now();

    progress.phase("Loading source list");
    let sources = tables::read_sources(&config.sources_csv)?;

    progress.phase("Auditing sources");
    let records = auditor::audit(fetcher, sources, &config.audit, progress.clone()).await;

    progress.phase("Writing audit table");
    tables::write_audit(&config.audit_csv, &records)?;

    let summary = AuditSummary::from_records(&records);
    progress.done(&format!(
        "{} sources: {} feed, {} static, {} browser",
        summary.total, summary.rss, summary.static_fetch, summary.browser
    ));

    Ok(AuditOutcome {
        records,
        summary,
        elapsed: start.elapsed(),
    })
}

/// Read the audit table and ingest its tier-1 sources.
#[instrument(skip_all, fields(audit = %config.audit_csv.display()))]
pub async fn run_ingest(
    config: &PipelineConfig,
    fetcher: &dyn Fetcher,
    progress: &dyn ProgressReporter,
) -> Result<IngestOutcome> {
    progress.phase("Loading audit table");
    let records = tables::read_audit(&config.audit_csv)?;
    ingest_records(config, fetcher, &records, progress).await
}

/// Audit then ingest in one go, without re-reading the audit table.
pub async fn run(
    config: &PipelineConfig,
    fetcher: Arc<dyn Fetcher>,
    progress: Arc<dyn ProgressReporter>,
) -> Result<(AuditOutcome, IngestOutcome)> {
    let audit = run_audit(config, fetcher.clone(), progress.clone()).await?;
    let ingest =
        ingest_records(config, fetcher.as_ref(), &audit.records, progress.as_ref()).await?;
    Ok((audit, ingest))
}

async fn ingest_records(
    config: &PipelineConfig,
    fetcher: &dyn Fetcher,
    records: &[AuditRecord],
    progress: &dyn ProgressReporter,
) -> Result<IngestOutcome> {
    let start = Instant::now();

    progress.phase("Opening article store");
    let store = ArticleStore::open(&config.db_path).await?;

    let report = ingest::ingest(fetcher, records, &store, progress).await?;
    let total_articles = store.count().await?;

    progress.done(&format!(
        "{} new articles ({} already stored, {} total)",
        report.inserted, report.skipped_duplicate, total_articles
    ));

    let outcome = IngestOutcome {
        report,
        total_articles,
        elapsed: start.elapsed(),
    };
    info!(
        inserted = outcome.report.inserted,
        total_articles,
        elapsed_ms = outcome.elapsed.as_millis(),
        "ingest stage complete"
    );
    Ok(outcome)
}
