//! Source Auditor: probe every source for a feed and for plain reachability,
//! then tier it.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use feedwire_crawler::{Fetcher, WorkerPool};
use feedwire_discovery::ProbeOptions;
use feedwire_shared::{AccessStatus, AuditConfig, AuditRecord, FailureKind, SourceRecord, Tier};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::pipeline::ProgressReporter;

/// Per-tier counts for one audit batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuditSummary {
    pub total: usize,
    pub rss: usize,
    #[serde(rename = "static")]
    pub static_fetch: usize,
    pub browser: usize,
}

impl AuditSummary {
    pub fn from_records(records: &[AuditRecord]) -> Self {
        records.iter().fold(Self::default(), |mut acc, r| {
            acc.total += 1;
            match r.final_tier {
                Tier::Rss => acc.rss += 1,
                Tier::Static => acc.static_fetch += 1,
                Tier::Browser => acc.browser += 1,
            }
            acc
        })
    }
}

/// Audit every source under a bounded worker pool.
///
/// Returns exactly one record per input source, in input order. Network
/// failures never abort the batch: they end up in the record's access status.
#[instrument(skip_all, fields(sources = sources.len(), width = config.concurrency))]
pub async fn audit(
    fetcher: Arc<dyn Fetcher>,
    sources: Vec<SourceRecord>,
    config: &AuditConfig,
    progress: Arc<dyn ProgressReporter>,
) -> Vec<AuditRecord> {
    let pool = WorkerPool::new(config.concurrency);
    let opts = Arc::new(ProbeOptions::from(config));
    let total = sources.len();
    let completed = Arc::new(AtomicUsize::new(0));

    info!(total, "auditing sources");

    let results = {
        let progress = progress.clone();
        pool.run(sources.clone(), move |source| {
            let fetcher = fetcher.clone();
            let opts = opts.clone();
            let progress = progress.clone();
            let completed = completed.clone();
            async move {
                let record = audit_source(fetcher.as_ref(), &source, &opts).await;
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                progress.source_audited(&record, done, total);
                record
            }
        })
        .await
    };

    let records: Vec<AuditRecord> = sources
        .iter()
        .zip(results)
        .map(|(source, result)| match result {
            Ok(record) => record,
            Err(e) => {
                warn!(serial = source.serial, name = %source.name, error = %e, "audit unit failed");
                AuditRecord::new(source, None, AccessStatus::Error(FailureKind::Other))
            }
        })
        .collect();

    let summary = AuditSummary::from_records(&records);
    info!(
        total = summary.total,
        rss = summary.rss,
        static_fetch = summary.static_fetch,
        browser = summary.browser,
        "audit complete"
    );

    records
}

/// Audit one source: feed probe and reachability check run side by side.
pub async fn audit_source(
    fetcher: &dyn Fetcher,
    source: &SourceRecord,
    opts: &ProbeOptions,
) -> AuditRecord {
    let (feed_url, access_status) = tokio::join!(
        feedwire_discovery::probe(fetcher, &source.url, opts),
        check_access(fetcher, &source.url),
    );

    let record = AuditRecord::new(source, feed_url, access_status);
    debug!(
        serial = record.serial,
        name = %record.name,
        status = %record.access_status,
        tier = %record.final_tier,
        "source audited"
    );
    record
}

/// Plain GET against the base URL.
pub async fn check_access(fetcher: &dyn Fetcher, url: &str) -> AccessStatus {
    match fetcher.get(url).await {
        Ok(response) => AccessStatus::from_status(response.status),
        Err(e) => {
            debug!(url, kind = %e.kind, error = %e.message, "reachability check failed");
            AccessStatus::Error(e.kind)
        }
    }
}
