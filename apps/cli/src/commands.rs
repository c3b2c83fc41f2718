//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use feedwire_core::ingest::EntryOutcome;
use feedwire_core::pipeline::{AuditOutcome, IngestOutcome, PipelineConfig, ProgressReporter};
use feedwire_crawler::{Fetcher, HttpFetcher};
use feedwire_shared::{AppConfig, AuditRecord, HttpConfig, init_config, load_config, load_config_from};
use feedwire_storage::ArticleStore;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// feedwire: find news feeds and ingest their articles.
#[derive(Parser)]
#[command(
    name = "feedwire",
    version,
    about = "Audit news sources for feeds and ingest new articles into a local store.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.feedwire/feedwire.toml).
    #[arg(long, global = true, env = "FEEDWIRE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Probe every source for a feed and classify it into an access tier.
    Audit {
        /// Source list CSV (S.No, Source Name, URL).
        #[arg(short, long)]
        sources: Option<PathBuf>,

        /// Where to write the audit table.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Maximum number of sources audited at once.
        #[arg(short, long)]
        concurrency: Option<usize>,
    },

    /// Poll the feeds of tier-1 sources and store new articles.
    Ingest {
        /// Audit table produced by `audit`.
        #[arg(short, long)]
        audit: Option<PathBuf>,

        /// Article database.
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Audit, then ingest.
    Run {
        /// Source list CSV.
        #[arg(short, long)]
        sources: Option<PathBuf>,

        /// Audit table to write.
        #[arg(short, long)]
        audit: Option<PathBuf>,

        /// Article database.
        #[arg(long)]
        db: Option<PathBuf>,

        /// Maximum number of sources audited at once.
        #[arg(short, long)]
        concurrency: Option<usize>,
    },

    /// Query stored articles.
    Articles {
        #[command(subcommand)]
        action: ArticlesAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Article query subcommands.
#[derive(Subcommand)]
pub(crate) enum ArticlesAction {
    /// Most recently ingested articles.
    List {
        #[arg(short, long, default_value = "20")]
        limit: u32,

        /// Only articles from this source name.
        #[arg(short, long)]
        source: Option<String>,

        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Full-text search over titles and bodies.
    Search {
        /// FTS5 query, e.g. `inflation AND rates`.
        query: String,

        #[arg(short, long, default_value = "20")]
        limit: u32,

        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Past ingestion runs and their counters.
    Runs {
        #[arg(short, long, default_value = "10")]
        limit: u32,

        #[arg(long)]
        db: Option<PathBuf>,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "feedwire=info",
        1 => "feedwire=debug",
        _ => "feedwire=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    // Must work even when the existing config file is broken.
    if matches!(
        cli.command,
        Command::Config {
            action: ConfigAction::Init
        }
    ) {
        return cmd_config_init().await;
    }

    let config = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Command::Audit {
            sources,
            out,
            concurrency,
        } => {
            let mut pipeline = PipelineConfig::from(&config);
            override_path(&mut pipeline.sources_csv, sources);
            override_path(&mut pipeline.audit_csv, out);
            if let Some(n) = concurrency {
                pipeline.audit.concurrency = n.max(1);
            }
            cmd_audit(&config, &pipeline).await
        }
        Command::Ingest { audit, db } => {
            let mut pipeline = PipelineConfig::from(&config);
            override_path(&mut pipeline.audit_csv, audit);
            override_path(&mut pipeline.db_path, db);
            cmd_ingest(&config, &pipeline).await
        }
        Command::Run {
            sources,
            audit,
            db,
            concurrency,
        } => {
            let mut pipeline = PipelineConfig::from(&config);
            override_path(&mut pipeline.sources_csv, sources);
            override_path(&mut pipeline.audit_csv, audit);
            override_path(&mut pipeline.db_path, db);
            if let Some(n) = concurrency {
                pipeline.audit.concurrency = n.max(1);
            }
            cmd_run(&config, &pipeline).await
        }
        Command::Articles { action } => match action {
            ArticlesAction::List { limit, source, db } => {
                cmd_articles_list(&db_path(&config, db), limit, source.as_deref()).await
            }
            ArticlesAction::Search { query, limit, db } => {
                cmd_articles_search(&db_path(&config, db), &query, limit).await
            }
            ArticlesAction::Runs { limit, db } => {
                cmd_articles_runs(&db_path(&config, db), limit).await
            }
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(&config).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

fn override_path(target: &mut PathBuf, value: Option<PathBuf>) {
    if let Some(v) = value {
        *target = v;
    }
}

fn db_path(config: &AppConfig, flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| PathBuf::from(&config.storage.db_path))
}

fn build_fetcher(config: &AppConfig) -> Result<Arc<dyn Fetcher>> {
    let fetcher = HttpFetcher::new(&HttpConfig::from(config))?;
    Ok(Arc::new(fetcher))
}

// ---------------------------------------------------------------------------
// Pipeline commands
// ---------------------------------------------------------------------------

async fn cmd_audit(config: &AppConfig, pipeline: &PipelineConfig) -> Result<()> {
    info!(
        sources = %pipeline.sources_csv.display(),
        out = %pipeline.audit_csv.display(),
        concurrency = pipeline.audit.concurrency,
        "auditing sources"
    );

    let fetcher = build_fetcher(config)?;
    let reporter = Arc::new(CliProgress::new());
    let outcome = feedwire_core::pipeline::run_audit(pipeline, fetcher, reporter).await?;

    print_audit_summary(&outcome, &pipeline.audit_csv);
    Ok(())
}

async fn cmd_ingest(config: &AppConfig, pipeline: &PipelineConfig) -> Result<()> {
    info!(
        audit = %pipeline.audit_csv.display(),
        db = %pipeline.db_path.display(),
        "ingesting articles"
    );

    let fetcher = build_fetcher(config)?;
    let reporter = CliProgress::new();
    let outcome =
        feedwire_core::pipeline::run_ingest(pipeline, fetcher.as_ref(), &reporter).await?;
    drop(reporter);

    print_ingest_summary(&outcome, &pipeline.db_path);
    Ok(())
}

async fn cmd_run(config: &AppConfig, pipeline: &PipelineConfig) -> Result<()> {
    let fetcher = build_fetcher(config)?;
    let reporter = Arc::new(CliProgress::new());
    let (audit, ingest) = feedwire_core::pipeline::run(pipeline, fetcher, reporter).await?;

    print_audit_summary(&audit, &pipeline.audit_csv);
    print_ingest_summary(&ingest, &pipeline.db_path);
    Ok(())
}

fn print_audit_summary(outcome: &AuditOutcome, out: &Path) {
    let s = &outcome.summary;
    println!();
    println!("  Audit complete!");
    println!("  Sources:        {}", s.total);
    println!("  TIER_1_RSS:     {}", s.rss);
    println!("  TIER_2_STATIC:  {}", s.static_fetch);
    println!("  TIER_3_BROWSER: {}", s.browser);
    println!("  Table:          {}", out.display());
    println!("  Time:           {:.1}s", outcome.elapsed.as_secs_f64());
    println!();
}

fn print_ingest_summary(outcome: &IngestOutcome, db: &Path) {
    let r = &outcome.report;
    println!();
    println!("  Ingestion complete!");
    println!("  Feeds:       {} ({} unavailable)", r.sources, r.feed_errors);
    println!("  Entries:     {}", r.entries);
    println!("  Inserted:    {}", r.inserted);
    println!("  Duplicates:  {}", r.skipped_duplicate);
    println!("  Empty:       {}", r.skipped_empty);
    println!("  Unreachable: {}", r.failed_fetch);
    println!("  Stored:      {} ({})", outcome.total_articles, db.display());
    println!("  Time:        {:.1}s", outcome.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn source_audited(&self, record: &AuditRecord, current: usize, total: usize) {
        self.spinner.set_message(format!(
            "Auditing [{current}/{total}] {} → {}",
            record.name, record.final_tier
        ));
    }

    fn entry_processed(&self, source: &str, outcome: EntryOutcome, current: usize, total: usize) {
        let label = match outcome {
            EntryOutcome::Inserted => "new",
            EntryOutcome::Duplicate => "seen",
            EntryOutcome::Empty => "empty",
            EntryOutcome::FetchFailed => "unreachable",
        };
        self.spinner
            .set_message(format!("{source} [{current}/{total}] {label}"));
    }

    // `run` reports two stages through one reporter; keep ticking until dropped.
    fn done(&self, message: &str) {
        self.spinner.set_message(message.to_string());
        info!("{message}");
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Article queries
// ---------------------------------------------------------------------------

async fn cmd_articles_list(db: &Path, limit: u32, source: Option<&str>) -> Result<()> {
    let store = ArticleStore::open_readonly(db).await?;
    let articles = store.list_recent(limit, source).await?;

    if articles.is_empty() {
        println!("No articles stored.");
        return Ok(());
    }

    for a in &articles {
        let date = if a.published_date.is_empty() {
            "-"
        } else {
            a.published_date.get(..10).unwrap_or(&a.published_date)
        };
        println!("{}  {:<10}  {:<20}  {}", short_id(&a.id), date, a.source_name, a.title);
        println!("              {}", a.url);
    }
    println!();
    println!("  {} of {} articles", articles.len(), store.count().await?);
    Ok(())
}

async fn cmd_articles_search(db: &Path, query: &str, limit: u32) -> Result<()> {
    let store = ArticleStore::open_readonly(db).await?;
    let hits = store
        .search(query, limit)
        .await
        .map_err(|e| eyre!("search for '{query}' failed: {e}"))?;

    if hits.is_empty() {
        println!("No matches for '{query}'.");
        return Ok(());
    }

    for hit in &hits {
        println!(
            "{}  {:>7.2}  {:<20}  {}",
            short_id(&hit.id),
            hit.score,
            hit.source_name,
            hit.title
        );
        println!("              {}", hit.url);
    }
    Ok(())
}

async fn cmd_articles_runs(db: &Path, limit: u32) -> Result<()> {
    let store = ArticleStore::open_readonly(db).await?;
    let runs = store.list_ingest_runs(limit).await?;

    if runs.is_empty() {
        println!("No ingestion runs recorded.");
        return Ok(());
    }

    for run in &runs {
        println!(
            "{}  started {}  finished {}",
            run.id,
            run.started_at,
            run.finished_at.as_deref().unwrap_or("(incomplete)")
        );
        if let Some(stats) = &run.stats_json {
            println!("    {stats}");
        }
    }
    Ok(())
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinner_survives_stage_completion() {
        let reporter = CliProgress::new();
        reporter.phase("Auditing sources");
        reporter.done("Audit complete");
        assert!(!reporter.spinner.is_finished());

        reporter.phase("Ingesting articles");
        assert_eq!(reporter.spinner.message(), "Ingesting articles");

        let spinner = reporter.spinner.clone();
        drop(reporter);
        assert!(spinner.is_finished());
    }
}
