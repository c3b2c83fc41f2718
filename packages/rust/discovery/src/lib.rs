//! Feed discovery and feed fetching.
//!
//! Before a source can be ingested we need a URL that actually serves a
//! feed. [`probe`] walks the source's base URL and a short list of
//! conventional feed paths and keeps the first one that parses into a feed
//! with at least one entry (linked or not).

mod parser;

use feedwire_crawler::Fetcher;
use feedwire_shared::{AuditConfig, FailureKind, FeedwireError, Result};
use tracing::{debug, info, instrument};

pub use parser::{FeedEntry, ParsedFeed, parse_feed};

// ---------------------------------------------------------------------------
// ProbeAttempt
// ---------------------------------------------------------------------------

/// Outcome of checking a single candidate URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeAttempt {
    /// The candidate served a feed with at least one entry.
    Found(String),
    /// The candidate answered, but not with a usable feed.
    NotFound,
    /// The request failed; the scan moves on.
    Transient(FailureKind),
}

// ---------------------------------------------------------------------------
// Probe options
// ---------------------------------------------------------------------------

/// Configuration for the probe.
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    /// Suffixes tried after the base URL, in order.
    pub feed_paths: Vec<String>,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self::from(&AuditConfig::default())
    }
}

impl From<&AuditConfig> for ProbeOptions {
    fn from(config: &AuditConfig) -> Self {
        Self {
            feed_paths: config.feed_paths.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Main entry points
// ---------------------------------------------------------------------------

/// Find a working feed for `base_url`.
///
/// Candidates are checked strictly in order and the scan stops at the first
/// hit, so a base URL that is itself a feed costs exactly one request.
#[instrument(skip_all, fields(base_url = %base_url))]
pub async fn probe(fetcher: &dyn Fetcher, base_url: &str, opts: &ProbeOptions) -> Option<String> {
    for candidate in candidate_urls(base_url, &opts.feed_paths) {
        match probe_candidate(fetcher, &candidate).await {
            ProbeAttempt::Found(url) => {
                info!(feed_url = %url, "verified feed");
                return Some(url);
            }
            ProbeAttempt::NotFound => {}
            ProbeAttempt::Transient(kind) => {
                debug!(%candidate, %kind, "candidate failed, continuing");
            }
        }
    }
    debug!("no feed found");
    None
}

/// Check one candidate URL.
pub async fn probe_candidate(fetcher: &dyn Fetcher, url: &str) -> ProbeAttempt {
    let response = match fetcher.get(url).await {
        Ok(r) => r,
        Err(e) => return ProbeAttempt::Transient(e.kind),
    };

    if !response.is_ok() {
        return ProbeAttempt::NotFound;
    }

    match parse_feed(&response.body) {
        // Entries without a link still prove the URL serves a feed.
        Ok(feed) if feed.entries.len() + feed.skipped > 0 => {
            ProbeAttempt::Found(url.to_string())
        }
        Ok(_) => ProbeAttempt::NotFound,
        Err(e) => {
            debug!(url, error = %e, "candidate body is not a feed");
            ProbeAttempt::NotFound
        }
    }
}

/// Fetch and parse a feed that is expected to exist.
#[instrument(skip(fetcher))]
pub async fn fetch_feed(fetcher: &dyn Fetcher, url: &str) -> Result<ParsedFeed> {
    let response = fetcher
        .get(url)
        .await
        .map_err(|e| FeedwireError::Network(e.to_string()))?;

    if !response.is_ok() {
        return Err(FeedwireError::Network(format!(
            "{url}: HTTP {}",
            response.status
        )));
    }

    parse_feed(&response.body)
}

/// The base URL followed by each suffix appended to the slash-trimmed base.
pub fn candidate_urls(base_url: &str, feed_paths: &[String]) -> Vec<String> {
    let trimmed = base_url.trim_end_matches('/');
    std::iter::once(base_url.to_string())
        .chain(feed_paths.iter().map(|p| format!("{trimmed}{p}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedwire_crawler::{HttpFetcher, StaticFetcher};
    use feedwire_shared::HttpConfig;

    const FEED: &str = r#"<rss version="2.0"><channel><title>Wire</title>
        <item><title>One</title><link>https://example.com/1</link></item>
    </channel></rss>"#;

    const EMPTY_FEED: &str = r#"<rss version="2.0"><channel><title>Wire</title></channel></rss>"#;

    fn paths() -> ProbeOptions {
        ProbeOptions::default()
    }

    #[test]
    fn candidates_strip_trailing_slash() {
        let c = candidate_urls("https://example.com/", &paths().feed_paths);
        assert_eq!(
            c,
            vec![
                "https://example.com/",
                "https://example.com/feed",
                "https://example.com/rss",
                "https://example.com/rss.xml",
                "https://example.com/feed.xml",
                "https://example.com/index.xml",
            ]
        );
    }

    #[tokio::test]
    async fn root_feed_short_circuits() {
        let fetcher = StaticFetcher::new().respond("https://example.com", 200, FEED);

        let found = probe(&fetcher, "https://example.com", &paths()).await;

        assert_eq!(found.as_deref(), Some("https://example.com"));
        assert_eq!(fetcher.calls(), vec!["https://example.com"]);
    }

    #[tokio::test]
    async fn first_matching_suffix_wins() {
        let fetcher = StaticFetcher::new()
            .respond("https://example.com", 200, "<html><body>home</body></html>")
            .fail("https://example.com/feed", FailureKind::Timeout)
            .respond("https://example.com/rss", 200, EMPTY_FEED)
            .respond("https://example.com/rss.xml", 200, FEED)
            .respond("https://example.com/feed.xml", 200, FEED);

        let found = probe(&fetcher, "https://example.com", &paths()).await;

        assert_eq!(found.as_deref(), Some("https://example.com/rss.xml"));
        assert_eq!(fetcher.call_count("https://example.com/feed.xml"), 0);
        assert_eq!(fetcher.calls().len(), 4);
    }

    #[tokio::test]
    async fn feed_with_linkless_items_still_verifies() {
        let xml = r#"<rss version="2.0"><channel><title>Bulletin</title>
            <item><title>Notice</title><description>No permalink here.</description></item>
        </channel></rss>"#;
        let fetcher = StaticFetcher::new().respond("https://x.example", 200, xml);

        let found = probe(&fetcher, "https://x.example", &paths()).await;

        assert_eq!(found.as_deref(), Some("https://x.example"));
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn non_200_is_not_a_match() {
        let fetcher = StaticFetcher::new().respond("https://example.com/feed", 201, FEED);

        let found = probe(&fetcher, "https://example.com", &paths()).await;

        assert!(found.is_none());
        assert_eq!(fetcher.calls().len(), 6);
    }

    #[tokio::test]
    async fn attempt_classification() {
        let fetcher = StaticFetcher::new()
            .respond("http://a/", 200, FEED)
            .respond("http://b/", 200, "not xml at all")
            .fail("http://c/", FailureKind::Connection);

        assert_eq!(
            probe_candidate(&fetcher, "http://a/").await,
            ProbeAttempt::Found("http://a/".into())
        );
        assert_eq!(probe_candidate(&fetcher, "http://b/").await, ProbeAttempt::NotFound);
        assert_eq!(
            probe_candidate(&fetcher, "http://c/").await,
            ProbeAttempt::Transient(FailureKind::Connection)
        );
        assert_eq!(probe_candidate(&fetcher, "http://d/").await, ProbeAttempt::NotFound);
    }

    #[tokio::test]
    async fn probe_with_mock_server() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("<html></html>"))
            .expect(1)
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/feed"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/rss"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(FEED))
            .expect(1)
            .mount(&server)
            .await;

        // Never reached once /rss matches.
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/rss.xml"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(FEED))
            .expect(0)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&HttpConfig::default()).unwrap();
        let base = format!("{}/", server.uri());
        let found = probe(&fetcher, &base, &paths()).await;

        assert_eq!(found, Some(format!("{}/rss", server.uri())));
    }

    #[tokio::test]
    async fn fetch_feed_rejects_non_200() {
        let fetcher = StaticFetcher::new()
            .respond("http://a/rss", 200, FEED)
            .respond("http://b/rss", 500, FEED);

        let feed = fetch_feed(&fetcher, "http://a/rss").await.unwrap();
        assert_eq!(feed.entries.len(), 1);

        let err = fetch_feed(&fetcher, "http://b/rss").await.unwrap_err();
        assert!(err.to_string().contains("HTTP 500"));
    }
}
