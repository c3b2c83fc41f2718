//! RSS / Atom / JSON Feed parsing.
//!
//! Wraps `feed-rs` and flattens each entry into the three fields the
//! ingester needs: link, title, and publication date.

use feedwire_shared::{FeedwireError, Result};
use tracing::warn;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Parsed representation of a syndication feed.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    /// Feed-level title, if any.
    pub title: Option<String>,
    /// Entries in document order.
    pub entries: Vec<FeedEntry>,
    /// Entries dropped because they carried no usable link.
    pub skipped: usize,
}

/// A single feed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    /// Article URL.
    pub link: String,
    /// Entry title, empty when absent.
    pub title: String,
    /// RFC 3339 publication date, empty when absent.
    pub published: String,
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse raw feed bytes.
///
/// Errors only when the document is not a recognisable feed. Entries without
/// a link are counted in [`ParsedFeed::skipped`] and left out.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed> {
    let feed = feed_rs::parser::parse(bytes)
        .map_err(|e| FeedwireError::parse(format!("not a feed: {e}")))?;

    let mut entries = Vec::with_capacity(feed.entries.len());
    let mut skipped = 0;

    for entry in feed.entries {
        let link = entry
            .links
            .iter()
            .find(|l| l.rel.as_deref().is_none_or(|rel| rel == "alternate"))
            .or_else(|| entry.links.first())
            .map(|l| l.href.trim().to_string())
            .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()));

        let Some(link) = link.filter(|l| !l.is_empty()) else {
            warn!(entry_id = %entry.id, "feed entry has no link, skipping");
            skipped += 1;
            continue;
        };

        entries.push(FeedEntry {
            link,
            title: entry
                .title
                .map(|t| t.content.trim().to_string())
                .unwrap_or_default(),
            published: entry
                .published
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_default(),
        });
    }

    Ok(ParsedFeed {
        title: feed.title.map(|t| t.content),
        entries,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example Wire</title>
    <link>https://example.com</link>
    <description>News</description>
    <item>
      <title>First story</title>
      <link>https://example.com/news/1</link>
      <pubDate>Mon, 01 Jan 2024 10:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Second story</title>
      <link>https://example.com/news/2</link>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Wire</title>
  <id>urn:uuid:60a76c80-d399-11d9-b93C-0003939e0af6</id>
  <updated>2024-02-01T12:00:00Z</updated>
  <entry>
    <title>Atom story</title>
    <link rel="alternate" href="https://atom.example.com/a"/>
    <link rel="enclosure" href="https://atom.example.com/a.mp3"/>
    <id>urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a</id>
    <updated>2024-02-01T12:00:00Z</updated>
  </entry>
</feed>"#;

    #[test]
    fn parse_rss_entries() {
        let feed = parse_feed(RSS.as_bytes()).unwrap();
        assert_eq!(feed.title.as_deref(), Some("Example Wire"));
        assert_eq!(feed.entries.len(), 2);
        assert_eq!(feed.entries[0].link, "https://example.com/news/1");
        assert_eq!(feed.entries[0].title, "First story");
        assert!(feed.entries[0].published.starts_with("2024-01-01T10:00:00"));
        assert_eq!(feed.entries[1].published, "");
    }

    #[test]
    fn parse_atom_prefers_alternate_link() {
        let feed = parse_feed(ATOM.as_bytes()).unwrap();
        assert_eq!(feed.entries.len(), 1);
        assert_eq!(feed.entries[0].link, "https://atom.example.com/a");
        // Atom <updated> is not a publication date.
        assert_eq!(feed.entries[0].published, "");
    }

    #[test]
    fn entries_without_link_are_skipped() {
        let xml = r#"<rss version="2.0"><channel><title>t</title>
            <item><title>No link</title><guid isPermaLink="false">abc</guid></item>
            <item><title>Linked</title><link>https://example.com/x</link></item>
        </channel></rss>"#;
        let feed = parse_feed(xml.as_bytes()).unwrap();
        assert_eq!(feed.entries.len(), 1);
        assert_eq!(feed.skipped, 1);
    }

    #[test]
    fn html_is_not_a_feed() {
        let html = "<html><head><title>Home</title></head><body><p>hi</p></body></html>";
        let parsed = parse_feed(html.as_bytes());
        assert!(parsed.map(|f| f.entries.is_empty()).unwrap_or(true));
    }
}
