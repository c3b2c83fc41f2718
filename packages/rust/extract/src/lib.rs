//! Article content extraction.
//!
//! Turns a fetched news page into readable body text: locate the article
//! container, strip site chrome, convert to Markdown with `htmd`, then flatten
//! the Markdown into plain text through the cleanup passes in [`cleanup`].

mod cleanup;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

use feedwire_shared::{FeedwireError, Result};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Readable content pulled out of an article page.
#[derive(Debug, Clone)]
pub struct ExtractedArticle {
    /// Main body text.
    pub text: String,
    /// Page headline (first `<h1>`, else `<title>`).
    pub title: Option<String>,
    /// Whitespace-separated word count of `text`.
    pub word_count: usize,
}

/// Containers tried in priority order when looking for the article body.
const CONTENT_SELECTORS: &[&str] = &[
    "[itemprop=\"articleBody\"]",
    "article",
    ".article-body",
    ".article-content",
    ".entry-content",
    ".post-content",
    ".story-body",
    "[role=\"main\"]",
    "main",
    "#content",
    ".content",
];

/// Elements that never belong to article text.
const CHROME_SELECTOR: &str = "nav, header, footer, aside, form, script, style, noscript, \
     iframe, svg, figure, button, .share, .social, .related, .comments, .newsletter, \
     .advert, .ad, .sidebar, .nav, .breadcrumb, [role=\"navigation\"], [aria-hidden=\"true\"]";

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Extract the article text from `html`.
///
/// Returns `Ok(None)` when the page has no readable text; that is the normal
/// "nothing to ingest" outcome, not an error.
#[instrument(skip(html), fields(url = %source_url, html_len = html.len()))]
pub fn extract(html: &str, source_url: &str) -> Result<Option<ExtractedArticle>> {
    let doc = Html::parse_document(html);
    let title = extract_title(&doc);

    let content_html = match find_content(&doc) {
        Some(el) => cleanup::unwrap_inline_tags(&strip_chrome(&el.inner_html())),
        None => return Ok(None),
    };

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec![
            "script", "style", "nav", "iframe", "noscript", "svg", "img", "figure",
        ])
        .build();

    let markdown = converter
        .convert(&content_html)
        .map_err(|e| FeedwireError::parse(format!("htmd conversion failed: {e}")))?;

    let text = cleanup::to_plain_text(&markdown);
    if text.is_empty() {
        debug!("no readable text after cleanup");
        return Ok(None);
    }

    let word_count = text.split_whitespace().count();
    debug!(word_count, text_len = text.len(), "extraction complete");

    Ok(Some(ExtractedArticle {
        text,
        title,
        word_count,
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Pick the article container.
///
/// The first selector whose match carries paragraph text wins; otherwise fall
/// back to `<body>`.
fn find_content(doc: &Html) -> Option<ElementRef<'_>> {
    for sel_str in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(sel_str) else {
            continue;
        };
        if let Some(el) = doc.select(&selector).find(|el| paragraph_chars(el) > 0) {
            return Some(el);
        }
    }

    let body_sel = Selector::parse("body").ok()?;
    doc.select(&body_sel).next()
}

/// Total characters of `<p>` text under `el`.
fn paragraph_chars(el: &ElementRef) -> usize {
    let Ok(p_sel) = Selector::parse("p") else {
        return 0;
    };
    el.select(&p_sel)
        .map(|p| p.text().map(|t| t.trim().len()).sum::<usize>())
        .sum()
}

/// Remove navigation, sharing widgets, ads, and similar chrome.
fn strip_chrome(html: &str) -> String {
    let Ok(chrome_sel) = Selector::parse(CHROME_SELECTOR) else {
        return html.to_string();
    };
    let doc = Html::parse_fragment(html);

    let mut result = html.to_string();
    for el in doc.select(&chrome_sel) {
        let outer = el.html();
        result = result.replace(&outer, "");
    }
    result
}

fn extract_title(doc: &Html) -> Option<String> {
    ["h1", "title"].iter().find_map(|sel_str| {
        let selector = Selector::parse(sel_str).ok()?;
        doc.select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://news.example.com/2024/01/story";

    #[test]
    fn extracts_article_body() {
        let html = r#"<html><head><title>Story | Example News</title></head><body>
            <header><a href="/">Example News</a></header>
            <nav><a href="/world">World</a><a href="/tech">Tech</a></nav>
            <article>
                <h1>Markets rally</h1>
                <p>Stocks rose sharply on Monday.</p>
                <div class="share"><a href="https://social.example">Share</a></div>
                <p>Analysts said the <a href="/glossary">rally</a> was <strong>broad</strong>.</p>
            </article>
            <footer><p>Copyright 2024 Example News</p></footer>
        </body></html>"#;

        let article = extract(html, URL).unwrap().expect("article text");

        assert!(article.text.contains("Stocks rose sharply on Monday."));
        assert!(article.text.contains("Analysts said the rally was broad."));
        assert!(!article.text.contains("Copyright"));
        assert!(!article.text.contains("Share"));
        assert!(!article.text.contains("World"));
        assert_eq!(article.title.as_deref(), Some("Markets rally"));
        assert!(article.word_count >= 10);
    }

    #[test]
    fn output_has_no_markup() {
        let html = r#"<html><body><main>
            <h2>Background</h2>
            <p>This is <em>plain</em> <strong>text</strong> with a <a href="https://x.example/y">link</a>.</p>
            <img src="/photo.jpg" alt="photo">
            <div class="note"><p>A note.</p></div>
        </main></body></html>"#;

        let article = extract(html, URL).unwrap().unwrap();

        assert!(!article.text.contains('<'));
        assert!(!article.text.contains("**"));
        assert!(!article.text.contains("]("));
        assert!(!article.text.contains("## "));
        assert!(article.text.contains("Background"));
        assert!(article.text.contains("A note."));
    }

    #[test]
    fn prefers_article_over_generic_main() {
        let html = r#"<html><body>
            <main>
                <div class="teasers"><p>Other story teaser.</p></div>
                <div itemprop="articleBody"><p>The real body.</p></div>
            </main>
        </body></html>"#;

        let article = extract(html, URL).unwrap().unwrap();
        assert_eq!(article.text, "The real body.");
    }

    #[test]
    fn empty_article_container_falls_through() {
        let html = r#"<html><body>
            <article></article>
            <div id="content"><p>Fallback text.</p></div>
        </body></html>"#;

        let article = extract(html, URL).unwrap().unwrap();
        assert!(article.text.contains("Fallback text."));
    }

    #[test]
    fn body_without_containers_is_used() {
        let html = "<html><body><p>Content in body.</p></body></html>";
        let article = extract(html, URL).unwrap().unwrap();
        assert_eq!(article.text, "Content in body.");
    }

    #[test]
    fn chrome_only_page_yields_nothing() {
        let html = r#"<html><head><title>Login</title></head><body>
            <nav><a href="/">Home</a></nav>
            <script>var x = 1;</script>
            <footer>Footer</footer>
        </body></html>"#;

        assert!(extract(html, URL).unwrap().is_none());
    }

    #[test]
    fn empty_document_yields_nothing() {
        assert!(extract("", URL).unwrap().is_none());
        assert!(extract("<html><body></body></html>", URL).unwrap().is_none());
    }

    #[test]
    fn title_falls_back_to_title_tag() {
        let html = "<html><head><title>Headline</title></head><body><p>Text.</p></body></html>";
        let article = extract(html, URL).unwrap().unwrap();
        assert_eq!(article.title.as_deref(), Some("Headline"));
    }
}
