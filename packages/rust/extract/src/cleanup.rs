//! Markdown-to-text cleanup pipeline.
//!
//! Each cleanup pass is a function `&str -> String` applied in sequence. The
//! result is plain paragraphs separated by single blank lines.

use std::sync::LazyLock;

use regex::Regex;

/// Remove inline formatting tags from HTML, keeping their text.
///
/// Runs before Markdown conversion so emphasis and links never turn into
/// Markdown syntax in the first place.
pub(crate) fn unwrap_inline_tags(html: &str) -> String {
    static INLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?i)</?(?:a|abbr|b|cite|em|font|i|mark|q|small|span|strong|sub|sup|time|u)(?:\s[^>]*)?>",
        )
        .expect("valid regex")
    });

    INLINE_RE.replace_all(html, "").to_string()
}

/// Run the full cleanup pipeline on converted Markdown.
pub(crate) fn to_plain_text(md: &str) -> String {
    let mut result = md.to_string();

    result = strip_heading_markers(&result);
    result = strip_rules(&result);
    result = strip_images(&result);
    result = unwrap_links(&result);
    result = unescape_markdown(&result);
    result = strip_leftover_html(&result);
    result = normalize_whitespace(&result);
    result = clean_blank_lines(&result);

    result.trim().to_string()
}

// ---------------------------------------------------------------------------
// Pass 1: Heading markers
// ---------------------------------------------------------------------------

/// `## Title` becomes `Title`.
fn strip_heading_markers(md: &str) -> String {
    static H_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^[ \t]*#{1,6}[ \t]+").expect("valid regex"));

    H_RE.replace_all(md, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 2: Horizontal rules and setext underlines
// ---------------------------------------------------------------------------

fn strip_rules(md: &str) -> String {
    static RULE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^[ \t]*(?:=+|-{3,}|\*{3,}|_{3,}|(?:\* ){2,}\*)[ \t]*$").expect("valid regex")
    });

    md.lines()
        .filter(|line| !RULE_RE.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 3: Images
// ---------------------------------------------------------------------------

fn strip_images(md: &str) -> String {
    static IMG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("valid regex"));

    IMG_RE.replace_all(md, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 4: Links
// ---------------------------------------------------------------------------

/// `[text](url)` becomes `text`.
fn unwrap_links(md: &str) -> String {
    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid regex"));

    LINK_RE.replace_all(md, "$1").to_string()
}

// ---------------------------------------------------------------------------
// Pass 5: Markdown escapes
// ---------------------------------------------------------------------------

/// Drop backslash escapes the converter adds in front of punctuation.
fn unescape_markdown(md: &str) -> String {
    static ESCAPE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\\([\\`*_{}\[\]()#+\-.!>|~])").expect("valid regex")
    });

    ESCAPE_RE.replace_all(md, "$1").to_string()
}

// ---------------------------------------------------------------------------
// Pass 6: Strip leftover HTML tags
// ---------------------------------------------------------------------------

/// Remove stray tags that survived the conversion, preserving inner text.
fn strip_leftover_html(md: &str) -> String {
    static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"</?[a-zA-Z][a-zA-Z0-9-]*(?:\s[^>]*)?/?>").expect("valid regex")
    });

    HTML_TAG_RE.replace_all(md, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 7: Normalize whitespace
// ---------------------------------------------------------------------------

/// Collapse runs of spaces/tabs and trim every line.
fn normalize_whitespace(md: &str) -> String {
    static SPACE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").expect("valid regex"));

    md.lines()
        .map(|line| SPACE_RE.replace_all(line.trim(), " ").to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 8: Clean up excessive blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of blank lines into exactly one.
fn clean_blank_lines(md: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(md, "\n\n").to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
