//! Core domain types: source rows, audit records, and stored articles.

use std::fmt;
use std::str::FromStr;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::error::FeedwireError;

// ---------------------------------------------------------------------------
// SourceRecord
// ---------------------------------------------------------------------------

/// One row of the input source list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Serial number, the row identity.
    #[serde(rename = "S.No")]
    pub serial: i64,
    /// Human-readable source name.
    #[serde(rename = "Source Name")]
    pub name: String,
    /// Base URL of the source.
    #[serde(rename = "URL")]
    pub url: String,
}

// ---------------------------------------------------------------------------
// FailureKind
// ---------------------------------------------------------------------------

/// Category of a request that failed before producing an HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The request did not complete within the timeout.
    Timeout,
    /// DNS, TCP, or TLS level failure.
    Connection,
    /// Redirect loop or too many redirects.
    Redirect,
    /// The response body could not be read or was too large.
    Body,
    /// Anything else (invalid URL, builder errors, ...).
    Other,
}

impl FailureKind {
    /// Label used inside `ERROR_<label>` access statuses.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "TIMEOUT",
            Self::Connection => "CONNECTION",
            Self::Redirect => "REDIRECT",
            Self::Body => "BODY",
            Self::Other => "OTHER",
        }
    }

    /// Parse a label leniently; unrecognised labels map to [`FailureKind::Other`].
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_uppercase().as_str() {
            "TIMEOUT" => Self::Timeout,
            "CONNECTION" => Self::Connection,
            "REDIRECT" => Self::Redirect,
            "BODY" => Self::Body,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AccessStatus
// ---------------------------------------------------------------------------

/// Outcome of the plain reachability GET against a source's base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum AccessStatus {
    /// HTTP 200.
    Accessible,
    /// Any other HTTP status.
    Blocked(u16),
    /// The request itself failed.
    Error(FailureKind),
}

impl AccessStatus {
    /// Classify a received HTTP status code.
    pub fn from_status(status: u16) -> Self {
        if status == 200 {
            Self::Accessible
        } else {
            Self::Blocked(status)
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.to_string().contains("BLOCKED")
    }
}

impl fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accessible => f.write_str("ACCESSIBLE"),
            Self::Blocked(code) => write!(f, "BLOCKED_{code}"),
            Self::Error(kind) => write!(f, "ERROR_{kind}"),
        }
    }
}

impl FromStr for AccessStatus {
    type Err = FeedwireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "ACCESSIBLE" {
            return Ok(Self::Accessible);
        }
        if let Some(code) = s.strip_prefix("BLOCKED_") {
            return code
                .parse::<u16>()
                .map(Self::Blocked)
                .map_err(|_| FeedwireError::validation(format!("bad blocked status: {s}")));
        }
        if let Some(kind) = s.strip_prefix("ERROR_") {
            return Ok(Self::Error(FailureKind::from_label(kind)));
        }
        Err(FeedwireError::validation(format!("unknown access status: {s}")))
    }
}

impl From<AccessStatus> for String {
    fn from(status: AccessStatus) -> Self {
        status.to_string()
    }
}

impl TryFrom<String> for AccessStatus {
    type Error = FeedwireError;

    fn try_from(value: String) -> Result<Self, FeedwireError> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

/// Coarse classification of how a source must be accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Tier {
    /// A verified feed exists.
    Rss,
    /// No feed; plain fetch works (or failed without an explicit block).
    Static,
    /// No feed and the site answered with a blocking status.
    Browser,
}

impl Tier {
    /// Apply the tiering policy.
    ///
    /// Precedence: a verified feed always wins, then a `BLOCKED_*` status,
    /// then everything else (including `ERROR_*`) is static.
    pub fn classify(verified_feed_url: Option<&str>, status: &AccessStatus) -> Self {
        if verified_feed_url.is_some_and(|u| !u.is_empty()) {
            Self::Rss
        } else if status.is_blocked() {
            Self::Browser
        } else {
            Self::Static
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rss => "TIER_1_RSS",
            Self::Static => "TIER_2_STATIC",
            Self::Browser => "TIER_3_BROWSER",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = FeedwireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "TIER_1_RSS" => Ok(Self::Rss),
            "TIER_2_STATIC" => Ok(Self::Static),
            "TIER_3_BROWSER" => Ok(Self::Browser),
            other => Err(FeedwireError::validation(format!("unknown tier: {other}"))),
        }
    }
}

impl From<Tier> for String {
    fn from(tier: Tier) -> Self {
        tier.as_str().to_string()
    }
}

impl TryFrom<String> for Tier {
    type Error = FeedwireError;

    fn try_from(value: String) -> Result<Self, FeedwireError> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// AuditRecord
// ---------------------------------------------------------------------------

/// Classified result of auditing one [`SourceRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    #[serde(rename = "S.No")]
    pub serial: i64,
    #[serde(rename = "Source Name")]
    pub name: String,
    /// First candidate URL that parsed as a non-empty feed.
    #[serde(rename = "Verified_RSS")]
    pub verified_feed_url: Option<String>,
    #[serde(rename = "Access_Status")]
    pub access_status: AccessStatus,
    #[serde(rename = "Final_Tier")]
    pub final_tier: Tier,
}

impl AuditRecord {
    /// Build a record for `source`, deriving the tier from the two outcomes.
    pub fn new(
        source: &SourceRecord,
        verified_feed_url: Option<String>,
        access_status: AccessStatus,
    ) -> Self {
        let verified_feed_url = verified_feed_url.filter(|u| !u.is_empty());
        let final_tier = Tier::classify(verified_feed_url.as_deref(), &access_status);
        Self {
            serial: source.serial,
            name: source.name.clone(),
            verified_feed_url,
            access_status,
            final_tier,
        }
    }
}

// ---------------------------------------------------------------------------
// Article
// ---------------------------------------------------------------------------

/// A stored article, keyed by [`url_hash`] of its URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub source_name: String,
    pub url: String,
    pub title: String,
    /// Extracted body text.
    pub content: String,
    /// Entry publication date, empty when the feed did not carry one.
    pub published_date: String,
}

/// Deterministic article identity: hex MD5 of the trimmed URL.
///
/// MD5 keeps ids compatible with article databases written by the earlier
/// ingester; it is an identity key, not a security boundary.
pub fn url_hash(url: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(url.trim().as_bytes());
    format!("{:x}", hasher.finalize())
}
