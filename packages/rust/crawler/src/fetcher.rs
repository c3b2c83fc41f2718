//! HTTP transport used by both pipeline stages.
//!
//! Everything that touches the network goes through the [`Fetcher`] trait so
//! the auditor and the ingester can be driven by an in-memory transport in
//! tests. [`HttpFetcher`] is the production implementation on top of reqwest.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use feedwire_shared::{FailureKind, FeedwireError, HttpConfig, Result};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body. Only read for 2xx responses; empty otherwise.
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// True for exactly HTTP 200.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A request that failed before a status could be observed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} failure for {url}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub url: String,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            message: message.into(),
        }
    }
}

/// Issue a GET and return the status (and body, for 2xx).
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get(&self, url: &str) -> std::result::Result<FetchResponse, FetchError>;
}

// ---------------------------------------------------------------------------
// HttpFetcher
// ---------------------------------------------------------------------------

/// reqwest-backed [`Fetcher`] with a fixed User-Agent and timeout.
///
/// Built once per run and shared by reference; reqwest pools connections
/// internally. Redirects follow the client default policy.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_response_bytes: u64,
}

impl HttpFetcher {
    /// Build the client from the runtime HTTP configuration.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()
            .map_err(|e| FeedwireError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_response_bytes: config.max_response_bytes,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self), level = "trace")]
    async fn get(&self, url: &str) -> std::result::Result<FetchResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::new(classify(&e), url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            debug!(url, status = status.as_u16(), "non-success status");
            return Ok(FetchResponse {
                status: status.as_u16(),
                body: Vec::new(),
            });
        }

        // Check content-length if available
        if let Some(len) = response.content_length() {
            if len > self.max_response_bytes {
                return Err(FetchError::new(
                    FailureKind::Body,
                    url,
                    format!("response too large ({len} bytes, max {})", self.max_response_bytes),
                ));
            }
        }

        // Chunked responses carry no length; enforce the cap while streaming.
        let mut response = response;
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::new(classify(&e), url, format!("failed to read body: {e}")))?
        {
            if (body.len() + chunk.len()) as u64 > self.max_response_bytes {
                return Err(FetchError::new(
                    FailureKind::Body,
                    url,
                    format!("response exceeds {} bytes", self.max_response_bytes),
                ));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(FetchResponse {
            status: status.as_u16(),
            body,
        })
    }
}

/// Map a reqwest error onto the failure categories recorded in audits.
fn classify(err: &reqwest::Error) -> FailureKind {
    if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_connect() {
        FailureKind::Connection
    } else if err.is_redirect() {
        FailureKind::Redirect
    } else if err.is_body() || err.is_decode() {
        FailureKind::Body
    } else {
        FailureKind::Other
    }
}

// ---------------------------------------------------------------------------
// StaticFetcher (tests)
// ---------------------------------------------------------------------------

#[cfg(any(test, feature = "test-util"))]
pub use canned::StaticFetcher;

#[cfg(any(test, feature = "test-util"))]
mod canned {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    enum Canned {
        Respond(u16, Vec<u8>),
        Fail(FailureKind),
    }

    /// In-memory [`Fetcher`] with canned responses and a call log.
    ///
    /// Unregistered URLs answer 404 with an empty body.
    #[derive(Default)]
    pub struct StaticFetcher {
        routes: HashMap<String, Canned>,
        calls: Mutex<Vec<String>>,
    }

    impl StaticFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Answer `url` with `status` and `body`.
        pub fn respond(mut self, url: &str, status: u16, body: impl Into<Vec<u8>>) -> Self {
            self.routes
                .insert(url.to_string(), Canned::Respond(status, body.into()));
            self
        }

        /// Fail requests to `url` with `kind`.
        pub fn fail(mut self, url: &str, kind: FailureKind) -> Self {
            self.routes.insert(url.to_string(), Canned::Fail(kind));
            self
        }

        /// Every URL requested so far, in order.
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }

        /// How many times `url` was requested.
        pub fn call_count(&self, url: &str) -> usize {
            self.calls().iter().filter(|c| c.as_str() == url).count()
        }
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn get(&self, url: &str) -> std::result::Result<FetchResponse, FetchError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(url.to_string());
            }
            match self.routes.get(url) {
                Some(Canned::Respond(status, body)) => Ok(FetchResponse {
                    status: *status,
                    body: if (200..300).contains(status) {
                        body.clone()
                    } else {
                        Vec::new()
                    },
                }),
                Some(Canned::Fail(kind)) => Err(FetchError::new(*kind, url, "canned failure")),
                None => Ok(FetchResponse {
                    status: 404,
                    body: Vec::new(),
                }),
            }
        }
    }
}
