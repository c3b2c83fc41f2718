//! HTTP transport and bounded concurrency for feedwire.
//!
//! This crate provides:
//! - [`fetcher`]: the [`Fetcher`] transport trait and its reqwest implementation
//! - [`pool`]: a fixed-width [`WorkerPool`] with a scatter/gather barrier

pub mod fetcher;
pub mod pool;

pub use fetcher::{FetchError, FetchResponse, Fetcher, HttpFetcher};
pub use pool::{PoolError, WorkerPool};

#[cfg(any(test, feature = "test-util"))]
pub use fetcher::StaticFetcher;
