//! Shared types, error model, and configuration for feedwire.
//!
//! This crate is the foundation depended on by all other feedwire crates.
//! It provides:
//! - [`FeedwireError`]: the unified error type
//! - Domain types ([`SourceRecord`], [`AuditRecord`], [`Article`], [`Tier`], [`AccessStatus`])
//! - Configuration ([`AppConfig`], [`HttpConfig`], [`AuditConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AuditConfig, AuditSection, HttpConfig, HttpSection, PathsSection, StorageSection,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{FeedwireError, Result};
pub use types::{
    AccessStatus, Article, AuditRecord, FailureKind, SourceRecord, Tier, url_hash,
};
