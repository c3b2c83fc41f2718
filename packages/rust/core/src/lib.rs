//! Pipeline orchestration for feedwire.
//!
//! Ties together the CSV tables, the Source Auditor, and the Ingestion
//! Pipeline into the runs the CLI exposes (`audit`, `ingest`, `run`).

pub mod auditor;
pub mod ingest;
pub mod pipeline;
pub mod tables;
