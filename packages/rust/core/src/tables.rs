//! CSV tables at the pipeline boundary.
//!
//! The source list is read into [`SourceRecord`]s and the audit results are
//! written and read back as [`AuditRecord`]s. Rows are typed as soon as they
//! leave the file; a malformed row fails the whole read.

use std::path::Path;

use feedwire_shared::{AuditRecord, FeedwireError, Result, SourceRecord};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

/// Load the source list (`S.No`, `Source Name`, `URL`).
pub fn read_sources(path: &Path) -> Result<Vec<SourceRecord>> {
    let sources: Vec<SourceRecord> = read_table(path)?;

    for source in &sources {
        if source.url.trim().is_empty() {
            return Err(FeedwireError::table(
                path,
                format!("source {} ({}) has an empty URL", source.serial, source.name),
            ));
        }
    }

    info!(path = %path.display(), count = sources.len(), "loaded source list");
    Ok(sources)
}

/// Write audit results with columns `S.No`, `Source Name`, `Verified_RSS`,
/// `Access_Status`, `Final_Tier`. A missing feed is an empty cell.
pub fn write_audit(path: &Path, records: &[AuditRecord]) -> Result<()> {
    write_table(path, records)?;
    info!(path = %path.display(), count = records.len(), "wrote audit table");
    Ok(())
}

/// Load a previously written audit table.
pub fn read_audit(path: &Path) -> Result<Vec<AuditRecord>> {
    let records: Vec<AuditRecord> = read_table(path)?;
    info!(path = %path.display(), count = records.len(), "loaded audit table");
    Ok(records)
}

fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| FeedwireError::table(path, e.to_string()))?;

    let mut rows = Vec::new();
    for (idx, result) in reader.deserialize().enumerate() {
        // Header is line 1.
        let row = result
            .map_err(|e| FeedwireError::table(path, format!("row {}: {e}", idx + 2)))?;
        rows.push(row);
    }
    debug!(path = %path.display(), rows = rows.len(), "read table");
    Ok(rows)
}

fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| FeedwireError::io(parent, e))?;
    }

    let mut writer =
        csv::Writer::from_path(path).map_err(|e| FeedwireError::table(path, e.to_string()))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| FeedwireError::table(path, e.to_string()))?;
    }
    writer.flush().map_err(|e| FeedwireError::io(path, e))?;
    Ok(())
}
