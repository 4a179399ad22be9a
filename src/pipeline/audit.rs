//! Audit table serialization.
//!
//! One row per run, fully overwritten on every invocation: the table is a
//! point-in-time completeness snapshot, not a log. Operators read failure
//! causes straight from the `errors` column.

use std::path::Path;

use thiserror::Error;

use crate::pipeline::descriptor::RunDescriptor;

/// Batch-level audit table filename under the working root.
pub const AUDIT_FILE: &str = "check_outputs.csv";

/// Errors that can occur while writing the audit table.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

const HEADERS: [&str; 17] = [
    "run_id",
    "exists_local",
    "exists_remote",
    "success_download",
    "success_tracks",
    "success_track_analysis",
    "success_wind_fields",
    "success_impacts",
    "success_impact_analysis",
    "success_report",
    "storm_ids",
    "named_storms",
    "named_storm_count",
    "has_affected",
    "has_displaced",
    "final_step",
    "errors",
];

/// Writes the audit table, replacing any previous snapshot at `path`.
pub fn write_audit_table(path: &Path, rows: &[RunDescriptor]) -> Result<(), AuditError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(HEADERS)?;
    for row in rows {
        writer.write_record([
            row.run_id.as_str().to_string(),
            row.exists_local.to_string(),
            row.exists_remote.to_string(),
            row.download_ok.to_string(),
            row.tracks_ok.to_string(),
            row.track_analysis_ok.to_string(),
            row.wind_fields_ok.to_string(),
            row.impacts_ok.to_string(),
            row.impact_analysis_ok.to_string(),
            row.report_ok.to_string(),
            row.storm_ids.join(";"),
            row.named_storms.join(";"),
            row.named_storm_count().to_string(),
            row.has_affected.to_string(),
            row.has_displaced.to_string(),
            row.final_step.map(|s| s.as_str()).unwrap_or("").to_string(),
            row.errors.join("; "),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
