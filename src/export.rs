//! Export: transformations of an in-memory result into download payloads.
//!
//! [`to_json_pretty`] and [`line_items_csv`] are pure; the web UI streams
//! their output as downloads. [`write_to_dir`] puts the same payloads on disk
//! for the CLI.

use crate::error::InvoiceError;
use crate::invoice::{present_columns, ExtractionResult, LineItem};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Download name of the full JSON export.
pub const JSON_FILE_NAME: &str = "invoice_data.json";
pub const JSON_MIME: &str = "application/json";

/// Download name of the line-items CSV export.
pub const CSV_FILE_NAME: &str = "invoice_line_items.csv";
pub const CSV_MIME: &str = "text/csv";

/// Pretty-printed JSON of the whole result. Absent fields are omitted, so
/// parsing the output back yields a result equal to the input.
pub fn to_json_pretty(result: &ExtractionResult) -> Result<String, InvoiceError> {
    serde_json::to_string_pretty(result).map_err(|e| InvoiceError::Export(e.to_string()))
}

/// Line items as CSV.
///
/// The header is every column present in at least one item, in canonical
/// order. Items missing a column get an empty cell. An empty slice produces
/// an empty string (there is no header to write).
pub fn line_items_csv(items: &[LineItem]) -> Result<String, InvoiceError> {
    let columns = present_columns(items);
    if columns.is_empty() {
        return Ok(String::new());
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(&columns)
        .map_err(|e| InvoiceError::Export(e.to_string()))?;
    for item in items {
        writer
            .write_record(columns.iter().map(|col| item.get(col).unwrap_or_default()))
            .map_err(|e| InvoiceError::Export(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| InvoiceError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| InvoiceError::Export(e.to_string()))
}

/// Write [`JSON_FILE_NAME`] into `dir`, plus [`CSV_FILE_NAME`] when the
/// result has line items. Creates `dir` if needed and returns the paths
/// written.
pub async fn write_to_dir(dir: &Path, result: &ExtractionResult) -> Result<Vec<PathBuf>, InvoiceError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| InvoiceError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let mut payloads = vec![(JSON_FILE_NAME, to_json_pretty(result)?)];
    if result.has_line_items() {
        payloads.push((CSV_FILE_NAME, line_items_csv(result.line_items())?));
    }

    let mut written = Vec::with_capacity(payloads.len());
    for (name, body) in payloads {
        let path = dir.join(name);
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| InvoiceError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;
        debug!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}
