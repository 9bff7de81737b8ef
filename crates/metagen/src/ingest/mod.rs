//! Spreadsheet ingestion and export.

pub mod export;
pub mod normalize;
pub mod reader;

pub use export::{export_csv, export_file_name};
pub use normalize::{normalize, RawRow};
pub use reader::{read_rows, SourceFormat};

use crate::error::IngestError;
use crate::record::Record;

/// Parses an uploaded file and normalizes its rows into records.
pub fn parse_and_normalize(file_name: &str, bytes: &[u8]) -> Result<Vec<Record>, IngestError> {
    let format = SourceFormat::from_file_name(file_name)?;
    let rows = read_rows(bytes, format)?;
    let records = normalize(rows)?;
    log::info!(
        "Loaded {} product rows from {}",
        records.len(),
        crate::sanitize::redact_path(std::path::Path::new(file_name))
    );
    Ok(records)
}
