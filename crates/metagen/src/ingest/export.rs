use std::path::Path;

use crate::error::IngestError;
use crate::record::{OutputLanguage, ProcessedRecord, KEY_COLUMN, NAME_COLUMN};

/// Prefix added to the uploaded file's base name for exports.
pub const EXPORT_PREFIX: &str = "seo_";

/// Derives the export file name: `seo_<base name>.csv`.
pub fn export_file_name(source_file_name: &str) -> String {
    let stem = Path::new(source_file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("products");
    format!("{}{}.csv", EXPORT_PREFIX, stem)
}

/// Column order used for export: key, name, pass-through columns in first-seen
/// order, then the generated columns for `language`.
pub fn export_columns(records: &[ProcessedRecord], language: OutputLanguage) -> Vec<String> {
    let mut columns = vec![KEY_COLUMN.to_string(), NAME_COLUMN.to_string()];
    for processed in records {
        for (name, _) in &processed.record.extra {
            if !columns.iter().any(|c| c == name) {
                columns.push(name.clone());
            }
        }
    }
    for field in language.fields() {
        let name = field.column().to_string();
        if !columns.contains(&name) {
            columns.push(name);
        }
    }
    columns
}

/// Serializes processed records to CSV bytes, one row per record in the
/// order given.
pub fn export_csv(
    records: &[ProcessedRecord],
    language: OutputLanguage,
) -> Result<Vec<u8>, IngestError> {
    let columns = export_columns(records, language);
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record(&columns)
        .map_err(|e| IngestError::Export(e.to_string()))?;

    for processed in records {
        let row: Vec<&str> = columns
            .iter()
            .map(|column| cell_value(processed, column))
            .collect();
        writer
            .write_record(&row)
            .map_err(|e| IngestError::Export(e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| IngestError::Export(e.to_string()))
}

fn cell_value<'a>(processed: &'a ProcessedRecord, column: &str) -> &'a str {
    if column == KEY_COLUMN {
        return &processed.record.key;
    }
    if column == NAME_COLUMN {
        return &processed.record.display_name;
    }
    if let Some(field) = crate::record::GeneratedField::from_column(column) {
        if let Some(value) = processed.generated.get(field) {
            return value;
        }
    }
    processed.record.column(column).unwrap_or("")
}
