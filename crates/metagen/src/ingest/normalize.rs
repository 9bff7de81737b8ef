//! Maps loosely-typed spreadsheet rows onto canonical [`Record`]s.

use crate::error::IngestError;
use crate::record::{Record, KEY_COLUMN, NAME_COLUMN};

/// One parsed spreadsheet row: `(header, value)` pairs in column order.
pub type RawRow = Vec<(String, String)>;

/// Header spellings accepted for the key column (compared lowercased and trimmed).
const KEY_ALIASES: &[&str] = &[
    "sku",
    "article number",
    "article no",
    "article no.",
    "article",
    "item code",
    "item number",
    "product code",
    "product id",
    "product sku",
];

/// Header spellings accepted for the display-name column.
const NAME_ALIASES: &[&str] = &[
    "product name",
    "name",
    "title",
    "product title",
    "item name",
    "product",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Canonical {
    Key,
    Name,
}

fn canonical_for(header: &str) -> Option<Canonical> {
    let normalized = header.trim().trim_start_matches('\u{feff}').trim().to_lowercase();
    if KEY_ALIASES.contains(&normalized.as_str()) {
        Some(Canonical::Key)
    } else if NAME_ALIASES.contains(&normalized.as_str()) {
        Some(Canonical::Name)
    } else {
        None
    }
}

/// Normalizes raw rows into records.
///
/// Validation only inspects the first row: required columns must be present
/// and carry values there. Later rows with an empty key are kept; callers
/// treat them as unmatchable.
pub fn normalize(rows: Vec<RawRow>) -> Result<Vec<Record>, IngestError> {
    let first = rows.first().ok_or(IngestError::EmptyFile)?;

    let mut missing = Vec::new();
    if !first.iter().any(|(h, _)| canonical_for(h) == Some(Canonical::Key)) {
        missing.push(KEY_COLUMN.to_string());
    }
    if !first.iter().any(|(h, _)| canonical_for(h) == Some(Canonical::Name)) {
        missing.push(NAME_COLUMN.to_string());
    }
    if !missing.is_empty() {
        return Err(IngestError::MissingColumns { missing });
    }

    let records: Vec<Record> = rows.into_iter().map(normalize_row).collect();

    let first = &records[0];
    if first.key.is_empty() {
        return Err(IngestError::MissingRequiredValue {
            column: KEY_COLUMN.to_string(),
        });
    }
    if first.display_name.is_empty() {
        return Err(IngestError::MissingRequiredValue {
            column: NAME_COLUMN.to_string(),
        });
    }

    Ok(records)
}

fn normalize_row(row: RawRow) -> Record {
    let mut key: Option<String> = None;
    let mut display_name: Option<String> = None;
    let mut extra = Vec::new();

    for (header, value) in row {
        match canonical_for(&header) {
            // First matching column wins; duplicates stay as pass-through.
            Some(Canonical::Key) if key.is_none() => key = Some(value.trim().to_string()),
            Some(Canonical::Name) if display_name.is_none() => {
                display_name = Some(value.trim().to_string())
            }
            _ => extra.push((header.trim().to_string(), value)),
        }
    }

    Record {
        key: key.unwrap_or_default(),
        display_name: display_name.unwrap_or_default(),
        extra,
    }
}
