use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use crate::error::IngestError;

use super::normalize::RawRow;

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    /// Excel or OpenDocument workbook; the concrete format is sniffed from
    /// the bytes.
    Workbook,
}

impl SourceFormat {
    /// Detects the format from the file extension.
    pub fn from_file_name(file_name: &str) -> Result<Self, IngestError> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => Ok(SourceFormat::Csv),
            "xlsx" | "xlsm" | "xls" | "ods" => Ok(SourceFormat::Workbook),
            "" => Err(IngestError::UnsupportedFormat(file_name.to_string())),
            other => Err(IngestError::UnsupportedFormat(format!(".{}", other))),
        }
    }
}

/// Reads the header row plus data rows into `(header, value)` pairs.
/// Short rows are padded with empty strings; fully blank rows are skipped.
pub fn read_rows(bytes: &[u8], format: SourceFormat) -> Result<Vec<RawRow>, IngestError> {
    let table = match format {
        SourceFormat::Csv => read_csv(bytes)?,
        SourceFormat::Workbook => read_workbook(bytes)?,
    };

    let mut iter = table.into_iter();
    let headers = match iter.next() {
        Some(headers) => headers,
        None => return Ok(Vec::new()),
    };

    let rows = iter
        .filter(|cells| cells.iter().any(|c| !c.trim().is_empty()))
        .map(|cells| {
            headers
                .iter()
                .enumerate()
                .map(|(i, header)| (header.clone(), cells.get(i).cloned().unwrap_or_default()))
                .collect()
        })
        .collect();

    Ok(rows)
}

fn read_csv(bytes: &[u8]) -> Result<Vec<Vec<String>>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut table = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| IngestError::Parse(e.to_string()))?;
        table.push(record.iter().map(str::to_string).collect());
    }
    Ok(table)
}

/// Reads the first sheet. Empty cells become empty strings.
fn read_workbook(bytes: &[u8]) -> Result<Vec<Vec<String>>, IngestError> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| IngestError::Parse(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| IngestError::Parse("workbook contains no sheets".to_string()))?
        .map_err(|e| IngestError::Parse(e.to_string()))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect())
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        // Whole numbers (typical for numeric SKUs) must not gain a ".0" suffix.
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(SourceFormat::from_file_name("products.CSV").unwrap(), SourceFormat::Csv);
        assert_eq!(SourceFormat::from_file_name("a.b.xlsx").unwrap(), SourceFormat::Workbook);
        assert_eq!(SourceFormat::from_file_name("legacy.XLS").unwrap(), SourceFormat::Workbook);
        assert!(matches!(
            SourceFormat::from_file_name("notes.txt"),
            Err(IngestError::UnsupportedFormat(_))
        ));
        assert!(SourceFormat::from_file_name("README").is_err());
    }

    #[test]
    fn test_csv_rows_are_padded_and_blank_rows_skipped() {
        let csv = "SKU,Name,Color\nA,Chair,Red\nB,Table\n,,\n";
        let rows = read_rows(csv.as_bytes(), SourceFormat::Csv).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][2], ("Color".to_string(), String::new()));
    }

    #[test]
    fn test_csv_header_only() {
        let rows = read_rows(b"SKU,Name\n", SourceFormat::Csv).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_csv_quoted_values() {
        let csv = "SKU,Name\n\"A,1\",\"Chair, \"\"big\"\"\"\n";
        let rows = read_rows(csv.as_bytes(), SourceFormat::Csv).unwrap();
        assert_eq!(rows[0][0].1, "A,1");
        assert_eq!(rows[0][1].1, "Chair, \"big\"");
    }

    #[test]
    fn test_invalid_workbook_is_parse_error() {
        let err = read_rows(b"definitely not a zip", SourceFormat::Workbook).unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&Data::Float(12345.0)), "12345");
        assert_eq!(cell_to_string(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_to_string(&Data::Empty), "");
        assert_eq!(cell_to_string(&Data::String("x".into())), "x");
    }
}
