//! Builders for creating test data programmatically.

#![allow(dead_code)]

use metagen::Record;

/// A product with a predictable name and one pass-through column.
pub fn product(key: &str) -> Record {
    Record::new(key, format!("Product {}", key)).with_column("Brand", "Acme")
}

/// Products `P1..=Pn`.
pub fn products(n: usize) -> Vec<Record> {
    (1..=n).map(|i| product(&format!("P{}", i))).collect()
}

/// Products with the given keys, in order.
pub fn keyed(keys: &[&str]) -> Vec<Record> {
    keys.iter().map(|k| product(k)).collect()
}

/// Builder for CSV upload bytes.
pub struct CsvBuilder {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvBuilder {
    pub fn new(header: &[&str]) -> Self {
        Self {
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row(mut self, values: &[&str]) -> Self {
        self.rows.push(values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = String::new();
        for line in std::iter::once(&self.header).chain(self.rows.iter()) {
            let cells: Vec<String> = line.iter().map(|c| quote(c)).collect();
            out.push_str(&cells.join(","));
            out.push('\n');
        }
        out.into_bytes()
    }
}

fn quote(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

/// Builder for minimal XLSX upload bytes. Every sheet is written in order;
/// an empty string leaves the cell out, and numeric text is stored as a
/// number.
pub struct XlsxBuilder {
    sheets: Vec<(String, Vec<Vec<String>>)>,
}

impl XlsxBuilder {
    pub fn new() -> Self {
        Self { sheets: Vec::new() }
    }

    pub fn sheet(mut self, name: &str, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect();
        self.sheets.push((name.to_string(), rows));
        self
    }

    pub fn build(self) -> Vec<u8> {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
        const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
        const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

        let mut strings: Vec<String> = Vec::new();
        let mut worksheets = Vec::new();
        for (_, rows) in &self.sheets {
            let mut xml = format!(r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="{MAIN_NS}"><sheetData>"#);
            for (r, row) in rows.iter().enumerate() {
                xml.push_str(&format!(r#"<row r="{}">"#, r + 1));
                for (c, cell) in row.iter().enumerate() {
                    if cell.is_empty() {
                        continue;
                    }
                    let reference = format!("{}{}", column_letter(c), r + 1);
                    if cell.parse::<f64>().is_ok() {
                        xml.push_str(&format!(r#"<c r="{reference}"><v>{cell}</v></c>"#));
                    } else {
                        let index = match strings.iter().position(|s| s == cell) {
                            Some(i) => i,
                            None => {
                                strings.push(cell.clone());
                                strings.len() - 1
                            }
                        };
                        xml.push_str(&format!(r#"<c r="{reference}" t="s"><v>{index}</v></c>"#));
                    }
                }
                xml.push_str("</row>");
            }
            xml.push_str("</sheetData></worksheet>");
            worksheets.push(xml);
        }

        let mut sheet_entries = String::new();
        let mut sheet_rels = String::new();
        let mut sheet_types = String::new();
        for (i, (name, _)) in self.sheets.iter().enumerate() {
            let n = i + 1;
            sheet_entries.push_str(&format!(
                r#"<sheet name="{}" sheetId="{n}" r:id="rId{n}"/>"#,
                escape(name)
            ));
            sheet_rels.push_str(&format!(
                r#"<Relationship Id="rId{n}" Type="{REL_NS}/worksheet" Target="worksheets/sheet{n}.xml"/>"#
            ));
            sheet_types.push_str(&format!(
                r#"<Override PartName="/xl/worksheets/sheet{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
            ));
        }
        let shared_id = self.sheets.len() + 1;
        sheet_rels.push_str(&format!(
            r#"<Relationship Id="rId{shared_id}" Type="{REL_NS}/sharedStrings" Target="sharedStrings.xml"/>"#
        ));

        let content_types = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>{sheet_types}</Types>"#
        );
        let root_rels = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="{PKG_REL_NS}"><Relationship Id="rId1" Type="{REL_NS}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
        );
        let workbook = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="{MAIN_NS}" xmlns:r="{REL_NS}"><sheets>{sheet_entries}</sheets></workbook>"#
        );
        let workbook_rels = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="{PKG_REL_NS}">{sheet_rels}</Relationships>"#
        );
        let shared: String = strings
            .iter()
            .map(|s| format!("<si><t>{}</t></si>", escape(s)))
            .collect();
        let shared_strings = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><sst xmlns="{MAIN_NS}" count="{0}" uniqueCount="{0}">{shared}</sst>"#,
            strings.len()
        );

        let mut parts = vec![
            ("[Content_Types].xml".to_string(), content_types),
            ("_rels/.rels".to_string(), root_rels),
            ("xl/workbook.xml".to_string(), workbook),
            ("xl/_rels/workbook.xml.rels".to_string(), workbook_rels),
            ("xl/sharedStrings.xml".to_string(), shared_strings),
        ];
        for (i, xml) in worksheets.into_iter().enumerate() {
            parts.push((format!("xl/worksheets/sheet{}.xml", i + 1), xml));
        }

        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, xml) in parts {
            let options =
                SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
            writer.start_file(name, options).unwrap();
            writer.write_all(xml.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }
}

impl Default for XlsxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn column_letter(index: usize) -> char {
    (b'A' + index as u8) as char
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
