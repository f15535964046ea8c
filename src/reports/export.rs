//! Writes an [`AggregateTable`] as CSV, a spreadsheet and an XML tree.
//!
//! All three carry the same rows. An empty value is an empty CSV field, a blank
//! cell and an empty XML element. Only the XML column labels are sanitized.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use regex::Regex;
use rust_xlsxwriter::{Workbook, XlsxError};
use thiserror::Error;
use tracing::info;

use crate::reports::aggregator::AggregateTable;

pub const XML_ROOT: &str = "data";
pub const XML_ROW: &str = "row";
pub const SHEET_NAME: &str = "Summary";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("XML error: {0}")]
    Xml(String),
}

/// Paths of the three written artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub csv: PathBuf,
    pub xlsx: PathBuf,
    pub xml: PathBuf,
}

/// Replace every character that cannot appear in an XML element name with `_`
pub fn sanitize_xml_label(label: &str) -> String {
    static NON_WORD: OnceLock<Regex> = OnceLock::new();
    let re = NON_WORD.get_or_init(|| Regex::new(r"[^\w]").unwrap());
    re.replace_all(label, "_").into_owned()
}

pub fn write_all(table: &AggregateTable, paths: &ExportPaths) -> Result<(), ExportError> {
    write_csv(table, &paths.csv)?;
    write_xlsx(table, &paths.xlsx)?;
    write_xml(table, &paths.xml)?;
    Ok(())
}

pub fn write_csv(table: &AggregateTable, path: &Path) -> Result<(), ExportError> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(table.column_labels())?;
    for row in &table.rows {
        let value = row.value.map(|v| v.to_string()).unwrap_or_default();
        writer.write_record([row.display_date(), value])?;
    }
    writer.flush().map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!("Wrote {} rows to {}", table.rows.len(), path.display());
    Ok(())
}

pub fn write_xlsx(table: &AggregateTable, path: &Path) -> Result<(), ExportError> {
    ensure_parent(path)?;
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, label) in table.column_labels().iter().enumerate() {
        worksheet.write_string(0, col as u16, *label)?;
    }
    for (i, row) in table.rows.iter().enumerate() {
        let sheet_row = i as u32 + 1;
        worksheet.write_string(sheet_row, 0, row.display_date())?;
        if let Some(value) = row.value {
            worksheet.write_number(sheet_row, 1, value)?;
        }
    }
    workbook.save(path)?;

    info!("Wrote {} rows to {}", table.rows.len(), path.display());
    Ok(())
}

pub fn write_xml(table: &AggregateTable, path: &Path) -> Result<(), ExportError> {
    ensure_parent(path)?;
    let io_err = |source: std::io::Error| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(io_err)?;
    let mut out = BufWriter::new(file);
    out.write_all(&render_xml(table)?).map_err(io_err)?;
    out.flush().map_err(io_err)?;

    info!("Wrote {} rows to {}", table.rows.len(), path.display());
    Ok(())
}

/// XML document bytes: `<data><row><Date>..</Date><Average_..>..</Average_..></row>..</data>`
pub fn render_xml(table: &AggregateTable) -> Result<Vec<u8>, ExportError> {
    let labels: Vec<String> = table
        .column_labels()
        .iter()
        .map(|l| sanitize_xml_label(l))
        .collect();

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    let w = &mut writer;

    emit(w, Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    emit(w, Event::Start(BytesStart::new(XML_ROOT)))?;
    for row in &table.rows {
        emit(w, Event::Start(BytesStart::new(XML_ROW)))?;
        write_text_element(w, &labels[0], &row.display_date())?;
        match row.value {
            Some(value) => write_text_element(w, &labels[1], &value.to_string())?,
            None => emit(w, Event::Empty(BytesStart::new(labels[1].as_str())))?,
        }
        emit(w, Event::End(BytesEnd::new(XML_ROW)))?;
    }
    emit(w, Event::End(BytesEnd::new(XML_ROOT)))?;

    Ok(writer.into_inner())
}

fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    text: &str,
) -> Result<(), ExportError> {
    emit(writer, Event::Start(BytesStart::new(name)))?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    emit(writer, Event::End(BytesEnd::new(name)))
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), ExportError> {
    writer
        .write_event(event)
        .map_err(|e| ExportError::Xml(e.to_string()))
}

fn ensure_parent(path: &Path) -> Result<(), ExportError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|source| ExportError::Io {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::aggregator::AggregateRow;
    use chrono::NaiveDate;

    fn table() -> AggregateTable {
        AggregateTable {
            value_label: "Average Цена, руб/МВт*ч".to_string(),
            rows: vec![
                AggregateRow {
                    date: NaiveDate::from_ymd_opt(2024, 10, 2).unwrap(),
                    value: Some(1500.0),
                },
                AggregateRow {
                    date: NaiveDate::from_ymd_opt(2024, 10, 3).unwrap(),
                    value: None,
                },
            ],
        }
    }

    #[test]
    fn test_sanitize_xml_label() {
        assert_eq!(sanitize_xml_label("Date"), "Date");
        assert_eq!(
            sanitize_xml_label("Average Цена, руб/МВт*ч"),
            "Average_Цена__руб_МВт_ч"
        );
        assert_eq!(sanitize_xml_label("a-b.c_d"), "a_b_c_d");
    }

    #[test]
    fn test_render_xml_null_is_empty_element() {
        let xml = String::from_utf8(render_xml(&table()).unwrap()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(xml.contains("<Date>02.10.2024</Date>"));
        assert!(xml.contains("<Average_Цена__руб_МВт_ч>1500</Average_Цена__руб_МВт_ч>"));
        assert!(xml.contains("<Average_Цена__руб_МВт_ч/>"));
        assert!(!xml.contains("nan"));
        assert!(!xml.contains("NaN"));
    }

    #[test]
    fn test_write_csv_keeps_raw_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("summary.csv");
        write_csv(&table(), &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("Date,\"Average Цена, руб/МВт*ч\""));
        assert_eq!(lines.next(), Some("02.10.2024,1500"));
        assert_eq!(lines.next(), Some("03.10.2024,"));
        assert_eq!(lines.next(), None);
    }
}
