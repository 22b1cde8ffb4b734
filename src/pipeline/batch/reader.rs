use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use super::BatchError;

/// One input row: an opaque identifier and the raw report cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub id: String,
    /// `None` when the cell is empty or not text.
    pub text: Option<String>,
}

/// Input container, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Spreadsheet,
    Csv,
    Tsv,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Result<Self, BatchError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "xlsx" | "xlsm" | "xls" => Ok(Self::Spreadsheet),
            "csv" => Ok(Self::Csv),
            "tsv" => Ok(Self::Tsv),
            _ => Err(BatchError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Read every row of the input table. Fails before returning any row if the
/// format is unsupported or a required column is missing.
pub fn read_reports(path: &Path, text_column: &str, id_column: &str) -> Result<Vec<Report>, BatchError> {
    let reports = match InputFormat::from_path(path)? {
        InputFormat::Spreadsheet => read_spreadsheet(path, text_column, id_column)?,
        InputFormat::Csv => read_delimited(path, b',', text_column, id_column)?,
        InputFormat::Tsv => read_delimited(path, b'\t', text_column, id_column)?,
    };

    tracing::info!(
        path = %path.display(),
        rows = reports.len(),
        "Input table loaded"
    );
    Ok(reports)
}

fn find_column<'a>(
    mut headers: impl Iterator<Item = &'a str>,
    name: &str,
) -> Result<usize, BatchError> {
    headers
        .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
        .ok_or_else(|| BatchError::MissingColumn(name.to_string()))
}

fn read_delimited(
    path: &Path,
    delimiter: u8,
    text_column: &str,
    id_column: &str,
) -> Result<Vec<Report>, BatchError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let text_idx = find_column(headers.iter(), text_column)?;
    let id_idx = find_column(headers.iter(), id_column)?;

    let mut reports = Vec::new();
    for record in reader.records() {
        let record = record?;
        let text = record
            .get(text_idx)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        reports.push(Report {
            id: record.get(id_idx).unwrap_or_default().to_string(),
            text,
        });
    }
    Ok(reports)
}

fn read_spreadsheet(path: &Path, text_column: &str, id_column: &str) -> Result<Vec<Report>, BatchError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|e| BatchError::Spreadsheet(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(BatchError::EmptyWorkbook)?
        .map_err(|e| BatchError::Spreadsheet(e.to_string()))?;

    let mut rows = range.rows();
    let header: Vec<String> = match rows.next() {
        Some(cells) => cells.iter().map(|c| c.to_string()).collect(),
        None => return Err(BatchError::MissingColumn(text_column.to_string())),
    };
    let text_idx = find_column(header.iter().map(String::as_str), text_column)?;
    let id_idx = find_column(header.iter().map(String::as_str), id_column)?;

    Ok(rows
        .map(|cells| Report {
            id: cells.get(id_idx).map(cell_to_id).unwrap_or_default(),
            text: cells.get(text_idx).and_then(cell_to_text),
        })
        .collect())
}

/// Only string cells count as report text.
fn cell_to_text(cell: &Data) -> Option<String> {
    match cell {
        Data::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Whole-number floats (how spreadsheets store numeric ids) lose the ".0".
fn cell_to_id(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::Float(f) if f.is_finite() && f.fract() == 0.0 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}
