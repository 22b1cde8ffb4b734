// Checkpoint output: UTF-8 CSV with BOM, rewritten in full after every chunk.
// Writes go to a temp file in the output directory, then replace the output
// in one rename so a reader never observes a half-written file.

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use super::BatchError;
use crate::pipeline::labeling::{Classification, LabelSource, LabeledReport, CLASSIFICATION_KEYS};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Header of the optional provenance column.
pub const SOURCE_COLUMN: &str = "source";

/// Layout of the output table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    /// Header of the identifier column (the input's id column name).
    pub id_column: String,
    pub include_source: bool,
}

impl OutputLayout {
    pub fn header(&self) -> Vec<String> {
        let mut header = Vec::with_capacity(8);
        header.push(self.id_column.clone());
        header.extend(CLASSIFICATION_KEYS.iter().map(|k| k.to_string()));
        if self.include_source {
            header.push(SOURCE_COLUMN.to_string());
        }
        header
    }

    fn row(&self, report: &LabeledReport) -> Vec<String> {
        let mut row = Vec::with_capacity(8);
        row.push(report.id.clone());
        row.extend(report.classification.values().iter().map(|v| v.to_string()));
        if self.include_source {
            row.push(report.source.map(|s| s.as_label()).unwrap_or_default());
        }
        row
    }
}

/// Replace `path` with the full result set.
pub fn write_checkpoint(path: &Path, layout: &OutputLayout, results: &[LabeledReport]) -> Result<(), BatchError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut staging = tempfile::NamedTempFile::new_in(dir)?;
    staging.write_all(UTF8_BOM)?;
    {
        let mut writer = csv::Writer::from_writer(staging.as_file_mut());
        writer.write_record(layout.header())?;
        for report in results {
            writer.write_record(layout.row(report))?;
        }
        writer.flush()?;
    }
    staging.as_file().sync_all()?;
    staging.persist(path).map_err(|e| BatchError::Io(e.error))?;
    Ok(())
}

/// Load rows from an earlier run's output so a resumed run can skip them.
/// Returns an empty set when the file does not exist.
pub fn read_existing_output(path: &Path, id_column: &str) -> Result<Vec<LabeledReport>, BatchError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new().from_path(path)?;
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let position = |name: &str| -> Result<usize, BatchError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| BatchError::MalformedOutput(format!("missing column '{name}'")))
    };
    let id_idx = position(id_column)?;
    let value_idx = CLASSIFICATION_KEYS
        .iter()
        .map(|&k| position(k))
        .collect::<Result<Vec<_>, _>>()?;
    let source_idx = headers.iter().position(|h| h == SOURCE_COLUMN);

    let mut results = Vec::new();
    let mut seen = HashSet::new();
    for record in reader.records() {
        let record = record?;
        let id = record.get(id_idx).unwrap_or_default().to_string();

        let mut values = [false; 6];
        for (slot, idx) in values.iter_mut().zip(&value_idx) {
            let cell = record.get(*idx).unwrap_or_default();
            *slot = parse_bool_cell(cell).ok_or_else(|| {
                BatchError::MalformedOutput(format!("row '{id}': '{cell}' is not a boolean"))
            })?;
        }

        if !seen.insert(id.clone()) {
            continue;
        }
        results.push(LabeledReport {
            id,
            classification: classification_from_values(values),
            source: source_idx
                .and_then(|i| record.get(i))
                .and_then(LabelSource::from_label),
        });
    }
    Ok(results)
}

fn parse_bool_cell(cell: &str) -> Option<bool> {
    match cell.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn classification_from_values(v: [bool; 6]) -> Classification {
    Classification {
        l1_l2: v[0],
        l2_l3: v[1],
        l3_l4: v[2],
        l4_l5: v[3],
        l5_s1: v[4],
        need_check: v[5],
    }
}
