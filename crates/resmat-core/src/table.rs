//! Tabular files for matrices: CSV with one row per test-taker and one
//! `<benchmark>.<task_id>` column per task, plus a JSON document form.

use crate::error::TableError;
use crate::matrix::{Outcome, ResultMatrix, TaskKey};
use crate::rubric::LabelTable;
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::debug;

pub const ROW_HEADER: &str = "test_taker_id";
pub const MATRIX_DOCUMENT_SCHEMA: &str = "result_matrix_v1";

pub fn to_csv_string(matrix: &ResultMatrix) -> String {
    let columns = matrix.columns();
    let mut out = header_line(&columns);
    for (row, cells) in matrix.rows() {
        let mut fields = vec![quote_field(row)];
        for task in &columns {
            fields.push(match cells.get(task) {
                Some(outcome) => outcome.as_bit().to_string(),
                None => String::new(),
            });
        }
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

/// Parses a matrix table. Empty and `nan` cells are unobserved; repeated
/// rows or columns are max-merged rather than rejected.
pub fn from_csv_str(data: &str) -> Result<ResultMatrix, TableError> {
    let mut records = csv_records(data).into_iter();

    let (_, header) = records.next().ok_or(TableError::Empty)?;
    let header = parse_csv_line(&header);
    match header.first() {
        Some(first) if first.trim() == ROW_HEADER => {}
        other => {
            return Err(TableError::BadHeader(
                other.cloned().unwrap_or_default(),
            ))
        }
    }
    let columns = header[1..]
        .iter()
        .map(|h| TaskKey::from_header(h.trim()).ok_or_else(|| TableError::BadColumn(h.clone())))
        .collect::<Result<Vec<_>, _>>()?;

    let mut matrix = ResultMatrix::new();
    for (line_no, record) in records {
        let fields = parse_csv_line(&record);
        if fields.len() != header.len() {
            return Err(TableError::RaggedRow {
                line: line_no,
                expected: header.len(),
                found: fields.len(),
            });
        }
        let row = fields[0].trim();
        for (task, value) in columns.iter().zip(&fields[1..]) {
            if let Some(outcome) = parse_cell(value).ok_or_else(|| TableError::BadCell {
                line: line_no,
                value: value.clone(),
            })? {
                matrix.record(row, task.clone(), outcome);
            }
        }
    }
    Ok(matrix)
}

pub fn write_matrix_csv(path: &Path, matrix: &ResultMatrix) -> Result<()> {
    atomic_write_bytes(path, to_csv_string(matrix).as_bytes())
        .with_context(|| format!("failed to write matrix {}", path.display()))
}

pub fn read_matrix_csv(path: &Path) -> Result<ResultMatrix> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read matrix {}", path.display()))?;
    let matrix =
        from_csv_str(&data).with_context(|| format!("invalid matrix table {}", path.display()))?;
    debug!(
        path = %path.display(),
        rows = matrix.row_count(),
        cells = matrix.observed_cells(),
        "loaded matrix"
    );
    Ok(matrix)
}

/// JSON form of a matrix. Only observed cells are listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixDocument {
    pub schema_version: String,
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub digest: Option<String>,
    pub rows: BTreeMap<String, BTreeMap<String, u8>>,
}

impl MatrixDocument {
    pub fn from_matrix(matrix: &ResultMatrix) -> Self {
        let rows = matrix
            .rows()
            .map(|(row, cells)| {
                let cells = cells
                    .iter()
                    .map(|(task, outcome)| (task.header(), outcome.as_bit()))
                    .collect();
                (row.clone(), cells)
            })
            .collect();
        Self {
            schema_version: MATRIX_DOCUMENT_SCHEMA.to_string(),
            generated_at: Some(Utc::now().to_rfc3339()),
            digest: Some(matrix.digest()),
            rows,
        }
    }

    pub fn into_matrix(self) -> Result<ResultMatrix> {
        if self.schema_version != MATRIX_DOCUMENT_SCHEMA {
            return Err(anyhow!(
                "unsupported matrix schema_version: {}",
                self.schema_version
            ));
        }
        let mut matrix = ResultMatrix::new();
        for (row, cells) in self.rows {
            for (header, bit) in cells {
                let task = TaskKey::from_header(&header)
                    .ok_or_else(|| anyhow!(TableError::BadColumn(header.clone())))?;
                let outcome = match bit {
                    0 => Outcome::Failure,
                    1 => Outcome::Success,
                    other => return Err(anyhow!("cell {}/{} has value {}", row, header, other)),
                };
                matrix.record(&row, task, outcome);
            }
        }
        Ok(matrix)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Writes CSV, or a [`MatrixDocument`] when the path ends in `.json`.
pub fn save_matrix(path: &Path, matrix: &ResultMatrix) -> Result<()> {
    if is_json(path) {
        let bytes = serde_json::to_vec_pretty(&MatrixDocument::from_matrix(matrix))?;
        atomic_write_bytes(path, &bytes)
            .with_context(|| format!("failed to write matrix {}", path.display()))
    } else {
        write_matrix_csv(path, matrix)
    }
}

pub fn load_matrix(path: &Path) -> Result<ResultMatrix> {
    if !is_json(path) {
        return read_matrix_csv(path);
    }
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read matrix {}", path.display()))?;
    let doc: MatrixDocument = serde_json::from_str(&data)
        .with_context(|| format!("invalid matrix document {}", path.display()))?;
    doc.into_matrix()
}

/// Same layout as the matrix table with label text in the cells.
pub fn labels_to_csv_string(labels: &LabelTable) -> String {
    let columns = labels.columns();
    let mut out = header_line(&columns);
    for (row, cells) in labels.rows() {
        let mut fields = vec![quote_field(row)];
        for task in &columns {
            fields.push(cells.get(task).map(|l| quote_field(l)).unwrap_or_default());
        }
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

pub fn write_labels_csv(path: &Path, labels: &LabelTable) -> Result<()> {
    atomic_write_bytes(path, labels_to_csv_string(labels).as_bytes())
        .with_context(|| format!("failed to write labels {}", path.display()))
}

pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let ts = Utc::now().timestamp_micros();
    let pid = std::process::id();
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("matrix");
    let tmp = path.with_file_name(format!(".{}.tmp.{}.{}", name, pid, ts));
    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn header_line(columns: &BTreeSet<TaskKey>) -> String {
    let mut fields = vec![ROW_HEADER.to_string()];
    fields.extend(columns.iter().map(|task| quote_field(&task.header())));
    let mut line = fields.join(",");
    line.push('\n');
    line
}

fn parse_cell(value: &str) -> Option<Option<Outcome>> {
    match value.trim().to_lowercase().as_str() {
        "" | "nan" => Some(None),
        "1" | "1.0" | "true" => Some(Some(Outcome::Success)),
        "0" | "0.0" | "false" => Some(Some(Outcome::Failure)),
        _ => None,
    }
}

fn quote_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Splits CSV text into records paired with the line they start on. A
/// quoted field may span lines; blank lines outside quotes are skipped.
pub(crate) fn csv_records(data: &str) -> Vec<(usize, String)> {
    let mut records = Vec::new();
    let mut pending: Option<(usize, String)> = None;
    for (idx, line) in data.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        let (start, record) = match pending.take() {
            Some((start, mut record)) => {
                record.push('\n');
                record.push_str(line);
                (start, record)
            }
            None if line.trim().is_empty() => continue,
            None => (idx + 1, line.to_string()),
        };
        if record.matches('"').count() % 2 == 1 {
            pending = Some((start, record));
        } else {
            records.push((start, record));
        }
    }
    records.extend(pending);
    records
}

pub(crate) fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if !in_quotes => in_quotes = true,
            '"' => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}
