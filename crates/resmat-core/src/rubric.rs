//! Best-effort alignment of rubric labels onto matrix cells.
//!
//! A rubric row names a benchmark, a task and a model string, sometimes a
//! run id. It is attached to a cell only when the matrix shows that the
//! resolved test-taker attempted the task; the aligner never adds rows.

use crate::builder::RunIndex;
use crate::identity::NameNormalizer;
use crate::matrix::{Outcome, ResultMatrix, TaskKey};
use crate::table::{csv_records, parse_csv_line};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

pub const DEFAULT_RUBRIC: &str = "label";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubricRow {
    #[serde(default, alias = "benchmark_id")]
    pub benchmark: String,
    #[serde(default, alias = "model")]
    pub model_raw: String,
    #[serde(default)]
    pub task_id: String,
    pub label: String,
    /// Rubric dimension (`tooluse`, `verification`, ...); rows without one
    /// share the default table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubric: Option<String>,
    #[serde(default, alias = "agent_run_id", skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

/// Loads rubric rows from JSONL (`.jsonl`/`.json`) or a headed CSV file.
/// CSV columns are matched by name; `label` and either `benchmark` or
/// `benchmark_id` are required.
pub fn load_rubric_rows(path: &Path) -> Result<Vec<RubricRow>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read rubrics {}", path.display()))?;
    let is_jsonl = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("jsonl") || e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let rows = if is_jsonl {
        let mut rows = Vec::new();
        for (idx, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let row: RubricRow = serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid rubric row", path.display(), idx + 1))?;
            rows.push(row);
        }
        rows
    } else {
        rubric_rows_from_csv(&data).with_context(|| format!("invalid rubrics {}", path.display()))?
    };
    debug!(path = %path.display(), rows = rows.len(), "loaded rubric rows");
    Ok(rows)
}

fn rubric_rows_from_csv(data: &str) -> Result<Vec<RubricRow>> {
    let mut records = csv_records(data).into_iter();
    let (_, header) = records.next().ok_or_else(|| anyhow!("rubric table is empty"))?;
    let header: Vec<String> = parse_csv_line(&header)
        .into_iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    let column = |names: &[&str]| header.iter().position(|h| names.contains(&h.as_str()));
    let benchmark = column(&["benchmark", "benchmark_id"])
        .ok_or_else(|| anyhow!("rubric table has no benchmark column"))?;
    let label = column(&["label"]).ok_or_else(|| anyhow!("rubric table has no label column"))?;
    let task_id = column(&["task_id"]);
    let model = column(&["model", "model_raw"]);
    let rubric = column(&["rubric"]);
    let run_id = column(&["run_id", "agent_run_id"]);

    let mut rows = Vec::new();
    for (line_no, record) in records {
        let fields = parse_csv_line(&record);
        if fields.len() != header.len() {
            return Err(anyhow!(
                "line {}: expected {} fields, found {}",
                line_no,
                header.len(),
                fields.len()
            ));
        }
        let get = |i: Option<usize>| i.map(|i| fields[i].trim().to_string()).unwrap_or_default();
        let optional = |i: Option<usize>| Some(get(i)).filter(|v| !v.is_empty());
        rows.push(RubricRow {
            benchmark: get(Some(benchmark)),
            model_raw: get(model),
            task_id: get(task_id),
            label: get(Some(label)),
            rubric: optional(rubric),
            run_id: optional(run_id),
        });
    }
    Ok(rows)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    MatchedByRunId,
    MatchedByModel,
    Unmatched,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlignedRubric {
    #[serde(flatten)]
    pub row: RubricRow,
    pub test_taker_id: Option<String>,
    pub task_column: Option<String>,
    pub status: MatchStatus,
    /// Rows that qualified before the priority pick.
    pub candidates: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlignmentReport {
    pub rows: usize,
    pub matched_by_run_id: usize,
    pub matched_by_model: usize,
    pub unmatched: usize,
    /// Unmatched rows by reason (`missing_fields`, `unknown_task`, `no_attempting_row`).
    pub unmatched_reasons: BTreeMap<String, usize>,
    /// Matches chosen by priority out of more than one candidate.
    pub ambiguous: usize,
    /// Labels not written because the cell already held one.
    pub label_conflicts: usize,
}

/// Labels keyed like a [`ResultMatrix`]. Only cells the matrix observed
/// can appear here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
    cells: BTreeMap<String, BTreeMap<TaskKey, String>>,
}

impl LabelTable {
    /// First label wins; returns false if the cell was already labelled.
    pub fn insert(&mut self, row: &str, task: TaskKey, label: &str) -> bool {
        let cells = self.cells.entry(row.to_string()).or_default();
        if cells.contains_key(&task) {
            return false;
        }
        cells.insert(task, label.to_string());
        true
    }

    pub fn get(&self, row: &str, task: &TaskKey) -> Option<&str> {
        self.cells
            .get(row)
            .and_then(|c| c.get(task))
            .map(String::as_str)
    }

    pub fn rows(&self) -> impl Iterator<Item = (&String, &BTreeMap<TaskKey, String>)> {
        self.cells.iter()
    }

    pub fn columns(&self) -> BTreeSet<TaskKey> {
        self.cells
            .values()
            .flat_map(|c| c.keys().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cells.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Binary view of the labels; labels that are not match/no-match style
    /// are left out.
    pub fn to_binary(&self) -> ResultMatrix {
        let mut out = ResultMatrix::new();
        for (row, cells) in &self.cells {
            for (task, label) in cells {
                if let Some(outcome) = label_outcome(label) {
                    out.record(row, task.clone(), outcome);
                }
            }
        }
        out
    }
}

pub fn label_outcome(label: &str) -> Option<Outcome> {
    match label.trim().to_lowercase().as_str() {
        "match" | "true" | "1" | "1.0" | "yes" => Some(Outcome::Success),
        "no match" | "no_match" | "false" | "0" | "0.0" | "no" => Some(Outcome::Failure),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct Alignment {
    pub rows: Vec<AlignedRubric>,
    pub labels: BTreeMap<String, LabelTable>,
    pub report: AlignmentReport,
}

pub struct RubricAligner<'a> {
    normalizer: &'a NameNormalizer,
    matrix: &'a ResultMatrix,
    columns: BTreeSet<TaskKey>,
    runs: RunIndex,
}

impl<'a> RubricAligner<'a> {
    pub fn new(normalizer: &'a NameNormalizer, matrix: &'a ResultMatrix) -> Self {
        Self {
            normalizer,
            matrix,
            columns: matrix.columns(),
            runs: RunIndex::default(),
        }
    }

    pub fn with_run_index(mut self, runs: RunIndex) -> Self {
        self.runs = runs;
        self
    }

    pub fn align(&self, rows: &[RubricRow]) -> Alignment {
        let mut alignment = Alignment::default();
        alignment.report.rows = rows.len();

        for row in rows {
            let aligned = match self.resolve(row) {
                Ok(resolved) => {
                    match resolved.status {
                        MatchStatus::MatchedByRunId => alignment.report.matched_by_run_id += 1,
                        _ => alignment.report.matched_by_model += 1,
                    }
                    if resolved.candidates > 1 {
                        alignment.report.ambiguous += 1;
                    }
                    let rubric = row.rubric.as_deref().unwrap_or(DEFAULT_RUBRIC);
                    let table = alignment.labels.entry(rubric.to_string()).or_default();
                    if !table.insert(&resolved.test_taker_id, resolved.task.clone(), &row.label) {
                        alignment.report.label_conflicts += 1;
                    }
                    AlignedRubric {
                        row: row.clone(),
                        test_taker_id: Some(resolved.test_taker_id),
                        task_column: Some(resolved.task.header()),
                        status: resolved.status,
                        candidates: resolved.candidates,
                    }
                }
                Err(reason) => {
                    debug!(
                        benchmark = %row.benchmark,
                        task_id = %row.task_id,
                        model = %row.model_raw,
                        reason,
                        "rubric row unmatched"
                    );
                    alignment.report.unmatched += 1;
                    *alignment
                        .report
                        .unmatched_reasons
                        .entry(reason.to_string())
                        .or_default() += 1;
                    AlignedRubric {
                        row: row.clone(),
                        test_taker_id: None,
                        task_column: None,
                        status: MatchStatus::Unmatched,
                        candidates: 0,
                    }
                }
            };
            alignment.rows.push(aligned);
        }

        info!(
            rows = alignment.report.rows,
            by_run_id = alignment.report.matched_by_run_id,
            by_model = alignment.report.matched_by_model,
            unmatched = alignment.report.unmatched,
            ambiguous = alignment.report.ambiguous,
            "aligned rubric rows"
        );
        alignment
    }

    fn resolve(&self, row: &RubricRow) -> Result<Resolved, &'static str> {
        let benchmark = row.benchmark.trim();
        let task_id = row.task_id.trim();
        if benchmark.is_empty() || task_id.is_empty() {
            return Err("missing_fields");
        }
        let task = self.task_column(benchmark, task_id).ok_or("unknown_task")?;

        if let Some(row_id) = row
            .run_id
            .as_deref()
            .and_then(|run_id| self.runs.get(run_id.trim()))
        {
            if self.matrix.get(row_id, &task).is_some() {
                return Ok(Resolved {
                    test_taker_id: row_id.to_string(),
                    task,
                    status: MatchStatus::MatchedByRunId,
                    candidates: 1,
                });
            }
        }

        if row.model_raw.trim().is_empty() {
            return Err("no_attempting_row");
        }
        let model_key = self.normalizer.normalize_model(&row.model_raw);
        let mut candidates: Vec<(usize, &String)> = self
            .matrix
            .row_ids()
            .filter_map(|id| {
                let (scaffold, model) = id.split_once(':')?;
                if model != model_key || self.matrix.get(id, &task).is_none() {
                    return None;
                }
                Some((self.normalizer.scaffold_priority(scaffold), id))
            })
            .collect();
        candidates.sort();
        match candidates.first() {
            Some((_, id)) => Ok(Resolved {
                test_taker_id: (*id).clone(),
                task,
                status: MatchStatus::MatchedByModel,
                candidates: candidates.len(),
            }),
            None => Err("no_attempting_row"),
        }
    }

    /// Exact `(task_id, benchmark)` column, else the first column for the
    /// task whose benchmark extends the given one (`taubench` ->
    /// `taubench_airline`).
    fn task_column(&self, benchmark: &str, task_id: &str) -> Option<TaskKey> {
        let exact = TaskKey::new(task_id, benchmark);
        if self.columns.contains(&exact) {
            return Some(exact);
        }
        self.columns
            .range(TaskKey::new(task_id, "")..)
            .take_while(|k| k.task_id == task_id)
            .find(|k| k.benchmark.starts_with(benchmark))
            .cloned()
    }
}

struct Resolved {
    test_taker_id: String,
    task: TaskKey,
    status: MatchStatus,
    candidates: usize,
}
