//! Raw run records and the file shapes they arrive in.

use crate::error::RecordError;
use crate::matrix::Outcome;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Outcome as it appears in exported records: booleans, 0/1, or words.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutcomeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl OutcomeValue {
    pub fn resolve(&self) -> Result<Outcome, RecordError> {
        match self {
            OutcomeValue::Bool(b) => Ok(Outcome::from_success(*b)),
            OutcomeValue::Int(1) => Ok(Outcome::Success),
            OutcomeValue::Int(0) => Ok(Outcome::Failure),
            OutcomeValue::Float(f) if *f == 1.0 => Ok(Outcome::Success),
            OutcomeValue::Float(f) if *f == 0.0 => Ok(Outcome::Failure),
            OutcomeValue::Text(s) => match s.trim().to_lowercase().as_str() {
                "success" | "successful" | "true" | "1" | "pass" => Ok(Outcome::Success),
                "failure" | "failed" | "false" | "0" | "fail" => Ok(Outcome::Failure),
                _ => Err(RecordError::UnresolvableOutcome(s.clone())),
            },
            other => Err(RecordError::UnresolvableOutcome(format!("{:?}", other))),
        }
    }
}

impl From<Outcome> for OutcomeValue {
    fn from(value: Outcome) -> Self {
        OutcomeValue::Bool(value == Outcome::Success)
    }
}

/// One `(run, task)` observation as handed over by trace ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRunRecord {
    #[serde(default, alias = "agent_name")]
    pub scaffold_raw: String,
    #[serde(default, alias = "model_name", skip_serializing_if = "Option::is_none")]
    pub model_raw: Option<String>,
    #[serde(default, alias = "benchmark_name")]
    pub benchmark: String,
    #[serde(default)]
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<OutcomeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl RawRunRecord {
    pub fn new(
        scaffold_raw: &str,
        model_raw: Option<&str>,
        benchmark: &str,
        task_id: &str,
        outcome: Outcome,
    ) -> Self {
        Self {
            scaffold_raw: scaffold_raw.to_string(),
            model_raw: model_raw.map(str::to_string),
            benchmark: benchmark.to_string(),
            task_id: task_id.to_string(),
            outcome: Some(outcome.into()),
            run_id: None,
        }
    }

    pub fn with_run_id(mut self, run_id: &str) -> Self {
        self.run_id = Some(run_id.to_string());
        self
    }

    /// Checks required fields and resolves the outcome.
    pub fn validate(&self) -> Result<Outcome, RecordError> {
        if self.scaffold_raw.trim().is_empty() {
            return Err(RecordError::MissingField("scaffold_raw"));
        }
        if self.benchmark.trim().is_empty() {
            return Err(RecordError::MissingField("benchmark"));
        }
        if self.task_id.trim().is_empty() {
            return Err(RecordError::MissingField("task_id"));
        }
        match &self.outcome {
            Some(value) => value.resolve(),
            None => Err(RecordError::MissingField("outcome")),
        }
    }
}

/// The `config` / `results` slice of a HAL upload file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunSummary {
    #[serde(default)]
    pub config: RunConfig,
    #[serde(default)]
    pub results: RunResults,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub agent_name: String,
    #[serde(default)]
    pub benchmark_name: String,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub agent_args: AgentArgs,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentArgs {
    #[serde(default)]
    pub model_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunResults {
    #[serde(default)]
    pub successful_tasks: Vec<String>,
    #[serde(default)]
    pub failed_tasks: Vec<String>,
}

impl RunSummary {
    /// One record per listed task. A task listed as both successful and
    /// failed yields both records; the builder resolves them.
    pub fn into_records(self) -> Vec<RawRunRecord> {
        let config = self.config;
        let model = config.agent_args.model_name.as_deref();
        let tagged = self
            .results
            .successful_tasks
            .iter()
            .map(|t| (t, Outcome::Success))
            .chain(
                self.results
                    .failed_tasks
                    .iter()
                    .map(|t| (t, Outcome::Failure)),
            );
        tagged
            .map(|(task_id, outcome)| {
                let mut record = RawRunRecord::new(
                    &config.agent_name,
                    model,
                    &config.benchmark_name,
                    task_id,
                    outcome,
                );
                record.run_id = config.run_id.clone();
                record
            })
            .collect()
    }
}

/// Reads a JSONL file of [`RawRunRecord`]s. Blank lines are ignored; a line
/// that is not a JSON object is a hard error with its line number.
pub fn load_records_jsonl(path: &Path) -> Result<Vec<RawRunRecord>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read records {}", path.display()))?;
    let mut records = Vec::new();
    for (idx, line) in data.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: RawRunRecord = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid record", path.display(), idx + 1))?;
        records.push(record);
    }
    debug!(path = %path.display(), records = records.len(), "loaded records");
    Ok(records)
}

pub fn load_run_summary(path: &Path) -> Result<RunSummary> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read run summary {}", path.display()))?;
    let summary: RunSummary = serde_json::from_str(&data)
        .with_context(|| format!("invalid run summary {}", path.display()))?;
    Ok(summary)
}

/// Files below `dir` with the given extension, sorted so batch contents do
/// not depend on directory iteration order.
pub fn find_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(extension))
            .unwrap_or(false);
        if matches {
            out.push(entry.path().to_path_buf());
        }
    }
    out.sort();
    Ok(out)
}

/// Loads every run summary under `dir`. Unreadable files are logged and
/// skipped, the same as malformed records.
pub fn load_run_summaries(dir: &Path) -> Result<Vec<RawRunRecord>> {
    let mut records = Vec::new();
    for path in find_files(dir, "json")? {
        match load_run_summary(&path) {
            Ok(summary) => records.extend(summary.into_records()),
            Err(err) => warn!(path = %path.display(), error = %err, "skipping run summary"),
        }
    }
    Ok(records)
}
