use thiserror::Error;

/// A raw record that cannot contribute a cell. Never fatal: the builder logs
/// it, counts it under [`RecordError::reason`], and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("record outcome `{0}` is not a success/failure value")]
    UnresolvableOutcome(String),
}

impl RecordError {
    pub fn reason(&self) -> String {
        match self {
            RecordError::MissingField(field) => format!("missing_{}", field),
            RecordError::UnresolvableOutcome(_) => "unresolvable_outcome".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported normalizer config schema_version: {0}")]
    UnsupportedSchemaVersion(String),
    #[error("invalid {kind} pattern `{pattern}`: {source}")]
    InvalidPattern {
        kind: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("scaffold tag for pattern `{0}` is empty")]
    EmptyScaffoldTag(String),
    #[error("effort keyword `{0}` is empty")]
    EmptyEffortKeyword(String),
    #[error("alias `{alias}` has release_date `{value}`, expected YYYY_MM_DD")]
    InvalidReleaseDate { alias: String, value: String },
    #[error("failed to parse normalizer config: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("matrix table is empty")]
    Empty,
    #[error("matrix header must start with `test_taker_id`, found `{0}`")]
    BadHeader(String),
    #[error("column `{0}` is not of the form <benchmark>.<task_id>")]
    BadColumn(String),
    #[error("line {line}: expected {expected} fields, found {found}")]
    RaggedRow {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: cell `{value}` is not 0, 1 or empty")]
    BadCell { line: usize, value: String },
}
