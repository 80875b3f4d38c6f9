use crate::identity::NameNormalizer;
use crate::matrix::{Outcome, ResultMatrix, TaskKey};
use crate::records::RawRunRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// `run_id -> test_taker_id`, collected while building. Lets the rubric
/// aligner resolve annotations that reference a run instead of a model name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIndex {
    runs: BTreeMap<String, String>,
}

impl RunIndex {
    pub fn insert(&mut self, run_id: &str, test_taker_id: &str) {
        self.runs
            .insert(run_id.to_string(), test_taker_id.to_string());
    }

    pub fn get(&self, run_id: &str) -> Option<&str> {
        self.runs.get(run_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn extend(&mut self, other: RunIndex) {
        self.runs.extend(other.runs);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub records_seen: usize,
    pub records_accepted: usize,
    /// Skipped records by reason (`missing_task_id`, `unresolvable_outcome`, ...).
    pub records_skipped: BTreeMap<String, usize>,
    /// Records whose identity normalized to an empty or sentinel-only key.
    pub records_degenerate: usize,
    /// Records outside the benchmark filter.
    pub records_filtered: usize,
    /// Cells where a success overwrote an earlier failure.
    pub conflicts_resolved: usize,
    pub rows: usize,
    pub columns: usize,
    pub observed_cells: usize,
}

impl BuildReport {
    pub fn skipped_total(&self) -> usize {
        self.records_skipped.values().sum()
    }
}

pub struct MatrixBuilder<'a> {
    normalizer: &'a NameNormalizer,
    matrix: ResultMatrix,
    runs: RunIndex,
    report: BuildReport,
    benchmarks: BTreeSet<String>,
}

impl<'a> MatrixBuilder<'a> {
    pub fn new(normalizer: &'a NameNormalizer) -> Self {
        Self {
            normalizer,
            matrix: ResultMatrix::new(),
            runs: RunIndex::default(),
            report: BuildReport::default(),
            benchmarks: BTreeSet::new(),
        }
    }

    /// Keeps only records of the named benchmarks or their splits
    /// (`taubench` keeps `taubench_airline`). An empty set keeps everything.
    pub fn with_benchmarks(mut self, benchmarks: impl IntoIterator<Item = String>) -> Self {
        self.benchmarks = benchmarks
            .into_iter()
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .collect();
        self
    }

    fn wants_benchmark(&self, benchmark: &str) -> bool {
        let benchmark = benchmark.trim();
        self.benchmarks.is_empty()
            || self.benchmarks.iter().any(|wanted| {
                benchmark == wanted
                    || benchmark
                        .strip_prefix(wanted.as_str())
                        .is_some_and(|rest| rest.starts_with('_'))
            })
    }

    pub fn push(&mut self, record: &RawRunRecord) {
        self.report.records_seen += 1;
        if !self.wants_benchmark(&record.benchmark) {
            self.report.records_filtered += 1;
            return;
        }
        let outcome = match record.validate() {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    scaffold = %record.scaffold_raw,
                    benchmark = %record.benchmark,
                    task_id = %record.task_id,
                    error = %err,
                    "skipping record"
                );
                *self.report.records_skipped.entry(err.reason()).or_default() += 1;
                return;
            }
        };

        let identity = self
            .normalizer
            .normalize(&record.scaffold_raw, record.model_raw.as_deref());
        if self.normalizer.is_degenerate(&identity) {
            warn!(
                scaffold = %record.scaffold_raw,
                model = ?record.model_raw,
                "record normalizes to a degenerate identity"
            );
            self.report.records_degenerate += 1;
            return;
        }

        let row = identity.test_taker_id();
        let task = TaskKey::new(record.task_id.trim(), record.benchmark.trim());
        let before = self.matrix.get(&row, &task);
        self.matrix.record(&row, task, outcome);
        if before == Some(Outcome::Failure) && outcome == Outcome::Success {
            self.report.conflicts_resolved += 1;
        }
        if let Some(run_id) = record.run_id.as_deref().filter(|r| !r.trim().is_empty()) {
            self.runs.insert(run_id.trim(), &row);
        }
        self.report.records_accepted += 1;
    }

    pub fn extend<'r>(&mut self, records: impl IntoIterator<Item = &'r RawRunRecord>) {
        for record in records {
            self.push(record);
        }
    }

    pub fn finish(self) -> (ResultMatrix, RunIndex, BuildReport) {
        let mut report = self.report;
        report.rows = self.matrix.row_count();
        report.columns = self.matrix.column_count();
        report.observed_cells = self.matrix.observed_cells();
        debug!(
            rows = report.rows,
            columns = report.columns,
            accepted = report.records_accepted,
            skipped = report.skipped_total(),
            "built batch matrix"
        );
        (self.matrix, self.runs, report)
    }
}

pub fn build_matrix(
    normalizer: &NameNormalizer,
    records: &[RawRunRecord],
) -> (ResultMatrix, RunIndex, BuildReport) {
    let mut builder = MatrixBuilder::new(normalizer);
    builder.extend(records);
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NormalizerConfig;
    use crate::matrix::Outcome::{Failure, Success};

    fn normalizer() -> NameNormalizer {
        NameNormalizer::new(NormalizerConfig::default()).expect("default config")
    }

    #[test]
    fn spellings_of_one_identity_share_a_row() {
        let n = normalizer();
        let records = vec![
            RawRunRecord::new("CORE-Agent", Some("claude-3-7-sonnet-20250219"), "corebench", "t1", Failure),
            RawRunRecord::new("core agent", Some("Claude 3.7 Sonnet"), "corebench", "t1", Success),
            RawRunRecord::new("CoreAgent", Some("claude_3_7_sonnet"), "corebench", "t2", Failure),
        ];
        let (matrix, _, report) = build_matrix(&n, &records);
        assert_eq!(matrix.row_count(), 1);
        let row = "core_agent:claude_3_7_sonnet_2025_02_19";
        assert_eq!(matrix.get(row, &TaskKey::new("t1", "corebench")), Some(Success));
        assert_eq!(matrix.get(row, &TaskKey::new("t2", "corebench")), Some(Failure));
        assert_eq!(report.conflicts_resolved, 1);
        assert_eq!(report.records_accepted, 3);
    }

    #[test]
    fn success_wins_regardless_of_order() {
        let n = normalizer();
        let ok = RawRunRecord::new("SeeAct", Some("gpt-4o"), "mind2web", "t1", Success);
        let bad = RawRunRecord::new("seeact", Some("GPT-4o"), "mind2web", "t1", Failure);
        let (a, _, _) = build_matrix(&n, &[ok.clone(), bad.clone()]);
        let (b, _, _) = build_matrix(&n, &[bad, ok]);
        assert_eq!(a, b);
        assert_eq!(a.get("seeact:gpt_4o", &TaskKey::new("t1", "mind2web")), Some(Success));
    }

    #[test]
    fn invalid_records_are_counted_not_fatal() {
        let n = normalizer();
        let mut missing_task = RawRunRecord::new("SeeAct", Some("gpt-4o"), "mind2web", "", Success);
        missing_task.task_id = "  ".to_string();
        let mut bad_outcome = RawRunRecord::new("SeeAct", Some("gpt-4o"), "mind2web", "t2", Success);
        bad_outcome.outcome = Some(crate::records::OutcomeValue::Text("maybe".to_string()));
        let degenerate = RawRunRecord::new("(gpt-4o)", None, "mind2web", "t3", Success);
        let good = RawRunRecord::new("SeeAct", Some("gpt-4o"), "mind2web", "t4", Success);

        let (matrix, _, report) =
            build_matrix(&n, &[missing_task, bad_outcome, degenerate, good]);
        assert_eq!(matrix.row_count(), 1);
        assert_eq!(matrix.observed_cells(), 1);
        assert_eq!(report.records_seen, 4);
        assert_eq!(report.records_accepted, 1);
        assert_eq!(report.records_degenerate, 1);
        assert_eq!(report.records_skipped.get("missing_task_id"), Some(&1));
        assert_eq!(report.records_skipped.get("unresolvable_outcome"), Some(&1));
        assert_eq!(report.skipped_total(), 2);
    }

    #[test]
    fn run_ids_map_to_rows() {
        let n = normalizer();
        let record = RawRunRecord::new("HAL Generalist Agent", Some("o3 high"), "gaia", "t1", Success)
            .with_run_id("gaia_hal_o3_high_1");
        let (_, runs, _) = build_matrix(&n, &[record]);
        assert_eq!(runs.get("gaia_hal_o3_high_1"), Some("hal_generalist_agent:o3_high"));
        assert_eq!(runs.len(), 1);
    }

    #[test]
    fn empty_batch_builds_empty_matrix() {
        let n = normalizer();
        let (matrix, runs, report) = build_matrix(&n, &[]);
        assert!(matrix.is_empty());
        assert!(runs.is_empty());
        assert_eq!(report, BuildReport::default());
    }

    #[test]
    fn benchmark_filter_keeps_named_benchmarks_and_splits() {
        let n = normalizer();
        let records = vec![
            RawRunRecord::new("SeeAct", Some("gpt-4o"), "taubench_airline", "1", Success),
            RawRunRecord::new("SeeAct", Some("gpt-4o"), "taubench", "2", Failure),
            RawRunRecord::new("SeeAct", Some("gpt-4o"), "taubenchmark", "3", Success),
            RawRunRecord::new("SeeAct", Some("gpt-4o"), "usaco", "4", Success),
        ];
        let mut builder = MatrixBuilder::new(&n).with_benchmarks(["taubench".to_string()]);
        builder.extend(&records);
        let (matrix, _, report) = builder.finish();
        assert_eq!(matrix.column_count(), 2);
        assert_eq!(
            matrix.get("seeact:gpt_4o", &TaskKey::new("1", "taubench_airline")),
            Some(Success)
        );
        assert_eq!(report.records_seen, 4);
        assert_eq!(report.records_filtered, 2);
        assert_eq!(report.records_accepted, 2);

        let mut everything = MatrixBuilder::new(&n).with_benchmarks([" ".to_string()]);
        everything.extend(&records);
        assert_eq!(everything.finish().2.records_accepted, 4);
    }
}
