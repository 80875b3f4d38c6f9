//! Folding batch matrices into one.
//!
//! Row keys are re-normalized on the way in, so matrices written by older
//! pipeline stages (`Agent__model`, `hal_generalist_<model>`) land on the
//! same rows as freshly built ones. Cells combine by maximum under
//! `missing < failure < success`, which makes the fold commutative,
//! associative and idempotent.

use crate::identity::NameNormalizer;
use crate::matrix::ResultMatrix;
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub inputs: usize,
    pub input_rows: usize,
    pub output_rows: usize,
    pub output_columns: usize,
    pub observed_cells: usize,
    /// Input keys whose re-normalized id differs from the key itself.
    pub rows_renamed: usize,
    /// Distinct input keys that landed on an id some other key also produced.
    pub rows_collapsed: usize,
    /// Keys dropped because they normalize to an empty or sentinel identity.
    pub dropped_keys: BTreeSet<String>,
    /// Cells where a success overwrote a failure from another key or input.
    pub conflicts_resolved: usize,
    pub digest: String,
    pub generated_at: String,
}

pub struct MatrixMerger<'a> {
    normalizer: &'a NameNormalizer,
}

impl<'a> MatrixMerger<'a> {
    pub fn new(normalizer: &'a NameNormalizer) -> Self {
        Self { normalizer }
    }

    /// Re-keys one matrix through the normalizer, dropping degenerate rows.
    pub fn renormalize(&self, matrix: &ResultMatrix) -> ResultMatrix {
        let mut out = ResultMatrix::new();
        for (key, cells) in matrix.rows() {
            let identity = self.normalizer.parse_row_key(key);
            if self.normalizer.is_degenerate(&identity) {
                continue;
            }
            let row = identity.test_taker_id();
            for (task, outcome) in cells {
                out.record(&row, task.clone(), *outcome);
            }
        }
        out
    }

    pub fn merge(&self, inputs: &[ResultMatrix]) -> (ResultMatrix, MergeReport) {
        let mut merged = ResultMatrix::new();
        let mut report = MergeReport {
            inputs: inputs.len(),
            ..MergeReport::default()
        };
        let mut sources: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();

        for (idx, input) in inputs.iter().enumerate() {
            debug!(
                input = idx,
                rows = input.row_count(),
                cells = input.observed_cells(),
                "merging matrix"
            );
            for (key, cells) in input.rows() {
                report.input_rows += 1;
                let identity = self.normalizer.parse_row_key(key);
                if self.normalizer.is_degenerate(&identity) {
                    warn!(key = %key, "dropping row with degenerate identity");
                    report.dropped_keys.insert(key.clone());
                    continue;
                }
                let row = identity.test_taker_id();
                if row != *key {
                    report.rows_renamed += 1;
                }
                for (task, outcome) in cells {
                    let before = merged.get(&row, task);
                    merged.record(&row, task.clone(), *outcome);
                    if before.is_some() && before < Some(*outcome) {
                        report.conflicts_resolved += 1;
                    }
                }
                sources.entry(row).or_default().insert(key.as_str());
            }
        }

        report.rows_collapsed = sources
            .values()
            .map(|keys| keys.len().saturating_sub(1))
            .sum();
        report.output_rows = merged.row_count();
        report.output_columns = merged.column_count();
        report.observed_cells = merged.observed_cells();
        report.digest = merged.digest();
        report.generated_at = Utc::now().to_rfc3339();
        info!(
            inputs = report.inputs,
            input_rows = report.input_rows,
            output_rows = report.output_rows,
            dropped = report.dropped_keys.len(),
            "merged matrices"
        );
        (merged, report)
    }
}

/// Merge without a report, for callers that only want the matrix.
pub fn merge_matrices(normalizer: &NameNormalizer, inputs: &[ResultMatrix]) -> ResultMatrix {
    MatrixMerger::new(normalizer).merge(inputs).0
}
