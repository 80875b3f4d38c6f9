use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Observed result of one attempt. `Failure < Success`, and a missing cell
/// (`None`) sorts below both, which is the whole merge rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Failure,
    Success,
}

impl Outcome {
    pub fn as_bit(self) -> u8 {
        match self {
            Outcome::Failure => 0,
            Outcome::Success => 1,
        }
    }

    pub fn from_success(success: bool) -> Self {
        if success {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }
}

/// Column key. Ordered by task first, then benchmark.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskKey {
    pub task_id: String,
    pub benchmark: String,
}

impl TaskKey {
    pub fn new(task_id: impl Into<String>, benchmark: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            benchmark: benchmark.into(),
        }
    }

    /// `<benchmark>.<task_id>`, the tabular column header.
    pub fn header(&self) -> String {
        format!("{}.{}", self.benchmark, self.task_id)
    }

    pub fn from_header(header: &str) -> Option<Self> {
        let (benchmark, task_id) = header.split_once('.')?;
        if benchmark.is_empty() || task_id.is_empty() {
            return None;
        }
        Some(Self::new(task_id, benchmark))
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header())
    }
}

/// Sparse test-taker by task matrix. A row exists only once a cell has been
/// recorded for it; an absent cell means "not attempted".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultMatrix {
    rows: BTreeMap<String, BTreeMap<TaskKey, Outcome>>,
}

impl ResultMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Max-merges `outcome` into the cell. Returns true when the stored
    /// value changed.
    pub fn record(&mut self, row: &str, task: TaskKey, outcome: Outcome) -> bool {
        let cells = self.rows.entry(row.to_string()).or_default();
        match cells.get_mut(&task) {
            Some(existing) if *existing >= outcome => false,
            Some(existing) => {
                *existing = outcome;
                true
            }
            None => {
                cells.insert(task, outcome);
                true
            }
        }
    }

    pub fn get(&self, row: &str, task: &TaskKey) -> Option<Outcome> {
        self.rows.get(row).and_then(|cells| cells.get(task)).copied()
    }

    pub fn row(&self, row: &str) -> Option<&BTreeMap<TaskKey, Outcome>> {
        self.rows.get(row)
    }

    pub fn contains_row(&self, row: &str) -> bool {
        self.rows.contains_key(row)
    }

    pub fn rows(&self) -> impl Iterator<Item = (&String, &BTreeMap<TaskKey, Outcome>)> {
        self.rows.iter()
    }

    pub fn row_ids(&self) -> impl Iterator<Item = &String> {
        self.rows.keys()
    }

    pub fn columns(&self) -> BTreeSet<TaskKey> {
        self.rows
            .values()
            .flat_map(|cells| cells.keys().cloned())
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns().len()
    }

    pub fn observed_cells(&self) -> usize {
        self.rows.values().map(BTreeMap::len).sum()
    }

    pub fn success_count(&self) -> usize {
        self.rows
            .values()
            .flat_map(|cells| cells.values())
            .filter(|o| **o == Outcome::Success)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell-wise maximum with `other`, keeping keys as they are. Returns the
    /// number of cells whose value changed.
    pub fn merge_from(&mut self, other: &ResultMatrix) -> usize {
        let mut changed = 0;
        for (row, cells) in &other.rows {
            for (task, outcome) in cells {
                if self.record(row, task.clone(), *outcome) {
                    changed += 1;
                }
            }
        }
        changed
    }

    /// `sha256:<hex>` over the canonical JSON rendering. Identical matrices
    /// hash identically regardless of how they were assembled.
    pub fn digest(&self) -> String {
        let canonical: Vec<_> = self
            .rows
            .iter()
            .map(|(row, cells)| {
                let cells: Vec<_> = cells
                    .iter()
                    .map(|(task, outcome)| json!([task.task_id, task.benchmark, outcome.as_bit()]))
                    .collect();
                json!([row, cells])
            })
            .collect();
        let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        format!("sha256:{}", hex::encode(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(task: &str) -> TaskKey {
        TaskKey::new(task, "corebench")
    }

    #[test]
    fn cell_order_is_missing_failure_success() {
        assert!(None < Some(Outcome::Failure));
        assert!(Some(Outcome::Failure) < Some(Outcome::Success));
    }

    #[test]
    fn record_keeps_the_maximum() {
        let mut m = ResultMatrix::new();
        assert!(m.record("a:x", t("t1"), Outcome::Failure));
        assert!(m.record("a:x", t("t1"), Outcome::Success));
        assert!(!m.record("a:x", t("t1"), Outcome::Failure));
        assert_eq!(m.get("a:x", &t("t1")), Some(Outcome::Success));
        assert_eq!(m.get("a:x", &t("t2")), None);
        assert_eq!(m.get("b:y", &t("t1")), None);
    }

    #[test]
    fn columns_sort_by_task_then_benchmark() {
        let mut m = ResultMatrix::new();
        m.record("r", TaskKey::new("t2", "a"), Outcome::Success);
        m.record("r", TaskKey::new("t1", "z"), Outcome::Failure);
        m.record("r", TaskKey::new("t1", "b"), Outcome::Failure);
        let cols: Vec<String> = m.columns().iter().map(TaskKey::header).collect();
        assert_eq!(cols, vec!["b.t1", "z.t1", "a.t2"]);
    }

    #[test]
    fn header_round_trip_keeps_dots_in_task_ids() {
        let key = TaskKey::new("capsule-1.2", "corebench_hard");
        assert_eq!(key.header(), "corebench_hard.capsule-1.2");
        assert_eq!(TaskKey::from_header(&key.header()), Some(key));
        assert_eq!(TaskKey::from_header("nodot"), None);
        assert_eq!(TaskKey::from_header(".t1"), None);
    }

    #[test]
    fn digest_ignores_insertion_order() {
        let mut a = ResultMatrix::new();
        a.record("r1", t("t1"), Outcome::Success);
        a.record("r2", t("t2"), Outcome::Failure);
        let mut b = ResultMatrix::new();
        b.record("r2", t("t2"), Outcome::Failure);
        b.record("r1", t("t1"), Outcome::Success);
        assert_eq!(a.digest(), b.digest());
        b.record("r2", t("t2"), Outcome::Success);
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn counts_track_cells() {
        let mut m = ResultMatrix::new();
        m.record("r1", t("t1"), Outcome::Success);
        m.record("r1", t("t2"), Outcome::Failure);
        m.record("r2", t("t1"), Outcome::Failure);
        assert_eq!(m.row_count(), 2);
        assert_eq!(m.column_count(), 2);
        assert_eq!(m.observed_cells(), 3);
        assert_eq!(m.success_count(), 1);
    }
}
