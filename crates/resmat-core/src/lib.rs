//! Normalized test-taker by task result matrices built from heterogeneous
//! agent evaluation runs.

pub mod builder;
pub mod config;
pub mod error;
pub mod identity;
pub mod matrix;
pub mod merge;
pub mod records;
pub mod rubric;
pub mod table;

pub use builder::{build_matrix, BuildReport, MatrixBuilder, RunIndex};
pub use config::{load_config, NormalizerConfig};
pub use error::{ConfigError, RecordError, TableError};
pub use identity::{CanonicalIdentity, NameNormalizer};
pub use matrix::{Outcome, ResultMatrix, TaskKey};
pub use merge::{merge_matrices, MatrixMerger, MergeReport};
pub use records::{load_records_jsonl, load_run_summaries, RawRunRecord};
pub use rubric::{label_outcome, load_rubric_rows, Alignment, LabelTable, RubricAligner, RubricRow};
pub use table::{load_matrix, save_matrix};
