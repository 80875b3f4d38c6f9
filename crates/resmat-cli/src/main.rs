use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use resmat_core::records::find_files;
use resmat_core::table::{atomic_write_bytes, write_labels_csv};
use resmat_core::{
    load_config, load_matrix, load_records_jsonl, load_rubric_rows, load_run_summaries,
    save_matrix, MatrixBuilder, MatrixMerger, NameNormalizer, NormalizerConfig, ResultMatrix,
    RubricAligner, RunIndex,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "resmat",
    version = "0.3.0",
    about = "Build and merge normalized agent result matrices"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the canonical identity for one raw agent/model pair.
    Normalize {
        #[arg(long)]
        scaffold: String,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Build one batch matrix from record files and run summaries.
    Build {
        #[arg(long = "records")]
        records: Vec<PathBuf>,
        #[arg(long)]
        traces: Option<PathBuf>,
        /// Keep only these benchmarks (repeatable); `taubench` also keeps `taubench_airline`.
        #[arg(long = "benchmark")]
        benchmarks: Vec<String>,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        runs_out: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    Merge {
        inputs: Vec<PathBuf>,
        #[arg(long)]
        dir: Option<PathBuf>,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    AlignRubrics {
        #[arg(long)]
        matrix: PathBuf,
        #[arg(long)]
        rubrics: PathBuf,
        #[arg(long)]
        runs: Option<PathBuf>,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        labels_dir: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    Describe {
        matrix: PathBuf,
        #[arg(long)]
        json: bool,
    },
    ConfigInit {
        #[arg(long, default_value = "resmat.yaml")]
        out: PathBuf,
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let json_mode = command_json_mode(&cli.command);
    let result = run_command(cli.command);
    match result {
        Ok(Some(payload)) => {
            emit_json(&payload);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            if json_mode {
                emit_json(&json_error("command_failed", format!("{:#}", err), json!({})));
                std::process::exit(1);
            }
            Err(err)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_command(command: Commands) -> Result<Option<Value>> {
    match command {
        Commands::Normalize {
            scaffold,
            model,
            config,
            json,
        } => {
            let normalizer = normalizer(config.as_deref())?;
            let identity = normalizer.normalize(&scaffold, model.as_deref());
            let degenerate = normalizer.is_degenerate(&identity);
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "normalize",
                    "test_taker_id": identity.test_taker_id(),
                    "identity": identity,
                    "degenerate": degenerate
                })));
            }
            println!("test_taker_id: {}", identity);
            println!("scaffold: {}", identity.scaffold);
            println!("model: {}", identity.model);
            let efforts: Vec<&str> = identity.reasoning_effort.iter().map(String::as_str).collect();
            println!("reasoning_effort: {}", efforts.join(","));
            if degenerate {
                println!("degenerate: true");
            }
        }
        Commands::Build {
            records,
            traces,
            benchmarks,
            out,
            runs_out,
            config,
            json,
        } => {
            if records.is_empty() && traces.is_none() {
                return Err(anyhow!("build needs --records and/or --traces"));
            }
            let normalizer = normalizer(config.as_deref())?;
            let mut builder = MatrixBuilder::new(&normalizer).with_benchmarks(benchmarks);
            for path in &records {
                builder.extend(&load_records_jsonl(path)?);
            }
            if let Some(dir) = &traces {
                builder.extend(&load_run_summaries(dir)?);
            }
            let (matrix, runs, report) = builder.finish();
            save_matrix(&out, &matrix)?;
            if let Some(path) = &runs_out {
                atomic_write_bytes(path, &serde_json::to_vec_pretty(&runs)?)
                    .with_context(|| format!("failed to write run index {}", path.display()))?;
            }
            info!(out = %out.display(), rows = report.rows, "wrote batch matrix");
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "build",
                    "out": out.display().to_string(),
                    "digest": matrix.digest(),
                    "report": report
                })));
            }
            println!("wrote: {}", out.display());
            println!("records_seen: {}", report.records_seen);
            println!("records_accepted: {}", report.records_accepted);
            for (reason, count) in &report.records_skipped {
                println!("skipped.{}: {}", reason, count);
            }
            println!("records_degenerate: {}", report.records_degenerate);
            if report.records_filtered > 0 {
                println!("records_filtered: {}", report.records_filtered);
            }
            println!("rows: {}", report.rows);
            println!("columns: {}", report.columns);
            if let Some(path) = &runs_out {
                println!("wrote: {}", path.display());
            }
        }
        Commands::Merge {
            inputs,
            dir,
            out,
            config,
            json,
        } => {
            let normalizer = normalizer(config.as_deref())?;
            let mut paths = inputs;
            if let Some(dir) = &dir {
                paths.extend(find_files(dir, "csv")?);
                paths.extend(find_files(dir, "json")?);
            }
            if paths.is_empty() {
                return Err(anyhow!("merge needs input matrices or --dir"));
            }
            let matrices = paths
                .iter()
                .map(|p| load_matrix(p))
                .collect::<Result<Vec<ResultMatrix>>>()?;
            let (merged, report) = MatrixMerger::new(&normalizer).merge(&matrices);
            save_matrix(&out, &merged)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "merge",
                    "out": out.display().to_string(),
                    "report": report
                })));
            }
            println!("wrote: {}", out.display());
            println!("inputs: {}", report.inputs);
            println!("input_rows: {}", report.input_rows);
            println!("output_rows: {}", report.output_rows);
            println!("output_columns: {}", report.output_columns);
            println!("rows_renamed: {}", report.rows_renamed);
            println!("rows_collapsed: {}", report.rows_collapsed);
            println!("conflicts_resolved: {}", report.conflicts_resolved);
            for key in &report.dropped_keys {
                println!("dropped: {}", key);
            }
            println!("digest: {}", report.digest);
        }
        Commands::AlignRubrics {
            matrix,
            rubrics,
            runs,
            out,
            labels_dir,
            config,
            json,
        } => {
            let normalizer = normalizer(config.as_deref())?;
            let matrix = load_matrix(&matrix)?;
            let rows = load_rubric_rows(&rubrics)?;
            let mut aligner = RubricAligner::new(&normalizer, &matrix);
            if let Some(path) = &runs {
                aligner = aligner.with_run_index(load_run_index(path)?);
            }
            let alignment = aligner.align(&rows);

            if let Some(path) = &out {
                let mut lines = String::new();
                for row in &alignment.rows {
                    lines.push_str(&serde_json::to_string(row)?);
                    lines.push('\n');
                }
                atomic_write_bytes(path, lines.as_bytes())
                    .with_context(|| format!("failed to write alignment {}", path.display()))?;
            }
            let mut written = Vec::new();
            if let Some(dir) = &labels_dir {
                for (rubric, labels) in &alignment.labels {
                    let path = dir.join(format!("{}.csv", rubric));
                    write_labels_csv(&path, labels)?;
                    written.push(path.display().to_string());
                }
            }
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "align-rubrics",
                    "report": alignment.report,
                    "label_tables": written
                })));
            }
            let report = &alignment.report;
            println!("rows: {}", report.rows);
            println!("matched_by_run_id: {}", report.matched_by_run_id);
            println!("matched_by_model: {}", report.matched_by_model);
            println!("unmatched: {}", report.unmatched);
            for (reason, count) in &report.unmatched_reasons {
                println!("unmatched.{}: {}", reason, count);
            }
            println!("ambiguous: {}", report.ambiguous);
            println!("label_conflicts: {}", report.label_conflicts);
            if let Some(path) = &out {
                println!("wrote: {}", path.display());
            }
            for path in &written {
                println!("wrote: {}", path);
            }
        }
        Commands::Describe { matrix, json } => {
            let loaded = load_matrix(&matrix)?;
            let summary = describe_matrix(&loaded);
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "describe",
                    "matrix": matrix.display().to_string(),
                    "summary": summary
                })));
            }
            println!("matrix: {}", matrix.display());
            for key in ["rows", "columns", "observed_cells", "successes", "density", "digest"] {
                println!("{}: {}", key, plain(&summary[key]));
            }
            if let Some(benchmarks) = summary["benchmarks"].as_object() {
                for (name, tasks) in benchmarks {
                    println!("benchmark.{}: {}", name, tasks);
                }
            }
        }
        Commands::ConfigInit { out, force } => {
            if out.exists() && !force {
                return Err(anyhow!(
                    "{} already exists (use --force to overwrite)",
                    out.display()
                ));
            }
            let yaml = NormalizerConfig::default().to_yaml_string()?;
            atomic_write_bytes(&out, yaml.as_bytes())?;
            println!("wrote: {}", out.display());
            println!("next: resmat normalize --config {} --scaffold <agent> --model <model>", out.display());
        }
    }
    Ok(None)
}

fn normalizer(config: Option<&Path>) -> Result<NameNormalizer> {
    let config = match config {
        Some(path) => load_config(path)?,
        None => NormalizerConfig::default(),
    };
    Ok(NameNormalizer::new(config)?)
}

fn load_run_index(path: &Path) -> Result<RunIndex> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read run index {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("invalid run index {}", path.display()))
}

fn describe_matrix(matrix: &ResultMatrix) -> Value {
    let columns = matrix.columns();
    let mut benchmarks: BTreeMap<&str, usize> = BTreeMap::new();
    for task in &columns {
        *benchmarks.entry(task.benchmark.as_str()).or_default() += 1;
    }
    let cells = matrix.row_count() * columns.len();
    let density = if cells == 0 {
        0.0
    } else {
        matrix.observed_cells() as f64 / cells as f64
    };
    json!({
        "rows": matrix.row_count(),
        "columns": columns.len(),
        "observed_cells": matrix.observed_cells(),
        "successes": matrix.success_count(),
        "density": density,
        "digest": matrix.digest(),
        "benchmarks": benchmarks
    })
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn emit_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!(
            "{{\"ok\":false,\"error\":{{\"code\":\"serialization_error\",\"message\":\"failed to serialize JSON payload\",\"details\":{{}}}}}}"
        ),
    }
}

fn json_error(code: &str, message: String, details: Value) -> Value {
    json!({
        "ok": false,
        "error": {
            "code": code,
            "message": message,
            "details": details
        }
    })
}

fn command_json_mode(command: &Commands) -> bool {
    match command {
        Commands::Normalize { json, .. }
        | Commands::Build { json, .. }
        | Commands::Merge { json, .. }
        | Commands::AlignRubrics { json, .. }
        | Commands::Describe { json, .. } => *json,
        Commands::ConfigInit { .. } => false,
    }
}
