//! Command-line interface
//!
//! `predict` runs the hold-out + repeated k-fold evaluation of a named
//! pipeline; `heuristic` prints the row-norm heuristic C for a data file.

use clap::{Args, Parser, Subcommand};
use colored::*;
use ndarray::Axis;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use crate::data::{columns_to_array2, load_feature_table, numeric_column_names, read_csv, TableSpec};
use crate::pipeline::{PipelineBuilder, PipelineKind};
use crate::preprocessing::{Scaler, Transformer};
use crate::training::{
    cross_validate, heuristic_c, mean_row_norm, train_test_split, CVResults, CVStrategy,
    CrossValidator, HyperParams, Metric, ModelMetrics, Regressor,
};
use crate::utils::JobsConfig;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString {
    s.truecolor(100, 100, 100)
}

fn accent(s: &str) -> ColoredString {
    s.truecolor(120, 170, 255)
}

fn muted(s: &str) -> ColoredString {
    s.truecolor(140, 140, 140)
}

fn ok(s: &str) -> ColoredString {
    s.truecolor(100, 210, 120)
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "confound-continuum")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Leakage-safe confound removal and heuristic regression pipelines")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate a pipeline with a hold-out split and repeated k-fold CV
    Predict(PredictArgs),

    /// Print the heuristic C for the selected columns of a data file
    Heuristic(HeuristicArgs),
}

#[derive(Args, Debug, Clone)]
pub struct PredictArgs {
    /// CSV file with one row per subject
    #[arg(short, long)]
    pub data: PathBuf,

    /// Target column
    #[arg(short, long)]
    pub target: String,

    /// Feature columns (default: all other numeric columns)
    #[arg(short, long, value_delimiter = ',')]
    pub features: Vec<String>,

    /// Confound columns, appended after the features
    #[arg(short, long, value_delimiter = ',')]
    pub confounds: Vec<String>,

    /// Categorical columns left unscaled
    #[arg(long, value_delimiter = ',')]
    pub categorical: Vec<String>,

    /// Pipeline name
    #[arg(short, long, default_value = "linear_svr_l1_heuristic_zscore")]
    pub pipeline: String,

    #[arg(long, default_value = "5")]
    pub folds: usize,

    #[arg(long, default_value = "1")]
    pub repeats: usize,

    /// Fraction of samples held out for the final test
    #[arg(long, default_value = "0.2")]
    pub test_size: f64,

    #[arg(long, default_value = "43")]
    pub seed: u64,

    /// Worker threads for fold evaluation
    #[arg(long)]
    pub n_jobs: Option<usize>,

    /// Write the JSON summary here
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct HeuristicArgs {
    /// CSV file
    #[arg(short, long)]
    pub data: PathBuf,

    /// Columns to use (default: all numeric columns)
    #[arg(short, long, value_delimiter = ',')]
    pub columns: Vec<String>,

    /// z-score the columns first, as the pipelines do
    #[arg(long)]
    pub zscore: bool,
}

// ─── Summaries ─────────────────────────────────────────────────────────────────

/// Result of `predict`, written as JSON
#[derive(Debug, Clone, Serialize)]
pub struct PredictSummary {
    pub pipeline: String,
    pub target: String,
    pub features: Vec<String>,
    pub confounds: Vec<String>,
    pub n_train: usize,
    pub n_test: usize,
    pub n_folds: usize,
    /// Test-fold scores per metric
    pub cv_test: BTreeMap<String, CVResults>,
    /// Train-fold scores per metric
    pub cv_train: BTreeMap<String, CVResults>,
    /// Hyperparameters chosen in each fold
    pub fold_params: Vec<HyperParams>,
    /// Final pipeline, refitted on the whole training split, on the hold-out
    pub holdout: ModelMetrics,
    pub final_params: HyperParams,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeuristicSummary {
    pub columns: Vec<String>,
    pub n_samples: usize,
    pub mean_row_norm: f64,
    pub c: f64,
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_predict(args: &PredictArgs) -> anyhow::Result<PredictSummary> {
    section("Predict");
    let kind: PipelineKind = args.pipeline.parse()?;

    step_run("Loading data");
    let start = Instant::now();
    let spec = TableSpec::new(args.target.clone())
        .with_features(args.features.clone())
        .with_confounds(args.confounds.clone());
    let (table, y) = load_feature_table(&args.data, &spec)?;
    step_done(&format!(
        "{} subjects × {} features + {} confounds in {:?}",
        table.n_samples(),
        table.n_features(),
        table.n_confounds(),
        start.elapsed()
    ));

    let (train_idx, test_idx) = train_test_split(table.n_samples(), args.test_size, args.seed)?;
    let train = table.select_rows(&train_idx)?;
    let test = table.select_rows(&test_idx)?;
    let y_train = y.select(Axis(0), &train_idx);
    let y_test = y.select(Axis(0), &test_idx);

    let template = PipelineBuilder::new(kind)
        .for_table(&train, &args.categorical)?
        .random_state(args.seed)
        .build()?;

    let strategy = if args.repeats > 1 {
        CVStrategy::RepeatedKFold {
            n_splits: args.folds,
            n_repeats: args.repeats,
        }
    } else {
        CVStrategy::KFold {
            n_splits: args.folds,
            shuffle: true,
        }
    };
    let splits = CrossValidator::new(strategy)
        .with_random_state(args.seed)
        .split(train.n_samples(), None)?;

    step_run(&format!("Cross-validating {}", kind.as_str().cyan()));
    let start = Instant::now();
    let report = cross_validate(
        &template,
        train.data(),
        &y_train,
        &splits,
        JobsConfig::new(args.n_jobs),
    )?;
    step_done(&format!("{} folds in {:?}", splits.len(), start.elapsed()));

    step_run("Fitting final pipeline");
    let mut final_pipeline = template;
    final_pipeline.fit_table(&train, &y_train)?;
    let holdout = ModelMetrics::compute_regression(&y_test, &final_pipeline.predict_table(&test)?)?;
    step_done(&format!("{} held-out subjects", test.n_samples()));

    let summary = PredictSummary {
        pipeline: kind.as_str().to_string(),
        target: args.target.clone(),
        features: table.feature_names().to_vec(),
        confounds: table.confound_names().to_vec(),
        n_train: train.n_samples(),
        n_test: test.n_samples(),
        n_folds: splits.len(),
        cv_test: Metric::ALL
            .iter()
            .map(|m| (m.name().to_string(), report.test_scores(*m)))
            .collect(),
        cv_train: Metric::ALL
            .iter()
            .map(|m| (m.name().to_string(), report.train_scores(*m)))
            .collect(),
        fold_params: report.folds.iter().map(|f| f.params.clone()).collect(),
        holdout,
        final_params: final_pipeline.params(),
    };

    print_predict_summary(&summary);

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(path, json)?;
        println!("  {} {}", ok("✓"), format!("Summary → {}", path.display()));
        println!();
    }

    Ok(summary)
}

fn print_predict_summary(summary: &PredictSummary) {
    section("Cross-validation (test folds)");
    for metric in [Metric::R2, Metric::Mae, Metric::Rmse, Metric::PearsonR] {
        if let Some(res) = summary.cv_test.get(metric.name()) {
            kv(metric.name(), &format!("{:.4} ± {:.4}", res.mean_score, res.std_score));
        }
    }

    section("Hold-out");
    let show = |v: Option<f64>| v.map_or("n/a".to_string(), |v| format!("{:.4}", v));
    kv("R2", &show(summary.holdout.r2));
    kv("MAE", &show(summary.holdout.mae));
    kv("RMSE", &show(summary.holdout.rmse));
    kv("pearson_r", &show(summary.holdout.pearson_r));
    for (name, value) in &summary.final_params {
        kv(name, &value.to_string());
    }
    println!();
}

pub fn cmd_heuristic(args: &HeuristicArgs) -> anyhow::Result<HeuristicSummary> {
    section("Heuristic C");

    let df = read_csv(&args.data)?;
    let columns = if args.columns.is_empty() {
        numeric_column_names(&df)
    } else {
        args.columns.clone()
    };
    let complete = df
        .select(columns.iter().map(|s| s.as_str()))?
        .drop_nulls::<String>(None)?;
    let mut x = columns_to_array2(&complete, &columns)?;

    if args.zscore {
        x = Scaler::standard().fit_transform(&x)?;
    }

    let mean_norm = mean_row_norm(&x)?;
    let params = heuristic_c(&x)?;
    let c = params
        .get("C")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| anyhow::anyhow!("heuristic did not produce C"))?;

    kv("Columns", &columns.len().to_string());
    kv("Subjects", &x.nrows().to_string());
    kv("Mean row norm", &format!("{:.6}", mean_norm));
    kv("C", &format!("{:.6}", c).white().bold().to_string());
    println!();

    Ok(HeuristicSummary {
        columns,
        n_samples: x.nrows(),
        mean_row_norm: mean_norm,
        c,
    })
}
