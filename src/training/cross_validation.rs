//! Cross-validation splitters and the leakage-safe evaluation driver

use super::models::{HyperParams, ModelMetrics, Regressor};
use crate::error::{ContinuumError, Result};
use crate::utils::{check_xy, map_jobs, JobsConfig};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Cross-validation strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CVStrategy {
    /// K-Fold cross-validation
    KFold { n_splits: usize, shuffle: bool },
    /// Stratified K-Fold (keeps label proportions per fold)
    StratifiedKFold { n_splits: usize, shuffle: bool },
    /// Repeated shuffled K-Fold
    RepeatedKFold { n_splits: usize, n_repeats: usize },
    /// Repeated shuffled stratified K-Fold
    RepeatedStratifiedKFold { n_splits: usize, n_repeats: usize },
    /// Leave-one-out cross-validation
    LeaveOneOut,
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::KFold { n_splits: 5, shuffle: true }
    }
}

/// A single train/test split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: Option<u64>,
}

fn rng_for(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

fn check_n_splits(n_samples: usize, n_splits: usize) -> Result<()> {
    if n_splits < 2 {
        return Err(ContinuumError::ValidationError(
            "n_splits must be at least 2".to_string(),
        ));
    }
    if n_samples < n_splits {
        return Err(ContinuumError::ValidationError(format!(
            "n_samples ({}) must be >= n_splits ({})",
            n_samples, n_splits
        )));
    }
    Ok(())
}

/// Build splits from a fold assignment (one test-index list per fold)
fn splits_from_folds(folds: &[Vec<usize>], offset: usize) -> Vec<CVSplit> {
    (0..folds.len())
        .map(|fold_idx| {
            let mut train_indices: Vec<usize> = folds
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != fold_idx)
                .flat_map(|(_, f)| f.iter().copied())
                .collect();
            train_indices.sort_unstable();
            let mut test_indices = folds[fold_idx].clone();
            test_indices.sort_unstable();
            CVSplit {
                train_indices,
                test_indices,
                fold_idx: offset + fold_idx,
            }
        })
        .collect()
}

impl CrossValidator {
    /// Create a new cross-validator
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: None,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn strategy(&self) -> &CVStrategy {
        &self.strategy
    }

    /// Generate train/test splits. Stratified strategies need `labels`.
    pub fn split(&self, n_samples: usize, labels: Option<&Array1<f64>>) -> Result<Vec<CVSplit>> {
        match &self.strategy {
            CVStrategy::KFold { n_splits, shuffle } => {
                let seed = if *shuffle { Some(self.random_state) } else { None };
                self.k_fold_split(n_samples, *n_splits, seed, 0)
            }
            CVStrategy::StratifiedKFold { n_splits, shuffle } => {
                let labels = Self::require_labels(labels, n_samples)?;
                let seed = if *shuffle { Some(self.random_state) } else { None };
                self.stratified_k_fold_split(labels, *n_splits, seed, 0)
            }
            CVStrategy::RepeatedKFold { n_splits, n_repeats } => {
                let mut all_splits = Vec::with_capacity(n_splits * n_repeats);
                for repeat in 0..*n_repeats {
                    let seed = self.random_state.map(|s| s.wrapping_add(repeat as u64));
                    all_splits.extend(self.k_fold_split(n_samples, *n_splits, Some(seed), repeat * n_splits)?);
                }
                Ok(all_splits)
            }
            CVStrategy::RepeatedStratifiedKFold { n_splits, n_repeats } => {
                let labels = Self::require_labels(labels, n_samples)?;
                let mut all_splits = Vec::with_capacity(n_splits * n_repeats);
                for repeat in 0..*n_repeats {
                    let seed = self.random_state.map(|s| s.wrapping_add(repeat as u64));
                    all_splits.extend(self.stratified_k_fold_split(labels, *n_splits, Some(seed), repeat * n_splits)?);
                }
                Ok(all_splits)
            }
            CVStrategy::LeaveOneOut => self.leave_one_out_split(n_samples),
        }
    }

    fn require_labels(labels: Option<&Array1<f64>>, n_samples: usize) -> Result<&Array1<f64>> {
        let labels = labels.ok_or_else(|| {
            ContinuumError::ValidationError("stratified splitting requires labels".to_string())
        })?;
        if labels.len() != n_samples {
            return Err(ContinuumError::ShapeError {
                expected: format!("{} labels", n_samples),
                actual: format!("{} labels", labels.len()),
            });
        }
        Ok(labels)
    }

    /// `shuffle_seed`: None = keep order, Some(seed) = shuffle with that seed
    /// (Some(None) draws from entropy).
    fn k_fold_split(
        &self,
        n_samples: usize,
        n_splits: usize,
        shuffle_seed: Option<Option<u64>>,
        offset: usize,
    ) -> Result<Vec<CVSplit>> {
        check_n_splits(n_samples, n_splits)?;

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if let Some(seed) = shuffle_seed {
            indices.shuffle(&mut rng_for(seed));
        }

        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;
        let mut folds = Vec::with_capacity(n_splits);
        let mut current = 0;
        for i in 0..n_splits {
            let fold_size = if i < remainder { base + 1 } else { base };
            folds.push(indices[current..current + fold_size].to_vec());
            current += fold_size;
        }

        Ok(splits_from_folds(&folds, offset))
    }

    fn stratified_k_fold_split(
        &self,
        labels: &Array1<f64>,
        n_splits: usize,
        shuffle_seed: Option<Option<u64>>,
        offset: usize,
    ) -> Result<Vec<CVSplit>> {
        check_n_splits(labels.len(), n_splits)?;

        // ordered map so fold assignment does not depend on hash order
        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (idx, &val) in labels.iter().enumerate() {
            class_indices.entry(val.round() as i64).or_default().push(idx);
        }

        if let Some(seed) = shuffle_seed {
            let mut rng = rng_for(seed);
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        // round-robin continues across classes so fold sizes stay balanced
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut next = 0;
        for indices in class_indices.values() {
            for &idx in indices {
                folds[next % n_splits].push(idx);
                next += 1;
            }
        }

        Ok(splits_from_folds(&folds, offset))
    }

    fn leave_one_out_split(&self, n_samples: usize) -> Result<Vec<CVSplit>> {
        check_n_splits(n_samples, 2)?;
        Ok((0..n_samples)
            .map(|i| CVSplit {
                train_indices: (0..n_samples).filter(|&j| j != i).collect(),
                test_indices: vec![i],
                fold_idx: i,
            })
            .collect())
    }
}

/// Shuffled hold-out split; returns sorted (train, test) row indices.
/// The test part gets `ceil(test_size * n_samples)` rows.
pub fn train_test_split(n_samples: usize, test_size: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ContinuumError::ConfigError(format!(
            "test_size must lie in (0, 1), got {}",
            test_size
        )));
    }
    let n_test = (test_size * n_samples as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(ContinuumError::ValidationError(format!(
            "cannot hold out {} of {} samples",
            n_test, n_samples
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    indices.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));

    let mut test = indices[..n_test].to_vec();
    let mut train = indices[n_test..].to_vec();
    test.sort_unstable();
    train.sort_unstable();
    Ok((train, test))
}

/// Cross-validation results for one metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    /// Scores for each fold
    pub scores: Vec<f64>,
    /// Mean score across folds
    pub mean_score: f64,
    /// Standard deviation of scores
    pub std_score: f64,
    /// Number of folds
    pub n_folds: usize,
}

impl CVResults {
    /// Create CV results from fold scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        if n_folds == 0 {
            return Self {
                scores,
                mean_score: f64::NAN,
                std_score: f64::NAN,
                n_folds,
            };
        }
        let mean_score = scores.iter().sum::<f64>() / n_folds as f64;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds as f64;

        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
            n_folds,
        }
    }
}

/// Metric selector for summarising folds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    Mse,
    Rmse,
    Mae,
    R2,
    PearsonR,
    SpearmanR,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::Mse,
        Metric::Rmse,
        Metric::Mae,
        Metric::R2,
        Metric::PearsonR,
        Metric::SpearmanR,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Mse => "MSE",
            Metric::Rmse => "RMSE",
            Metric::Mae => "MAE",
            Metric::R2 => "R2",
            Metric::PearsonR => "pearson_r",
            Metric::SpearmanR => "spearman_r",
        }
    }

    pub fn of(&self, metrics: &ModelMetrics) -> Option<f64> {
        match self {
            Metric::Mse => metrics.mse,
            Metric::Rmse => metrics.rmse,
            Metric::Mae => metrics.mae,
            Metric::R2 => metrics.r2,
            Metric::PearsonR => metrics.pearson_r,
            Metric::SpearmanR => metrics.spearman_r,
        }
    }
}

/// Outcome of one fold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldReport {
    pub fold_idx: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub train: ModelMetrics,
    pub test: ModelMetrics,
    /// Final-estimator parameters after fitting this fold
    pub params: HyperParams,
}

/// Outcome of a full cross-validation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVReport {
    pub folds: Vec<FoldReport>,
}

impl CVReport {
    /// Test-fold scores for `metric`; folds where it is undefined are skipped
    pub fn test_scores(&self, metric: Metric) -> CVResults {
        CVResults::from_scores(self.folds.iter().filter_map(|f| metric.of(&f.test)).collect())
    }

    /// Train-fold scores for `metric`
    pub fn train_scores(&self, metric: Metric) -> CVResults {
        CVResults::from_scores(self.folds.iter().filter_map(|f| metric.of(&f.train)).collect())
    }
}

/// Evaluate `template` over `splits`.
///
/// Every fold gets its own unfitted copy of the template, fitted on the
/// fold's training rows only and then scored on both partitions. The first
/// failing fold aborts the whole evaluation.
pub fn cross_validate(
    template: &dyn Regressor,
    x: &Array2<f64>,
    y: &Array1<f64>,
    splits: &[CVSplit],
    jobs: JobsConfig,
) -> Result<CVReport> {
    check_xy(x, y)?;
    if splits.is_empty() {
        return Err(ContinuumError::ConfigError("no cross-validation splits".to_string()));
    }
    if let Some(bad) = splits
        .iter()
        .flat_map(|s| s.train_indices.iter().chain(s.test_indices.iter()))
        .find(|&&i| i >= x.nrows())
    {
        return Err(ContinuumError::ValidationError(format!(
            "split index {} out of range for {} samples",
            bad,
            x.nrows()
        )));
    }

    info!(
        estimator = template.name(),
        n_folds = splits.len(),
        n_samples = x.nrows(),
        "Starting cross-validation"
    );

    let folds = map_jobs(splits, jobs, |split| {
        let x_train = x.select(Axis(0), &split.train_indices);
        let y_train = y.select(Axis(0), &split.train_indices);
        let x_test = x.select(Axis(0), &split.test_indices);
        let y_test = y.select(Axis(0), &split.test_indices);

        let mut model = template.fresh();
        model.fit(&x_train, &y_train)?;

        let train = ModelMetrics::compute_regression(&y_train, &model.predict(&x_train)?)?;
        let test = ModelMetrics::compute_regression(&y_test, &model.predict(&x_test)?)?;

        debug!(fold = split.fold_idx, test_r2 = ?test.r2, "Fold finished");

        Ok(FoldReport {
            fold_idx: split.fold_idx,
            n_train: split.train_indices.len(),
            n_test: split.test_indices.len(),
            train,
            test,
            params: model.params(),
        })
    })?;

    let report = CVReport { folds };
    info!(
        mean_test_r2 = report.test_scores(Metric::R2).mean_score,
        "Cross-validation finished"
    );
    Ok(report)
}
