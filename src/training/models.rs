//! Regressor capability set, typed hyperparameters and regression metrics

use crate::error::{ContinuumError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Numeric view of the value (integers widen to f64)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        match self {
            ParamValue::Int(v) if *v >= 0 => Some(*v as usize),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// Named hyperparameter overrides, ordered by name
pub type HyperParams = BTreeMap<String, ParamValue>;

/// Build an `InvalidParameter` error for a value of the wrong kind or range
pub(crate) fn invalid_param(name: &str, value: &ParamValue, reason: &str) -> ContinuumError {
    ContinuumError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Build an `UnknownParameter` error for a name the estimator does not expose
pub(crate) fn unknown_param(estimator: &str, name: &str) -> ContinuumError {
    ContinuumError::UnknownParameter {
        estimator: estimator.to_string(),
        name: name.to_string(),
    }
}

/// Read a strictly positive, finite float parameter
pub(crate) fn positive_f64(name: &str, value: &ParamValue) -> Result<f64> {
    match value.as_f64() {
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(invalid_param(name, value, "must be a finite number > 0")),
    }
}

/// Read a non-negative, finite float parameter
pub(crate) fn non_negative_f64(name: &str, value: &ParamValue) -> Result<f64> {
    match value.as_f64() {
        Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(invalid_param(name, value, "must be a finite number >= 0")),
    }
}

/// Regression estimator capability set.
///
/// Every estimator that can sit at the end of a pipeline (or inside the
/// confound remover as nuisance model) implements this. `fresh` produces an
/// unfitted instance carrying the same configuration, which is how per-fold
/// and per-column copies are made.
pub trait Regressor: Send + Sync + fmt::Debug {
    /// Short estimator name used in logs and errors
    fn name(&self) -> &'static str;

    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// R² of the predictions on `x` against `y`
    fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        let y_pred = self.predict(x)?;
        r2_score(y, &y_pred)
    }

    /// Names accepted by `set_params`
    fn param_names(&self) -> &'static [&'static str];

    /// Current value of a named parameter
    fn get_param(&self, name: &str) -> Option<ParamValue>;

    /// Apply a single parameter override. Unknown names are an
    /// `UnknownParameter` error.
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()>;

    /// Apply named parameter overrides. Names and values are all checked
    /// before anything is changed, so a failed call leaves `self` as it was.
    fn set_params(&mut self, params: &HyperParams) -> Result<()> {
        let known = self.param_names();
        if let Some(unknown) = params.keys().find(|k| !known.contains(&k.as_str())) {
            return Err(unknown_param(self.name(), unknown));
        }

        let mut scratch = self.fresh();
        for (name, value) in params {
            scratch.set_param(name, value)?;
        }
        for (name, value) in params {
            self.set_param(name, value)?;
        }
        Ok(())
    }

    /// Snapshot of all parameters
    fn params(&self) -> HyperParams {
        self.param_names()
            .iter()
            .filter_map(|name| self.get_param(name).map(|v| (name.to_string(), v)))
            .collect()
    }

    fn is_fitted(&self) -> bool;

    /// Unfitted copy built from this instance's configuration
    fn fresh(&self) -> Box<dyn Regressor>;
}

/// Coefficient of determination
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_paired(y_true, y_pred)?;
    let mean = y_true.mean().unwrap_or(0.0);
    let ss_tot: f64 = y_true.iter().map(|y| (y - mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();

    Ok(if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    })
}

/// Pearson correlation; `None` when either side has zero variance
pub fn pearson_r(a: &Array1<f64>, b: &Array1<f64>) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let mean_a = a.mean()?;
    let mean_b = b.mean()?;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let da = x - mean_a;
        let db = y - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a <= 0.0 || var_b <= 0.0 {
        return None;
    }
    Some(cov / (var_a.sqrt() * var_b.sqrt()))
}

/// Spearman rank correlation (ties receive their average rank)
pub fn spearman_r(a: &Array1<f64>, b: &Array1<f64>) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }
    pearson_r(&average_ranks(a), &average_ranks(b))
}

fn average_ranks(values: &Array1<f64>) -> Array1<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| values[i].total_cmp(&values[j]));

    let mut ranks = Array1::zeros(n);
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // ranks are 1-based; tied block [start, end) shares the mean rank
        let rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

fn check_paired(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(ContinuumError::ShapeError {
            expected: format!("y_pred length = {}", y_true.len()),
            actual: format!("y_pred length = {}", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(ContinuumError::ValidationError(
            "cannot score an empty target vector".to_string(),
        ));
    }
    Ok(())
}

/// Metrics for regression evaluation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Mean Squared Error
    pub mse: Option<f64>,
    /// Root Mean Squared Error
    pub rmse: Option<f64>,
    /// Mean Absolute Error
    pub mae: Option<f64>,
    /// R-squared
    pub r2: Option<f64>,
    /// Pearson correlation between truth and prediction
    pub pearson_r: Option<f64>,
    /// Spearman rank correlation between truth and prediction
    pub spearman_r: Option<f64>,
    /// Number of scored samples
    pub n_samples: usize,
}

impl ModelMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute regression metrics
    pub fn compute_regression(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        check_paired(y_true, y_pred)?;

        let n = y_true.len() as f64;
        let errors: Vec<f64> = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| t - p)
            .collect();

        let mse: f64 = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let mae: f64 = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        Ok(Self {
            mse: Some(mse),
            rmse: Some(mse.sqrt()),
            mae: Some(mae),
            r2: Some(r2_score(y_true, y_pred)?),
            pearson_r: pearson_r(y_true, y_pred),
            spearman_r: spearman_r(y_true, y_pred),
            n_samples: y_true.len(),
        })
    }
}
