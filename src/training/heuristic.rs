//! Data-driven hyperparameter heuristics
//!
//! A heuristic maps the feature matrix an estimator is about to be fitted on
//! to a set of hyperparameter overrides. [`HeuristicWrapper`] re-evaluates it
//! on every `fit`, so under cross-validation the value is always derived from
//! the current training fold alone.

use super::models::{HyperParams, ParamValue, Regressor};
use crate::error::{ContinuumError, Result};
use ndarray::{Array1, Array2, Axis};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Heuristic function: feature matrix -> hyperparameter overrides
pub type HeuristicFn = Arc<dyn Fn(&Array2<f64>) -> Result<HyperParams> + Send + Sync>;

/// Mean Euclidean norm of the rows of `x`
pub fn mean_row_norm(x: &Array2<f64>) -> Result<f64> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(ContinuumError::DegenerateInput(format!(
            "cannot compute row norms of a {}x{} matrix",
            x.nrows(),
            x.ncols()
        )));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(ContinuumError::ValidationError(
            "feature matrix contains non-finite values".to_string(),
        ));
    }
    let norms = x.map_axis(Axis(1), |row| row.dot(&row).sqrt());
    Ok(norms.mean().unwrap_or(0.0))
}

/// Joachims-style regularization strength for linear large-margin regressors:
/// `C = 1 / mean_i ||x_i||`.
///
/// A matrix whose rows all have zero norm has no defined `C` and is
/// rejected with [`ContinuumError::DegenerateInput`].
pub fn heuristic_c(x: &Array2<f64>) -> Result<HyperParams> {
    let mean_norm = mean_row_norm(x)?;
    if mean_norm == 0.0 {
        return Err(ContinuumError::DegenerateInput(
            "all sample rows have zero norm; heuristic C is undefined".to_string(),
        ));
    }
    let c = 1.0 / mean_norm;
    if !c.is_finite() {
        return Err(ContinuumError::DegenerateInput(format!(
            "heuristic C is not finite (mean row norm {:e})",
            mean_norm
        )));
    }
    Ok(HyperParams::from([("C".to_string(), ParamValue::Float(c))]))
}

/// [`heuristic_c`] as a shareable [`HeuristicFn`]
pub fn heuristic_c_fn() -> HeuristicFn {
    Arc::new(heuristic_c)
}

/// Wraps any [`Regressor`] and sets heuristic hyperparameters on it right
/// before each fit.
pub struct HeuristicWrapper {
    estimator: Box<dyn Regressor>,
    heuristic: HeuristicFn,
    heuristic_name: String,
    /// Overrides applied by the most recent fit
    applied: Option<HyperParams>,
}

impl fmt::Debug for HeuristicWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeuristicWrapper")
            .field("estimator", &self.estimator)
            .field("heuristic", &self.heuristic_name)
            .field("applied", &self.applied)
            .finish()
    }
}

impl HeuristicWrapper {
    pub fn new(estimator: Box<dyn Regressor>, heuristic: HeuristicFn) -> Self {
        Self {
            estimator,
            heuristic,
            heuristic_name: "custom".to_string(),
            applied: None,
        }
    }

    /// Wrap `estimator` with the default [`heuristic_c`]
    pub fn with_heuristic_c(estimator: Box<dyn Regressor>) -> Self {
        Self::new(estimator, heuristic_c_fn()).named("heuristic_c")
    }

    /// Label used for the heuristic in logs and debug output
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.heuristic_name = name.into();
        self
    }

    pub fn estimator(&self) -> &dyn Regressor {
        self.estimator.as_ref()
    }

    /// Hyperparameters the heuristic produced during the last fit
    pub fn applied_params(&self) -> Option<&HyperParams> {
        self.applied.as_ref()
    }

    fn evaluate_heuristic(&self, x: &Array2<f64>) -> Result<HyperParams> {
        let params = (self.heuristic)(x)?;
        if params.is_empty() {
            return Err(ContinuumError::ConfigError(format!(
                "heuristic '{}' returned no hyperparameters",
                self.heuristic_name
            )));
        }
        if let Some((name, value)) = params
            .iter()
            .find(|(_, v)| v.as_f64().map_or(false, |f| !f.is_finite()))
        {
            return Err(ContinuumError::ConfigError(format!(
                "heuristic '{}' returned non-finite {} = {}",
                self.heuristic_name, name, value
            )));
        }
        Ok(params)
    }
}

impl Regressor for HeuristicWrapper {
    fn name(&self) -> &'static str {
        "HeuristicWrapper"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let params = self.evaluate_heuristic(x)?;
        self.estimator.set_params(&params)?;
        debug!(
            heuristic = %self.heuristic_name,
            estimator = self.estimator.name(),
            params = ?params,
            "Applied heuristic hyperparameters"
        );
        self.applied = Some(params);
        self.estimator.fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.estimator.predict(x)
    }

    fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        self.estimator.score(x, y)
    }

    fn param_names(&self) -> &'static [&'static str] {
        self.estimator.param_names()
    }

    fn get_param(&self, name: &str) -> Option<ParamValue> {
        self.estimator.get_param(name)
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        self.estimator.set_param(name, value)
    }

    fn set_params(&mut self, params: &HyperParams) -> Result<()> {
        self.estimator.set_params(params)
    }

    fn is_fitted(&self) -> bool {
        self.estimator.is_fitted()
    }

    fn fresh(&self) -> Box<dyn Regressor> {
        Box::new(HeuristicWrapper {
            estimator: self.estimator.fresh(),
            heuristic: Arc::clone(&self.heuristic),
            heuristic_name: self.heuristic_name.clone(),
            applied: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{LinearRegression, LinearSVR};
    use ndarray::array;

    fn c_of(params: &HyperParams) -> f64 {
        params["C"].as_f64().unwrap()
    }

    #[test]
    fn test_heuristic_c_triangle() {
        let x = array![[3.0, 4.0], [0.0, 0.0]];
        let params = heuristic_c(&x).unwrap();
        assert!((c_of(&params) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_heuristic_c_scales_inversely() {
        let x = array![[1.0, 2.0], [3.0, -1.0], [0.5, 0.5]];
        let c = c_of(&heuristic_c(&x).unwrap());
        let c_scaled = c_of(&heuristic_c(&(&x * 4.0)).unwrap());
        assert!((c_scaled - c / 4.0).abs() < 1e-12);
        assert_eq!(c, c_of(&heuristic_c(&x).unwrap()));
    }

    #[test]
    fn test_heuristic_c_degenerate() {
        let x = Array2::<f64>::zeros((3, 2));
        assert!(matches!(heuristic_c(&x), Err(ContinuumError::DegenerateInput(_))));
        let empty = Array2::<f64>::zeros((0, 2));
        assert!(matches!(heuristic_c(&empty), Err(ContinuumError::DegenerateInput(_))));
    }

    #[test]
    fn test_wrapper_recomputes_per_fit() {
        let mut wrapper = HeuristicWrapper::with_heuristic_c(Box::new(LinearSVR::default()));

        let x1 = array![[3.0, 4.0], [0.0, 0.0], [6.0, 8.0]];
        let y1 = array![1.0, 0.0, 2.0];
        wrapper.fit(&x1, &y1).unwrap();
        let c1 = wrapper.get_param("C").unwrap().as_f64().unwrap();
        assert!((c1 - 1.0 / 5.0).abs() < 1e-12);

        let x2 = array![[1.0, 0.0], [0.0, 1.0]];
        let y2 = array![1.0, 2.0];
        wrapper.fit(&x2, &y2).unwrap();
        let c2 = wrapper.get_param("C").unwrap().as_f64().unwrap();
        assert!((c2 - 1.0).abs() < 1e-12);
        assert_eq!(c_of(wrapper.applied_params().unwrap()), c2);
    }

    #[test]
    fn test_wrapper_unknown_param_fails() {
        // LinearRegression has no C
        let mut wrapper = HeuristicWrapper::with_heuristic_c(Box::new(LinearRegression::new()));
        let x = array![[1.0], [2.0]];
        let y = array![1.0, 2.0];
        assert!(matches!(
            wrapper.fit(&x, &y),
            Err(ContinuumError::UnknownParameter { .. })
        ));
        assert!(matches!(
            wrapper.set_param("C", &ParamValue::Float(0.5)),
            Err(ContinuumError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn test_wrapper_rejects_empty_mapping() {
        let heuristic: HeuristicFn = Arc::new(|_x: &Array2<f64>| Ok(HyperParams::new()));
        let mut wrapper = HeuristicWrapper::new(Box::new(LinearSVR::default()), heuristic);
        let x = array![[1.0], [2.0]];
        let y = array![1.0, 2.0];
        assert!(matches!(wrapper.fit(&x, &y), Err(ContinuumError::ConfigError(_))));
    }

    #[test]
    fn test_wrapper_delegates_predict() {
        let mut wrapper = HeuristicWrapper::with_heuristic_c(Box::new(LinearSVR::default()));
        assert!(matches!(
            wrapper.predict(&array![[1.0]]),
            Err(ContinuumError::ModelNotFitted)
        ));
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![1.0, 2.0, 3.0];
        wrapper.fit(&x, &y).unwrap();
        assert_eq!(wrapper.predict(&x).unwrap().len(), 3);
    }

    #[test]
    fn test_wrapper_fresh_is_unfitted() {
        let mut wrapper = HeuristicWrapper::with_heuristic_c(Box::new(LinearSVR::default()));
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![1.0, 2.0, 3.0];
        wrapper.fit(&x, &y).unwrap();
        let fresh = wrapper.fresh();
        assert!(!fresh.is_fitted());
    }
}
