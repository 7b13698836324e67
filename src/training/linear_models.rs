//! Linear model implementations

use super::cross_validation::{CVStrategy, CrossValidator};
use super::models::{invalid_param, non_negative_f64, unknown_param, ParamValue, Regressor};
use crate::error::{ContinuumError, Result};
use crate::utils::{check_array, check_n_features, check_xy};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Relative pivot size below which a direction is treated as rank deficient
const PIVOT_TOLERANCE: f64 = 1e-10;

/// Lower-triangular Cholesky factor `L` with `A = L * L^T`.
/// Returns `None` if the matrix is not positive definite.
fn cholesky_factor(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    if n != a.ncols() {
        return None;
    }

    let mut l = Array2::zeros((n, n));
    let max_diag = a.diag().iter().fold(0.0f64, |m, v| m.max(v.abs()));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }

            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= PIVOT_TOLERANCE * max_diag || diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }
    Some(l)
}

/// Solve `L * L^T * x = b` for a Cholesky factor `L`
fn cholesky_substitute(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();

    // Forward substitution: L * y = b
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T * x = y
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }
    x
}

/// Solve symmetric positive-definite system Ax = b using Cholesky decomposition.
/// Returns `None` if the matrix is not positive definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    if a.nrows() != b.len() {
        return None;
    }
    let l = cholesky_factor(a)?;
    Some(cholesky_substitute(&l, b))
}

/// Inverse of a symmetric positive-definite matrix
fn cholesky_inverse(a: &Array2<f64>) -> Option<Array2<f64>> {
    let l = cholesky_factor(a)?;
    let n = a.nrows();
    let mut inv = Array2::zeros((n, n));
    let mut e = Array1::zeros(n);
    for j in 0..n {
        e[j] = 1.0;
        inv.column_mut(j).assign(&cholesky_substitute(&l, &e));
        e[j] = 0.0;
    }
    Some(inv)
}

/// Exact leave-one-out residuals of ridge regression with an unpenalised
/// intercept, from a single fit per alpha: `e_loo = e / (1 - h_ii)`.
///
/// Works in the primal (features) or dual (samples) space, whichever is
/// smaller. Returns `None` when the system is singular or a sample has
/// leverage 1.
fn ridge_loo_residuals(
    x: &Array2<f64>,
    y: &Array1<f64>,
    alpha: f64,
    fit_intercept: bool,
) -> Option<Array1<f64>> {
    let n = x.nrows();
    let (xc, yc, h_intercept) = if fit_intercept {
        let x_mean = x.mean_axis(Axis(0))?;
        let y_mean = y.mean()?;
        (x - &x_mean.view().insert_axis(Axis(0)), y - y_mean, 1.0 / n as f64)
    } else {
        (x.to_owned(), y.to_owned(), 0.0)
    };

    let (residuals, leverage) = if xc.ncols() < n {
        let mut gram = xc.t().dot(&xc);
        gram.diag_mut().mapv_inplace(|v| v + alpha);
        let gram_inv = cholesky_inverse(&gram)?;
        let coefficients = gram_inv.dot(&xc.t().dot(&yc));
        let residuals = &yc - &xc.dot(&coefficients);
        let leverage = (&xc.dot(&gram_inv) * &xc).sum_axis(Axis(1));
        (residuals, leverage)
    } else {
        // X (X^T X + aI)^-1 X^T = I - a (X X^T + aI)^-1
        let mut kernel = xc.dot(&xc.t());
        kernel.diag_mut().mapv_inplace(|v| v + alpha);
        let g = cholesky_inverse(&kernel)?;
        let residuals = g.dot(&yc) * alpha;
        let leverage = g.diag().mapv(|v| 1.0 - alpha * v);
        (residuals, leverage)
    };

    let denom = leverage.mapv(|h| 1.0 - h - h_intercept);
    if denom.iter().any(|d| !(d.is_finite() && *d > PIVOT_TOLERANCE)) {
        return None;
    }
    let loo = &residuals / &denom;
    if loo.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(loo)
}

/// Gauss-Jordan elimination with partial pivoting for a possibly singular
/// normal-equation system. Directions whose pivot vanishes are free variables
/// and get coefficient 0, which still yields a least-squares solution.
fn pivoted_solve(a: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = a.nrows();
    let mut aug = Array2::zeros((n, n + 1));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = a[[i, j]];
        }
        aug[[i, n]] = b[i];
    }

    let scale = a.diag().iter().fold(0.0f64, |m, v| m.max(v.abs()));
    let tol = if scale > 0.0 { PIVOT_TOLERANCE * scale } else { f64::MIN_POSITIVE };

    let mut pivot_cols = Vec::with_capacity(n);
    let mut row = 0;
    for col in 0..n {
        if row >= n {
            break;
        }
        let mut max_row = row;
        for r in row + 1..n {
            if aug[[r, col]].abs() > aug[[max_row, col]].abs() {
                max_row = r;
            }
        }
        if aug[[max_row, col]].abs() <= tol {
            continue;
        }

        if max_row != row {
            for j in 0..=n {
                aug.swap([row, j], [max_row, j]);
            }
        }

        let pivot = aug[[row, col]];
        for j in 0..=n {
            aug[[row, j]] /= pivot;
        }
        for r in 0..n {
            if r != row {
                let factor = aug[[r, col]];
                if factor != 0.0 {
                    for j in 0..=n {
                        aug[[r, j]] -= factor * aug[[row, j]];
                    }
                }
            }
        }
        pivot_cols.push(col);
        row += 1;
    }

    let mut x = Array1::zeros(n);
    for (r, &col) in pivot_cols.iter().enumerate() {
        x[col] = aug[[r, n]];
    }
    x
}

/// Solve (X^T X + alpha*I) w = X^T y
fn solve_normal_equations(x: &Array2<f64>, y: &Array1<f64>, alpha: f64) -> Result<Array1<f64>> {
    let mut xtx = x.t().dot(x);
    for i in 0..xtx.nrows() {
        xtx[[i, i]] += alpha;
    }
    let xty = x.t().dot(y);

    let coefficients = match cholesky_solve(&xtx, &xty) {
        Some(result) => result,
        None => pivoted_solve(&xtx, &xty),
    };

    if coefficients.iter().any(|v| !v.is_finite()) {
        return Err(ContinuumError::ComputationError(
            "least squares solution is not finite".to_string(),
        ));
    }
    Ok(coefficients)
}

/// Ordinary least squares (optionally L2-penalised) linear regression.
///
/// This is the default nuisance model of the confound remover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    /// Fitted coefficients (weights)
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept (bias)
    pub intercept: Option<f64>,
    /// Whether to fit intercept
    pub fit_intercept: bool,
    /// Regularization strength (L2)
    pub alpha: f64,
    /// Number of columns seen during fit
    n_features_in: usize,
    /// Whether model is fitted
    pub is_fitted: bool,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    /// Create a new linear regression model
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            fit_intercept: true,
            alpha: 0.0,
            n_features_in: 0,
            is_fitted: false,
        }
    }

    /// Enable/disable fitting intercept
    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    /// Set regularization strength (ridge)
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    fn fit_inner(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        if !(self.alpha.is_finite() && self.alpha >= 0.0) {
            return Err(invalid_param(
                "alpha",
                &ParamValue::Float(self.alpha),
                "must be a finite number >= 0",
            ));
        }

        let (coefficients, intercept) = if self.fit_intercept {
            let x_mean = x
                .mean_axis(Axis(0))
                .ok_or_else(|| ContinuumError::ValidationError("empty matrix".to_string()))?;
            let y_mean = y.mean().unwrap_or(0.0);

            let x_centered = x - &x_mean.view().insert_axis(Axis(0));
            let y_centered = y - y_mean;

            let coefficients = solve_normal_equations(&x_centered, &y_centered, self.alpha)?;
            let intercept = y_mean - coefficients.dot(&x_mean);
            (coefficients, intercept)
        } else {
            (solve_normal_equations(x, y, self.alpha)?, 0.0)
        };

        self.coefficients = Some(coefficients);
        self.intercept = Some(intercept);
        self.n_features_in = x.ncols();
        self.is_fitted = true;
        Ok(())
    }
}

impl Regressor for LinearRegression {
    fn name(&self) -> &'static str {
        "LinearRegression"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fit_inner(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = match (&self.coefficients, self.is_fitted) {
            (Some(c), true) => c,
            _ => return Err(ContinuumError::ModelNotFitted),
        };
        check_array(x)?;
        check_n_features(x, self.n_features_in)?;

        Ok(x.dot(coefficients) + self.intercept.unwrap_or(0.0))
    }

    fn param_names(&self) -> &'static [&'static str] {
        &["alpha", "fit_intercept"]
    }

    fn get_param(&self, name: &str) -> Option<ParamValue> {
        match name {
            "alpha" => Some(ParamValue::Float(self.alpha)),
            "fit_intercept" => Some(ParamValue::Bool(self.fit_intercept)),
            _ => None,
        }
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "alpha" => self.alpha = non_negative_f64(name, value)?,
            "fit_intercept" => {
                self.fit_intercept = value
                    .as_bool()
                    .ok_or_else(|| invalid_param(name, value, "must be a boolean"))?
            }
            _ => return Err(unknown_param(self.name(), name)),
        }
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    fn fresh(&self) -> Box<dyn Regressor> {
        Box::new(
            LinearRegression::new()
                .with_alpha(self.alpha)
                .with_fit_intercept(self.fit_intercept),
        )
    }
}

/// Configuration for [`RidgeCV`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeCVConfig {
    /// Candidate regularization strengths
    pub alphas: Vec<f64>,
    /// Internal folds used to rank the candidates; `None` is efficient
    /// leave-one-out
    pub cv: Option<usize>,
    /// Whether to fit intercept
    pub fit_intercept: bool,
}

impl Default for RidgeCVConfig {
    fn default() -> Self {
        Self {
            alphas: vec![10.0, 1e2, 1e3, 1e4, 1e5, 1e6],
            cv: None,
            fit_intercept: true,
        }
    }
}

/// Ridge regression that picks `alpha` by internal cross-validated RMSE on
/// the training rows it is given, then refits on all of them.
///
/// By default candidates are ranked by the RMSE of the exact leave-one-out
/// predictions, computed in closed form from one fit per alpha. Setting `cv`
/// ranks them by the mean per-fold RMSE of an unshuffled k-fold instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeCV {
    config: RidgeCVConfig,
    model: Option<LinearRegression>,
    /// Selected regularization strength
    alpha: Option<f64>,
    /// Mean internal-CV RMSE per candidate alpha
    cv_rmse: Vec<f64>,
}

impl Default for RidgeCV {
    fn default() -> Self {
        Self::new(RidgeCVConfig::default())
    }
}

impl RidgeCV {
    pub fn new(config: RidgeCVConfig) -> Self {
        Self {
            config,
            model: None,
            alpha: None,
            cv_rmse: Vec::new(),
        }
    }

    /// Alpha chosen during the last fit
    pub fn alpha(&self) -> Option<f64> {
        self.alpha
    }

    /// Internal-CV RMSE per candidate, in `alphas` order
    pub fn cv_rmse(&self) -> &[f64] {
        &self.cv_rmse
    }

    fn candidate_rmse(&self, x: &Array2<f64>, y: &Array1<f64>, alpha: f64) -> Result<f64> {
        match self.config.cv {
            Some(cv) => {
                let folds = self.fold_residuals(x, y, alpha, cv.min(x.nrows()))?;
                let total: f64 = folds.iter().map(rmse).sum();
                Ok(total / folds.len() as f64)
            }
            None => match ridge_loo_residuals(x, y, alpha, self.config.fit_intercept) {
                Some(residuals) => Ok(rmse(&residuals)),
                None => {
                    // singular closed form: refit once per held-out row
                    let folds = self.fold_residuals(x, y, alpha, x.nrows())?;
                    let pooled: Vec<f64> = folds.iter().flat_map(|f| f.iter().copied()).collect();
                    Ok(rmse(&Array1::from(pooled)))
                }
            },
        }
    }

    /// Held-out residuals of each unshuffled fold
    fn fold_residuals(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        alpha: f64,
        n_splits: usize,
    ) -> Result<Vec<Array1<f64>>> {
        let cv = CrossValidator::new(CVStrategy::KFold { n_splits, shuffle: false });
        let splits = cv.split(x.nrows(), None)?;

        splits
            .iter()
            .map(|split| {
                let x_train = x.select(Axis(0), &split.train_indices);
                let y_train = y.select(Axis(0), &split.train_indices);
                let x_test = x.select(Axis(0), &split.test_indices);
                let y_test = y.select(Axis(0), &split.test_indices);

                let mut model = LinearRegression::new()
                    .with_alpha(alpha)
                    .with_fit_intercept(self.config.fit_intercept);
                model.fit_inner(&x_train, &y_train)?;
                Ok(&model.predict(&x_test)? - &y_test)
            })
            .collect()
    }
}

fn rmse(residuals: &Array1<f64>) -> f64 {
    residuals.mapv(|e| e * e).mean().unwrap_or(0.0).sqrt()
}

impl Regressor for RidgeCV {
    fn name(&self) -> &'static str {
        "RidgeCV"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        if self.config.alphas.is_empty() {
            return Err(ContinuumError::ConfigError(
                "RidgeCV needs at least one candidate alpha".to_string(),
            ));
        }
        if let Some(&bad) = self.config.alphas.iter().find(|a| !(a.is_finite() && **a >= 0.0)) {
            return Err(invalid_param("alphas", &ParamValue::Float(bad), "must be finite and >= 0"));
        }
        if matches!(self.config.cv, Some(cv) if cv < 2) || x.nrows() < 2 {
            return Err(ContinuumError::ValidationError(
                "RidgeCV needs cv >= 2 and at least 2 samples".to_string(),
            ));
        }

        let cv_rmse = self
            .config
            .alphas
            .iter()
            .map(|&alpha| self.candidate_rmse(x, y, alpha))
            .collect::<Result<Vec<_>>>()?;

        // first minimum wins on ties
        let best = cv_rmse
            .iter()
            .enumerate()
            .fold(0, |best, (i, v)| if *v < cv_rmse[best] { i } else { best });
        let alpha = self.config.alphas[best];

        let mut model = LinearRegression::new()
            .with_alpha(alpha)
            .with_fit_intercept(self.config.fit_intercept);
        model.fit_inner(x, y)?;

        self.model = Some(model);
        self.alpha = Some(alpha);
        self.cv_rmse = cv_rmse;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.model
            .as_ref()
            .ok_or(ContinuumError::ModelNotFitted)?
            .predict(x)
    }

    fn param_names(&self) -> &'static [&'static str] {
        &["cv", "fit_intercept"]
    }

    fn get_param(&self, name: &str) -> Option<ParamValue> {
        match name {
            "cv" => Some(match self.config.cv {
                Some(cv) => ParamValue::Int(cv as i64),
                None => ParamValue::Text("loo".to_string()),
            }),
            "fit_intercept" => Some(ParamValue::Bool(self.config.fit_intercept)),
            _ => None,
        }
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "cv" => {
                self.config.cv = match value.as_str() {
                    Some(text) if text.eq_ignore_ascii_case("loo") => None,
                    _ => Some(value.as_usize().filter(|&cv| cv >= 2).ok_or_else(|| {
                        invalid_param(name, value, "must be \"loo\" or an integer >= 2")
                    })?),
                }
            }
            "fit_intercept" => {
                self.config.fit_intercept = value
                    .as_bool()
                    .ok_or_else(|| invalid_param(name, value, "must be a boolean"))?
            }
            _ => return Err(unknown_param(self.name(), name)),
        }
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    fn fresh(&self) -> Box<dyn Regressor> {
        Box::new(RidgeCV::new(self.config.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::models::HyperParams;
    use ndarray::array;

    #[test]
    fn test_linear_regression_simple() {
        // y = 2*x + 1
        let x = Array2::from_shape_vec((5, 1), vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let y = array![3.0, 5.0, 7.0, 9.0, 11.0];

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let coef = model.coefficients.as_ref().unwrap();
        assert!((coef[0] - 2.0).abs() < 1e-10);
        assert!((model.intercept.unwrap() - 1.0).abs() < 1e-10);
        assert!(model.score(&x, &y).unwrap() > 0.9999);
    }

    #[test]
    fn test_constant_regressor_predicts_mean() {
        let x = array![[10.0], [10.0], [10.0], [10.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        assert_eq!(model.coefficients.as_ref().unwrap()[0], 0.0);
        let pred = model.predict(&x).unwrap();
        for p in pred.iter() {
            assert_eq!(*p, 2.5);
        }
    }

    #[test]
    fn test_collinear_columns_still_fit() {
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0], [4.0, 8.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&x).unwrap();
        for (p, t) in pred.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-8);
        }
    }

    #[test]
    fn test_predict_before_fit() {
        let model = LinearRegression::new();
        assert!(matches!(
            model.predict(&array![[1.0]]),
            Err(ContinuumError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_predict_wrong_width() {
        let x = array![[1.0, 0.0], [2.0, 1.0], [3.0, 0.0]];
        let y = array![1.0, 2.0, 3.0];
        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();
        assert!(matches!(
            model.predict(&array![[1.0]]),
            Err(ContinuumError::ShapeError { .. })
        ));
    }

    #[test]
    fn test_set_params_unknown_name_fails_fast() {
        let mut model = LinearRegression::new();
        let params = HyperParams::from([
            ("alpha".to_string(), ParamValue::Float(3.0)),
            ("C".to_string(), ParamValue::Float(1.0)),
        ]);
        assert!(matches!(
            model.set_params(&params),
            Err(ContinuumError::UnknownParameter { .. })
        ));
        // nothing applied
        assert_eq!(model.alpha, 0.0);
    }

    #[test]
    fn test_set_param_unknown_name_is_an_error() {
        let mut model = LinearRegression::new();
        assert!(matches!(
            model.set_param("C", &ParamValue::Float(1.0)),
            Err(ContinuumError::UnknownParameter { .. })
        ));

        let mut ridge = RidgeCV::default();
        assert!(matches!(
            ridge.set_param("alpha", &ParamValue::Float(1.0)),
            Err(ContinuumError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn test_set_params_invalid_value_changes_nothing() {
        let mut model = LinearRegression::new();
        let params = HyperParams::from([
            ("alpha".to_string(), ParamValue::Float(3.0)),
            ("fit_intercept".to_string(), ParamValue::from("yes")),
        ]);
        assert!(matches!(
            model.set_params(&params),
            Err(ContinuumError::InvalidParameter { .. })
        ));
        assert_eq!(model.alpha, 0.0);
        assert!(model.fit_intercept);
    }

    #[test]
    fn test_fresh_keeps_configuration_drops_fit() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![1.0, 2.0, 3.0];
        let mut model = LinearRegression::new().with_alpha(0.5);
        model.fit(&x, &y).unwrap();

        let fresh = model.fresh();
        assert!(!fresh.is_fitted());
        assert_eq!(fresh.get_param("alpha"), Some(ParamValue::Float(0.5)));
    }

    #[test]
    fn test_ridge_shrinks_coefficients() {
        let x = Array2::from_shape_vec((5, 1), vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let y = array![3.0, 5.0, 7.0, 9.0, 11.0];

        let mut ridge = LinearRegression::new().with_alpha(10.0);
        ridge.fit(&x, &y).unwrap();
        assert!(ridge.coefficients.as_ref().unwrap()[0] < 2.0);
    }

    #[test]
    fn test_ridge_cv_prefers_small_alpha_on_clean_signal() {
        let n = 40;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| (i as f64) * (j as f64 + 1.0) * 0.1 + (i % 3) as f64);
        let y = x.column(0).mapv(|v| 3.0 * v) + 1.0;

        let mut model = RidgeCV::new(RidgeCVConfig {
            alphas: vec![0.01, 1e4],
            cv: Some(5),
            fit_intercept: true,
        });
        model.fit(&x, &y).unwrap();

        assert_eq!(model.alpha(), Some(0.01));
        assert_eq!(model.cv_rmse().len(), 2);
        assert!(model.score(&x, &y).unwrap() > 0.99);
    }

    /// RMSE of leave-one-out predictions obtained by refitting without each row
    fn refit_loo_rmse(x: &Array2<f64>, y: &Array1<f64>, alpha: f64, fit_intercept: bool) -> f64 {
        let n = x.nrows();
        let mut sq = 0.0;
        for i in 0..n {
            let keep: Vec<usize> = (0..n).filter(|&j| j != i).collect();
            let mut model = LinearRegression::new()
                .with_alpha(alpha)
                .with_fit_intercept(fit_intercept);
            model
                .fit(&x.select(Axis(0), &keep), &y.select(Axis(0), &keep))
                .unwrap();
            let pred = model.predict(&x.select(Axis(0), &[i])).unwrap()[0];
            sq += (pred - y[i]).powi(2);
        }
        (sq / n as f64).sqrt()
    }

    fn noisy_data(n: usize, p: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, p), |(i, j)| {
            ((i * 7 + j * 13) % 11) as f64 * 0.3 - ((i + 2 * j) % 5) as f64
        });
        let y = Array1::from_shape_fn(n, |i| {
            1.5 * x[[i, 0]] - 0.7 * x[[i, p - 1]] + ((i * 31) % 7) as f64 * 0.2 + 4.0
        });
        (x, y)
    }

    #[test]
    fn test_ridge_cv_default_is_leave_one_out() {
        assert_eq!(RidgeCVConfig::default().cv, None);
        assert_eq!(RidgeCV::default().get_param("cv"), Some(ParamValue::from("loo")));

        // more samples than features (primal) and the reverse (dual)
        for (n, p) in [(30, 3), (8, 12)] {
            let (x, y) = noisy_data(n, p);
            let alphas = vec![0.5, 10.0, 1e3];
            for fit_intercept in [true, false] {
                let mut model = RidgeCV::new(RidgeCVConfig {
                    alphas: alphas.clone(),
                    cv: None,
                    fit_intercept,
                });
                model.fit(&x, &y).unwrap();

                for (k, &alpha) in alphas.iter().enumerate() {
                    let expected = refit_loo_rmse(&x, &y, alpha, fit_intercept);
                    let got = model.cv_rmse()[k];
                    assert!(
                        (got - expected).abs() < 1e-6 * expected.max(1.0),
                        "n={} p={} alpha={}: {} vs {}",
                        n,
                        p,
                        alpha,
                        got,
                        expected
                    );
                }
            }
        }
    }

    #[test]
    fn test_ridge_cv_singular_closed_form_falls_back_to_refits() {
        // duplicated column and alpha 0 make the closed form singular
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [5.0, 5.0], [8.0, 8.0]];
        let y = array![1.1, 2.3, 2.9, 5.2, 7.8];
        let mut model = RidgeCV::new(RidgeCVConfig {
            alphas: vec![0.0],
            cv: None,
            fit_intercept: true,
        });
        model.fit(&x, &y).unwrap();
        let expected = refit_loo_rmse(&x, &y, 0.0, true);
        assert!((model.cv_rmse()[0] - expected).abs() < 1e-8);
    }

    #[test]
    fn test_ridge_cv_param_accepts_loo_or_folds() {
        let mut model = RidgeCV::default();
        model.set_param("cv", &ParamValue::Int(4)).unwrap();
        assert_eq!(model.get_param("cv"), Some(ParamValue::Int(4)));
        model.set_param("cv", &ParamValue::from("LOO")).unwrap();
        assert_eq!(model.get_param("cv"), Some(ParamValue::from("loo")));
        assert!(matches!(
            model.set_param("cv", &ParamValue::Int(1)),
            Err(ContinuumError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_ridge_cv_rejects_empty_grid() {
        let mut model = RidgeCV::new(RidgeCVConfig {
            alphas: vec![],
            ..Default::default()
        });
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![1.0, 2.0, 3.0];
        assert!(matches!(model.fit(&x, &y), Err(ContinuumError::ConfigError(_))));
    }
}
