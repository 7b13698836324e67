//! Linear support vector regression
//!
//! Dual coordinate descent for L2-regularised SVR with either the
//! epsilon-insensitive (L1) or squared epsilon-insensitive (L2) loss. The
//! intercept is learned as the weight of a constant extra feature of value
//! `intercept_scaling`, so it is regularised together with the coefficients.

use super::models::{
    invalid_param, non_negative_f64, positive_f64, unknown_param, ParamValue, Regressor,
};
use crate::error::{ContinuumError, Result};
use crate::utils::{check_array, check_n_features, check_xy};
use ndarray::{s, Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Loss used by [`LinearSVR`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SVRLoss {
    /// |r| - epsilon, clipped at zero (L1 loss)
    EpsilonInsensitive,
    /// (|r| - epsilon)², clipped at zero (L2 loss)
    SquaredEpsilonInsensitive,
}

impl SVRLoss {
    pub fn as_str(&self) -> &'static str {
        match self {
            SVRLoss::EpsilonInsensitive => "epsilon_insensitive",
            SVRLoss::SquaredEpsilonInsensitive => "squared_epsilon_insensitive",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "epsilon_insensitive" | "l1" => Some(SVRLoss::EpsilonInsensitive),
            "squared_epsilon_insensitive" | "l2" => Some(SVRLoss::SquaredEpsilonInsensitive),
            _ => None,
        }
    }
}

/// Linear SVR configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSVRConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Half-width of the insensitive tube
    pub epsilon: f64,
    pub loss: SVRLoss,
    /// Tolerance for stopping criterion (relative to the first pass)
    pub tol: f64,
    /// Maximum number of passes over the data
    pub max_iter: usize,
    pub fit_intercept: bool,
    /// Value of the synthetic constant feature carrying the intercept
    pub intercept_scaling: f64,
    /// Seed for the coordinate visiting order
    pub random_state: u64,
}

impl Default for LinearSVRConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            epsilon: 0.0,
            loss: SVRLoss::EpsilonInsensitive,
            tol: 1e-4,
            max_iter: 1000,
            fit_intercept: true,
            intercept_scaling: 1.0,
            random_state: 0,
        }
    }
}

/// Linear Support Vector Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSVR {
    config: LinearSVRConfig,
    coefficients: Option<Array1<f64>>,
    intercept: f64,
    n_iter: usize,
    n_features_in: usize,
}

impl Default for LinearSVR {
    fn default() -> Self {
        Self::new(LinearSVRConfig::default())
    }
}

impl LinearSVR {
    /// Create a new linear SVR
    pub fn new(config: LinearSVRConfig) -> Self {
        Self {
            config,
            coefficients: None,
            intercept: 0.0,
            n_iter: 0,
            n_features_in: 0,
        }
    }

    pub fn config(&self) -> &LinearSVRConfig {
        &self.config
    }

    /// Current regularization parameter
    pub fn c(&self) -> f64 {
        self.config.c
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Passes over the data used by the last fit
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    fn validate_config(&self) -> Result<()> {
        let cfg = &self.config;
        positive_f64("C", &ParamValue::Float(cfg.c))?;
        non_negative_f64("epsilon", &ParamValue::Float(cfg.epsilon))?;
        positive_f64("tol", &ParamValue::Float(cfg.tol))?;
        positive_f64("intercept_scaling", &ParamValue::Float(cfg.intercept_scaling))?;
        if cfg.max_iter == 0 {
            return Err(invalid_param("max_iter", &ParamValue::Int(0), "must be >= 1"));
        }
        Ok(())
    }

    /// Design matrix with the constant intercept column appended when needed
    fn augment(&self, x: &Array2<f64>) -> Array2<f64> {
        if !self.config.fit_intercept {
            return x.clone();
        }
        let mut aug = Array2::from_elem((x.nrows(), x.ncols() + 1), self.config.intercept_scaling);
        aug.slice_mut(s![.., ..x.ncols()]).assign(x);
        aug
    }
}

impl Regressor for LinearSVR {
    fn name(&self) -> &'static str {
        "LinearSVR"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        self.validate_config()?;

        let cfg = &self.config;
        let xa = self.augment(x);
        let (n, d) = xa.dim();

        // L1 loss: box constraint C, no diagonal term; L2 loss: unbounded with 1/(2C) diagonal
        let (lambda, upper) = match cfg.loss {
            SVRLoss::EpsilonInsensitive => (0.0, cfg.c),
            SVRLoss::SquaredEpsilonInsensitive => (0.5 / cfg.c, f64::INFINITY),
        };

        let q_diag: Vec<f64> = xa.rows().into_iter().map(|row| row.dot(&row) + lambda).collect();
        let mut beta = vec![0.0f64; n];
        let mut w = Array1::<f64>::zeros(d);
        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(cfg.random_state);

        let mut initial_violation = None;
        let mut converged = false;
        let mut iter = 0;

        while iter < cfg.max_iter {
            order.shuffle(&mut rng);
            let mut violation_sum = 0.0;

            for &i in &order {
                let h = q_diag[i];
                if h <= 0.0 {
                    // all-zero row with no diagonal term cannot move
                    continue;
                }
                let xi = xa.row(i);
                let g = xi.dot(&w) - y[i] + lambda * beta[i];
                let gp = g + cfg.epsilon;
                let gn = g - cfg.epsilon;
                let b = beta[i];

                let violation = if b == 0.0 {
                    if gp < 0.0 {
                        -gp
                    } else if gn > 0.0 {
                        gn
                    } else {
                        0.0
                    }
                } else if b >= upper {
                    gp.max(0.0)
                } else if b <= -upper {
                    (-gn).max(0.0)
                } else if b > 0.0 {
                    gp.abs()
                } else {
                    gn.abs()
                };
                violation_sum += violation;

                let step = if gp < h * b {
                    -gp / h
                } else if gn > h * b {
                    -gn / h
                } else {
                    -b
                };
                let new_b = (b + step).clamp(-upper, upper);
                let delta = new_b - b;
                if delta.abs() > 1e-12 {
                    beta[i] = new_b;
                    w.scaled_add(delta, &xi);
                }
            }

            iter += 1;
            let reference = *initial_violation.get_or_insert(violation_sum);
            if violation_sum <= cfg.tol * reference || violation_sum == 0.0 {
                converged = true;
                break;
            }
        }

        if !converged {
            warn!(
                max_iter = cfg.max_iter,
                c = cfg.c,
                "LinearSVR did not converge; consider increasing max_iter"
            );
        }

        let n_features = x.ncols();
        let intercept = if cfg.fit_intercept {
            w[n_features] * cfg.intercept_scaling
        } else {
            0.0
        };

        if w.iter().any(|v| !v.is_finite()) {
            return Err(ContinuumError::ComputationError(
                "LinearSVR produced non-finite weights".to_string(),
            ));
        }

        self.coefficients = Some(w.slice(s![..n_features]).to_owned());
        self.intercept = intercept;
        self.n_iter = iter;
        self.n_features_in = n_features;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(ContinuumError::ModelNotFitted)?;
        check_array(x)?;
        check_n_features(x, self.n_features_in)?;
        Ok(x.dot(coefficients) + self.intercept)
    }

    fn param_names(&self) -> &'static [&'static str] {
        &[
            "C",
            "epsilon",
            "loss",
            "tol",
            "max_iter",
            "fit_intercept",
            "intercept_scaling",
        ]
    }

    fn get_param(&self, name: &str) -> Option<ParamValue> {
        let cfg = &self.config;
        match name {
            "C" => Some(ParamValue::Float(cfg.c)),
            "epsilon" => Some(ParamValue::Float(cfg.epsilon)),
            "loss" => Some(ParamValue::Text(cfg.loss.as_str().to_string())),
            "tol" => Some(ParamValue::Float(cfg.tol)),
            "max_iter" => Some(ParamValue::Int(cfg.max_iter as i64)),
            "fit_intercept" => Some(ParamValue::Bool(cfg.fit_intercept)),
            "intercept_scaling" => Some(ParamValue::Float(cfg.intercept_scaling)),
            _ => None,
        }
    }

    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        let cfg = &mut self.config;
        match name {
            "C" => cfg.c = positive_f64(name, value)?,
            "epsilon" => cfg.epsilon = non_negative_f64(name, value)?,
            "tol" => cfg.tol = positive_f64(name, value)?,
            "intercept_scaling" => cfg.intercept_scaling = positive_f64(name, value)?,
            "loss" => {
                cfg.loss = value
                    .as_str()
                    .and_then(SVRLoss::parse)
                    .ok_or_else(|| invalid_param(name, value, "unsupported loss"))?
            }
            "max_iter" => {
                cfg.max_iter = value
                    .as_usize()
                    .filter(|&m| m >= 1)
                    .ok_or_else(|| invalid_param(name, value, "must be an integer >= 1"))?
            }
            "fit_intercept" => {
                cfg.fit_intercept = value
                    .as_bool()
                    .ok_or_else(|| invalid_param(name, value, "must be a boolean"))?
            }
            _ => return Err(unknown_param("LinearSVR", name)),
        }
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }

    fn fresh(&self) -> Box<dyn Regressor> {
        Box::new(LinearSVR::new(self.config.clone()))
    }
}
