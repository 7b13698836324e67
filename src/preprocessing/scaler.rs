//! Feature scaling implementations

use super::Transformer;
use crate::error::{ContinuumError, Result};
use crate::utils::{check_array, check_n_features};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Type of scaler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
    /// No scaling
    None,
}

/// Per-column parameters of a fitted scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScalerParams {
    center: Array1<f64>, // mean or min
    scale: Array1<f64>,  // std or range
}

/// Column-wise feature scaler.
///
/// Passthrough columns (e.g. categorical confounds) keep their values and
/// their position, so a trailing confound block stays trailing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    passthrough: Vec<usize>,
    params: Option<ScalerParams>,
}

impl Scaler {
    /// Create a new scaler
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            passthrough: Vec::new(),
            params: None,
        }
    }

    /// z-score scaler
    pub fn standard() -> Self {
        Self::new(ScalerType::Standard)
    }

    /// Leave these column indices untouched
    pub fn with_passthrough(mut self, columns: Vec<usize>) -> Self {
        self.passthrough = columns;
        self
    }

    pub fn scaler_type(&self) -> ScalerType {
        self.scaler_type
    }

    /// Fitted centers (None before fit)
    pub fn center(&self) -> Option<&Array1<f64>> {
        self.params.as_ref().map(|p| &p.center)
    }

    /// Fitted scales (None before fit)
    pub fn scale(&self) -> Option<&Array1<f64>> {
        self.params.as_ref().map(|p| &p.scale)
    }

    fn compute_params(&self, x: &Array2<f64>) -> ScalerParams {
        let n_features = x.ncols();
        let (mut center, mut scale) = match self.scaler_type {
            ScalerType::Standard => {
                let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(n_features));
                // population standard deviation
                let std = x.std_axis(Axis(0), 0.0);
                (mean, std)
            }
            ScalerType::MinMax => {
                let min = x.fold_axis(Axis(0), f64::INFINITY, |a, &b| a.min(b));
                let max = x.fold_axis(Axis(0), f64::NEG_INFINITY, |a, &b| a.max(b));
                let range = &max - &min;
                (min, range)
            }
            ScalerType::None => (Array1::zeros(n_features), Array1::ones(n_features)),
        };

        scale.mapv_inplace(|s| if s == 0.0 || !s.is_finite() { 1.0 } else { s });
        for &col in &self.passthrough {
            center[col] = 0.0;
            scale[col] = 1.0;
        }
        ScalerParams { center, scale }
    }

    /// Inverse transform the data
    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let params = self.params.as_ref().ok_or(ContinuumError::ModelNotFitted)?;
        check_n_features(x, params.center.len())?;
        Ok(x * &params.scale + &params.center)
    }
}

impl Transformer for Scaler {
    fn name(&self) -> &'static str {
        "Scaler"
    }

    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        check_array(x)?;
        if let Some(&bad) = self.passthrough.iter().find(|&&c| c >= x.ncols()) {
            return Err(ContinuumError::ValidationError(format!(
                "passthrough column {} out of range for {} columns",
                bad,
                x.ncols()
            )));
        }
        self.params = Some(self.compute_params(x));
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let params = self.params.as_ref().ok_or(ContinuumError::ModelNotFitted)?;
        check_array(x)?;
        check_n_features(x, params.center.len())?;
        Ok((x - &params.center) / &params.scale)
    }

    fn is_fitted(&self) -> bool {
        self.params.is_some()
    }

    fn fresh(&self) -> Box<dyn Transformer> {
        Box::new(Scaler::new(self.scaler_type).with_passthrough(self.passthrough.clone()))
    }
}
