//! Data preprocessing module
//!
//! Provides the transformers that run ahead of the estimator:
//! - Feature scaling (z-score, min-max) with passthrough columns
//! - Confound regression (`ConfoundRemover`)

mod config;
mod confound;
mod scaler;

pub use config::{ColumnSelection, ConfoundRemoverConfig};
pub use confound::ConfoundRemover;
pub use scaler::{Scaler, ScalerType};

use crate::error::Result;
use ndarray::Array2;
use std::fmt;

/// A fit/transform preprocessing step over a numeric feature matrix
pub trait Transformer: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Learn the transformation from training data
    fn fit(&mut self, x: &Array2<f64>) -> Result<()>;

    /// Apply the learned transformation
    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Fit and transform in one step
    fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    fn is_fitted(&self) -> bool;

    /// Trailing confound columns this step consumes, if it removes confounds
    fn n_confounds(&self) -> Option<usize> {
        None
    }

    /// Unfitted copy with the same configuration
    fn fresh(&self) -> Box<dyn Transformer>;
}
