//! Leakage-safe modelling pipelines
//!
//! A [`Pipeline`] chains preprocessing steps (scaling, confound removal) in
//! front of a final estimator and behaves as a single [`Regressor`]. Fitting
//! fits every step on the data it is given; predicting only transforms. Under
//! [`cross_validate`](crate::training::cross_validate) each fold therefore
//! derives all fitted state from its training rows alone.

mod builder;

pub use builder::{PipelineBuilder, PipelineKind};

use crate::data::FeatureTable;
use crate::error::{ContinuumError, Result};
use crate::preprocessing::Transformer;
use crate::training::{HyperParams, ParamValue, Regressor};
use crate::utils::check_xy;
use ndarray::{Array1, Array2};
use tracing::debug;

/// Preprocessing steps followed by a final estimator
#[derive(Debug)]
pub struct Pipeline {
    steps: Vec<Box<dyn Transformer>>,
    estimator: Box<dyn Regressor>,
    /// Trailing confound columns the input is expected to carry
    n_confounds: usize,
}

impl Pipeline {
    /// Assemble a pipeline for input carrying `n_confounds` trailing confound
    /// columns. Every confound-removing step must be configured with the same
    /// count.
    pub fn new(
        steps: Vec<Box<dyn Transformer>>,
        estimator: Box<dyn Regressor>,
        n_confounds: usize,
    ) -> Result<Self> {
        let mismatch = steps.iter().find_map(|step| {
            step.n_confounds()
                .filter(|&n| n != n_confounds)
                .map(|n| (step.name(), n))
        });
        if let Some((name, configured)) = mismatch {
            return Err(ContinuumError::ConfigError(format!(
                "{} is configured for {} confounds but the pipeline expects {}",
                name, configured, n_confounds
            )));
        }
        Ok(Self {
            steps,
            estimator,
            n_confounds,
        })
    }

    pub fn steps(&self) -> &[Box<dyn Transformer>] {
        &self.steps
    }

    pub fn estimator(&self) -> &dyn Regressor {
        self.estimator.as_ref()
    }

    pub fn n_confounds(&self) -> usize {
        self.n_confounds
    }

    /// Fit on a [`FeatureTable`], checking that its confound block matches
    /// the count this pipeline was assembled with.
    pub fn fit_table(&mut self, table: &FeatureTable, y: &Array1<f64>) -> Result<()> {
        self.check_table(table)?;
        self.fit(table.data(), y)
    }

    pub fn predict_table(&self, table: &FeatureTable) -> Result<Array1<f64>> {
        self.check_table(table)?;
        self.predict(table.data())
    }

    fn check_table(&self, table: &FeatureTable) -> Result<()> {
        if table.n_confounds() != self.n_confounds {
            return Err(ContinuumError::ConfigError(format!(
                "pipeline was built for {} confounds but the table carries {} ({})",
                self.n_confounds,
                table.n_confounds(),
                table.confound_names().join(", ")
            )));
        }
        Ok(())
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() < self.n_confounds {
            return Err(ContinuumError::ShapeError {
                expected: format!("at least {} columns (n_confounds)", self.n_confounds),
                actual: format!("{} columns", x.ncols()),
            });
        }
        Ok(())
    }

    fn run_steps(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let mut current = x.to_owned();
        for step in &self.steps {
            current = step.transform(&current)?;
        }
        Ok(current)
    }
}

impl Regressor for Pipeline {
    fn name(&self) -> &'static str {
        "Pipeline"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_xy(x, y)?;
        self.check_width(x)?;

        let mut current = x.to_owned();
        for step in self.steps.iter_mut() {
            current = step.fit_transform(&current)?;
            debug!(step = step.name(), n_features = current.ncols(), "Fitted pipeline step");
        }
        self.estimator.fit(&current, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(ContinuumError::ModelNotFitted);
        }
        self.check_width(x)?;
        let transformed = self.run_steps(x)?;
        self.estimator.predict(&transformed)
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
        self.estimator.is_fitted() && self.steps.iter().all(|s| s.is_fitted())
    }

    fn fresh(&self) -> Box<dyn Regressor> {
        Box::new(Pipeline {
            steps: self.steps.iter().map(|s| s.fresh()).collect(),
            estimator: self.estimator.fresh(),
            n_confounds: self.n_confounds,
        })
    }
}
