//! Named feature matrix with a trailing confound block

use crate::error::{ContinuumError, Result};
use ndarray::{concatenate, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Feature matrix whose last `n_confounds()` columns are confounds.
///
/// The confound count is derived from the column names, so it cannot drift
/// from the data it describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureTable {
    data: Array2<f64>,
    feature_names: Vec<String>,
    confound_names: Vec<String>,
}

impl FeatureTable {
    /// Create a table without confounds
    pub fn new(data: Array2<f64>, feature_names: Vec<String>) -> Result<Self> {
        if feature_names.len() != data.ncols() {
            return Err(ContinuumError::ShapeError {
                expected: format!("{} feature names", data.ncols()),
                actual: format!("{} names", feature_names.len()),
            });
        }
        Ok(Self {
            data,
            feature_names,
            confound_names: Vec::new(),
        })
    }

    /// Append confound columns after all existing columns
    pub fn with_confounds(self, confounds: Array2<f64>, names: Vec<String>) -> Result<Self> {
        if confounds.nrows() != self.data.nrows() {
            return Err(ContinuumError::ShapeError {
                expected: format!("{} confound rows", self.data.nrows()),
                actual: format!("{} rows", confounds.nrows()),
            });
        }
        if names.len() != confounds.ncols() {
            return Err(ContinuumError::ShapeError {
                expected: format!("{} confound names", confounds.ncols()),
                actual: format!("{} names", names.len()),
            });
        }
        if let Some(dup) = names
            .iter()
            .find(|n| self.feature_names.contains(n) || self.confound_names.contains(n))
        {
            return Err(ContinuumError::ValidationError(format!(
                "column '{}' is already part of the table",
                dup
            )));
        }

        let data = concatenate(Axis(1), &[self.data.view(), confounds.view()])?;
        let mut confound_names = self.confound_names;
        confound_names.extend(names);
        Ok(Self {
            data,
            feature_names: self.feature_names,
            confound_names,
        })
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn into_data(self) -> Array2<f64> {
        self.data
    }

    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    /// Number of non-confound columns
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn n_confounds(&self) -> usize {
        self.confound_names.len()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn confound_names(&self) -> &[String] {
        &self.confound_names
    }

    /// All column names in matrix order
    pub fn column_names(&self) -> Vec<&str> {
        self.feature_names
            .iter()
            .chain(self.confound_names.iter())
            .map(String::as_str)
            .collect()
    }

    /// Matrix position of a named column
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_names().iter().position(|n| *n == name)
    }

    /// Subset of rows, in the given order
    pub fn select_rows(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n_samples()) {
            return Err(ContinuumError::ValidationError(format!(
                "row index {} out of range for {} samples",
                bad,
                self.n_samples()
            )));
        }
        Ok(Self {
            data: self.data.select(Axis(0), indices),
            feature_names: self.feature_names.clone(),
            confound_names: self.confound_names.clone(),
        })
    }
}
