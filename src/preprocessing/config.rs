//! Confound remover configuration

use crate::error::{ContinuumError, Result};
use serde::{Deserialize, Serialize};

/// Selector over the non-confound columns (`apply_to`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnSelection {
    /// Explicit candidate-column indices, kept in the given order
    Indices(Vec<usize>),
    /// One flag per candidate column
    Mask(Vec<bool>),
    /// Half-open index range `start..end`
    Range { start: usize, end: usize },
}

impl ColumnSelection {
    /// Resolve to candidate-column indices for a matrix with `n_candidates`
    /// non-confound columns.
    pub fn resolve(&self, n_candidates: usize) -> Result<Vec<usize>> {
        match self {
            ColumnSelection::Indices(indices) => {
                let mut seen = vec![false; n_candidates];
                for &idx in indices {
                    if idx >= n_candidates {
                        return Err(ContinuumError::ValidationError(format!(
                            "apply_to index {} out of range for {} feature columns",
                            idx, n_candidates
                        )));
                    }
                    if seen[idx] {
                        return Err(ContinuumError::ValidationError(format!(
                            "apply_to selects column {} more than once",
                            idx
                        )));
                    }
                    seen[idx] = true;
                }
                Ok(indices.clone())
            }
            ColumnSelection::Mask(mask) => {
                if mask.len() != n_candidates {
                    return Err(ContinuumError::ShapeError {
                        expected: format!("apply_to mask of length {}", n_candidates),
                        actual: format!("length {}", mask.len()),
                    });
                }
                Ok(mask
                    .iter()
                    .enumerate()
                    .filter_map(|(i, &keep)| keep.then_some(i))
                    .collect())
            }
            ColumnSelection::Range { start, end } => {
                if start > end || *end > n_candidates {
                    return Err(ContinuumError::ValidationError(format!(
                        "apply_to range {}..{} invalid for {} feature columns",
                        start, end, n_candidates
                    )));
                }
                Ok((*start..*end).collect())
            }
        }
    }
}

/// Configuration for [`ConfoundRemover`](super::ConfoundRemover)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfoundRemoverConfig {
    /// Number of trailing columns that hold confounds
    pub n_confounds: usize,

    /// Residuals with absolute value below this are set to 0
    pub threshold: Option<f64>,

    /// Omit the confound columns from the transformed output
    pub drop_confounds: bool,

    /// Worker threads for per-column model fitting
    pub n_jobs: Option<usize>,

    /// 0 = quiet, 1 = fit summary, 2 = per-column detail
    pub verbose: u8,

    /// Columns to deconfound when fitted through the `Transformer` interface
    pub apply_to: Option<ColumnSelection>,
}

impl Default for ConfoundRemoverConfig {
    fn default() -> Self {
        Self {
            n_confounds: 0,
            threshold: None,
            drop_confounds: true,
            n_jobs: None,
            verbose: 0,
            apply_to: None,
        }
    }
}

impl ConfoundRemoverConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_n_confounds(mut self, n_confounds: usize) -> Self {
        self.n_confounds = n_confounds;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_drop_confounds(mut self, drop_confounds: bool) -> Self {
        self.drop_confounds = drop_confounds;
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = Some(n_jobs);
        self
    }

    pub fn with_verbose(mut self, verbose: u8) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_apply_to(mut self, apply_to: ColumnSelection) -> Self {
        self.apply_to = Some(apply_to);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(t) = self.threshold {
            if !(t.is_finite() && t >= 0.0) {
                return Err(ContinuumError::InvalidParameter {
                    name: "threshold".to_string(),
                    value: t.to_string(),
                    reason: "must be a finite number >= 0".to_string(),
                });
            }
        }
        if self.n_jobs == Some(0) {
            return Err(ContinuumError::ConfigError(
                "n_jobs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
