//! Named pipeline menu and assembly

use super::Pipeline;
use crate::data::FeatureTable;
use crate::error::{ContinuumError, Result};
use crate::preprocessing::{ColumnSelection, ConfoundRemover, ConfoundRemoverConfig, Scaler, Transformer};
use crate::training::{
    HeuristicWrapper, LinearRegression, LinearSVR, LinearSVRConfig, Regressor, RidgeCV,
    RidgeCVConfig, SVRLoss,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Predefined z-scored pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    /// Linear SVR, epsilon-insensitive loss, heuristic C
    LinearSvrL1Heuristic,
    /// Linear SVR, squared epsilon-insensitive loss, heuristic C
    LinearSvrL2Heuristic,
    /// Linear-kernel SVR (epsilon = 0.1), heuristic C
    SvrHeuristic,
    /// Ridge with alpha chosen by internal cross-validation
    RidgeCv,
    /// Ordinary least squares
    LinearRegression,
}

impl PipelineKind {
    pub const ALL: [PipelineKind; 5] = [
        PipelineKind::LinearSvrL1Heuristic,
        PipelineKind::LinearSvrL2Heuristic,
        PipelineKind::SvrHeuristic,
        PipelineKind::RidgeCv,
        PipelineKind::LinearRegression,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineKind::LinearSvrL1Heuristic => "linear_svr_l1_heuristic_zscore",
            PipelineKind::LinearSvrL2Heuristic => "linear_svr_l2_heuristic_zscore",
            PipelineKind::SvrHeuristic => "svr_heuristic_zscore",
            PipelineKind::RidgeCv => "ridgecv_zscore",
            PipelineKind::LinearRegression => "linear_regression_zscore",
        }
    }

    /// Whether the final estimator gets its C from the row-norm heuristic
    pub fn uses_heuristic(&self) -> bool {
        matches!(
            self,
            PipelineKind::LinearSvrL1Heuristic
                | PipelineKind::LinearSvrL2Heuristic
                | PipelineKind::SvrHeuristic
        )
    }

    /// Unfitted final estimator for this pipeline
    pub fn estimator(&self, random_state: u64) -> Box<dyn Regressor> {
        let svr = |loss: SVRLoss, epsilon: f64| -> Box<dyn Regressor> {
            let config = LinearSVRConfig {
                loss,
                epsilon,
                random_state,
                ..LinearSVRConfig::default()
            };
            Box::new(HeuristicWrapper::with_heuristic_c(Box::new(LinearSVR::new(config))))
        };

        match self {
            PipelineKind::LinearSvrL1Heuristic => svr(SVRLoss::EpsilonInsensitive, 0.0),
            PipelineKind::LinearSvrL2Heuristic => svr(SVRLoss::SquaredEpsilonInsensitive, 0.0),
            PipelineKind::SvrHeuristic => svr(SVRLoss::EpsilonInsensitive, 0.1),
            PipelineKind::RidgeCv => Box::new(RidgeCV::new(RidgeCVConfig::default())),
            PipelineKind::LinearRegression => Box::new(LinearRegression::new()),
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineKind {
    type Err = ContinuumError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        PipelineKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| {
                ContinuumError::ConfigError(format!(
                    "unsupported pipeline '{}' (expected one of: {})",
                    s,
                    PipelineKind::ALL
                        .iter()
                        .map(|k| k.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}

/// Assembles scaler, confound remover and final estimator with one
/// consistent confound count.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    kind: PipelineKind,
    remover: ConfoundRemoverConfig,
    passthrough: Vec<usize>,
    random_state: u64,
}

impl PipelineBuilder {
    pub fn new(kind: PipelineKind) -> Self {
        Self {
            kind,
            remover: ConfoundRemoverConfig::default(),
            passthrough: Vec::new(),
            random_state: 0,
        }
    }

    pub fn n_confounds(mut self, n_confounds: usize) -> Self {
        self.remover.n_confounds = n_confounds;
        self
    }

    /// Column indices the scaler leaves as they are (categorical columns)
    pub fn passthrough(mut self, columns: Vec<usize>) -> Self {
        self.passthrough = columns;
        self
    }

    pub fn confound_apply_to(mut self, selection: ColumnSelection) -> Self {
        self.remover.apply_to = Some(selection);
        self
    }

    pub fn confound_threshold(mut self, threshold: f64) -> Self {
        self.remover.threshold = Some(threshold);
        self
    }

    pub fn n_jobs(mut self, n_jobs: usize) -> Self {
        self.remover.n_jobs = Some(n_jobs);
        self
    }

    pub fn verbose(mut self, verbose: u8) -> Self {
        self.remover.verbose = verbose;
        self
    }

    pub fn random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Take the confound count from `table` and pass the named categorical
    /// columns through the scaler unchanged.
    pub fn for_table(mut self, table: &FeatureTable, categorical: &[String]) -> Result<Self> {
        self.remover.n_confounds = table.n_confounds();
        self.passthrough = categorical
            .iter()
            .map(|name| {
                table.column_index(name).ok_or_else(|| {
                    ContinuumError::ConfigError(format!(
                        "categorical column '{}' is not part of the table",
                        name
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self)
    }

    pub fn build(&self) -> Result<Pipeline> {
        self.remover.validate()?;
        let steps: Vec<Box<dyn Transformer>> = vec![
            Box::new(Scaler::standard().with_passthrough(self.passthrough.clone())),
            Box::new(ConfoundRemover::new(self.remover.clone())),
        ];
        Pipeline::new(
            steps,
            self.kind.estimator(self.random_state),
            self.remover.n_confounds,
        )
    }
}
