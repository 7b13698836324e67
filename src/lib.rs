//! confound-continuum - Leakage-safe confound removal for brain-feature regression
//!
//! This crate provides the modelling core for predicting a behavioural target
//! from brain-derived features while controlling for confounds:
//! - Per-column confound regression fitted on training folds only
//! - A row-norm heuristic for the regularization strength of linear SVR
//! - Scaler → confound remover → estimator pipelines that behave as one model
//! - Cross-validation that refits every stage per fold
//!
//! # Modules
//!
//! - [`data`] - Feature tables with a trailing confound block, CSV loading
//! - [`preprocessing`] - Scaling and confound removal
//! - [`training`] - Estimators, heuristic wrapper, cross-validation, metrics
//! - [`pipeline`] - Named pipelines and their assembly
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use confound_continuum::prelude::*;
//! use ndarray::array;
//!
//! let features = array![[0.2, 1.1], [0.4, 0.9], [0.1, 1.4], [0.8, 0.3]];
//! let table = FeatureTable::new(features, vec!["gmd_1".into(), "gmd_2".into()])?
//!     .with_confounds(array![[61.0], [55.0], [70.0], [48.0]], vec!["Age".into()])?;
//! let y = array![31.0, 35.5, 28.0, 40.2];
//!
//! let mut pipeline = PipelineBuilder::new(PipelineKind::LinearSvrL1Heuristic)
//!     .for_table(&table, &[])?
//!     .build()?;
//! pipeline.fit_table(&table, &y)?;
//! let predictions = pipeline.predict_table(&table)?;
//! # Ok::<(), confound_continuum::ContinuumError>(())
//! ```

// Core error handling
pub mod error;

// Core modules
pub mod data;
pub mod pipeline;
pub mod preprocessing;
pub mod training;

// Services
pub mod cli;

// Utilities
pub mod utils;

pub use error::{ContinuumError, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::data::{load_feature_table, FeatureTable, TableSpec};
    pub use crate::error::{ContinuumError, Result};
    pub use crate::pipeline::{Pipeline, PipelineBuilder, PipelineKind};
    pub use crate::preprocessing::{
        ColumnSelection, ConfoundRemover, ConfoundRemoverConfig, Scaler, ScalerType, Transformer,
    };
    pub use crate::training::{
        cross_validate, heuristic_c, train_test_split, CVReport, CVStrategy, CrossValidator,
        HeuristicWrapper, HyperParams, LinearRegression, LinearSVR, LinearSVRConfig, Metric,
        ModelMetrics, ParamValue, Regressor, RidgeCV, RidgeCVConfig, SVRLoss,
    };
    pub use crate::utils::JobsConfig;
}
