//! Model training module
//!
//! Regression estimators sharing the [`Regressor`] capability set:
//! - Linear models (OLS, ridge, RidgeCV)
//! - Linear support vector regression
//! - Heuristic hyperparameter wrapper
//! - Cross-validation splitters and the evaluation driver

mod models;
pub mod cross_validation;
pub mod heuristic;
pub mod linear_models;
pub mod svm;

pub use cross_validation::{
    cross_validate, train_test_split, CVReport, CVResults, CVSplit, CVStrategy, CrossValidator,
    FoldReport, Metric,
};
pub use heuristic::{heuristic_c, heuristic_c_fn, mean_row_norm, HeuristicFn, HeuristicWrapper};
pub use linear_models::{LinearRegression, RidgeCV, RidgeCVConfig};
pub use models::{pearson_r, r2_score, spearman_r, HyperParams, ModelMetrics, ParamValue, Regressor};
pub use svm::{LinearSVR, LinearSVRConfig, SVRLoss};
