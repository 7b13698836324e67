//! Utility functions shared by the estimators and transformers

mod parallel;
mod validation;

pub use parallel::{map_jobs, JobsConfig};
pub use validation::{check_array, check_n_features, check_xy};
