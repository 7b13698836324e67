//! Job-count driven parallel map

use crate::error::{ContinuumError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Degree of parallelism for independent jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Number of worker threads (None or 1 = run on the calling thread)
    pub n_jobs: Option<usize>,
}

impl JobsConfig {
    pub fn new(n_jobs: Option<usize>) -> Self {
        Self { n_jobs }
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_jobs == Some(0) {
            return Err(ContinuumError::ConfigError(
                "n_jobs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of threads that will actually be used
    pub fn num_threads(&self) -> usize {
        self.n_jobs.unwrap_or(1)
    }
}

/// Map `f` over `items`, in parallel when more than one job is configured.
///
/// Output order always matches input order and the first error aborts the
/// whole map.
pub fn map_jobs<T, U, F>(items: &[T], jobs: JobsConfig, f: F) -> Result<Vec<U>>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> Result<U> + Send + Sync,
{
    jobs.validate()?;
    if jobs.num_threads() <= 1 || items.len() <= 1 {
        return items.iter().map(f).collect();
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.num_threads())
        .build()
        .map_err(|e| ContinuumError::ComputationError(e.to_string()))?;

    pool.install(|| items.par_iter().map(|item| f(item)).collect())
}
