//! CSV loading into a [`FeatureTable`]

use super::FeatureTable;
use crate::error::{ContinuumError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Which columns of a CSV file to load
#[derive(Debug, Clone, Default)]
pub struct TableSpec {
    /// Response column
    pub target: String,
    /// Feature columns; empty means every remaining numeric column
    pub features: Vec<String>,
    /// Confound columns, appended after the features in this order
    pub confounds: Vec<String>,
}

impl TableSpec {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.features = features;
        self
    }

    pub fn with_confounds(mut self, confounds: Vec<String>) -> Self {
        self.confounds = confounds;
        self
    }
}

/// Read a CSV file with a header row
pub fn read_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let file = File::open(path.as_ref())
        .map_err(|e| ContinuumError::DataError(format!("{}: {}", path.as_ref().display(), e)))?;

    let reader = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .into_reader_with_file_handle(file);

    reader
        .finish()
        .map_err(|e| ContinuumError::DataError(e.to_string()))
}

/// Load features, confounds and target from a CSV file.
///
/// Rows with a missing value in any used column are dropped.
pub fn load_feature_table(
    path: impl AsRef<Path>,
    spec: &TableSpec,
) -> Result<(FeatureTable, Array1<f64>)> {
    let df = read_csv(path.as_ref())?;
    let (table, y) = table_from_frame(&df, spec)?;
    info!(
        path = %path.as_ref().display(),
        n_samples = table.n_samples(),
        n_features = table.n_features(),
        n_confounds = table.n_confounds(),
        "Loaded feature table"
    );
    Ok((table, y))
}

/// Build a [`FeatureTable`] and target vector from an in-memory frame
pub fn table_from_frame(df: &DataFrame, spec: &TableSpec) -> Result<(FeatureTable, Array1<f64>)> {
    let features: Vec<String> = if spec.features.is_empty() {
        numeric_column_names(df)
            .into_iter()
            .filter(|name| *name != spec.target && !spec.confounds.contains(name))
            .collect()
    } else {
        spec.features.clone()
    };

    if let Some(dup) = spec.confounds.iter().find(|c| features.contains(c)) {
        return Err(ContinuumError::ConfigError(format!(
            "column '{}' is listed both as feature and as confound",
            dup
        )));
    }

    let mut used: Vec<String> = features.clone();
    used.extend(spec.confounds.iter().cloned());
    used.push(spec.target.clone());

    for name in &used {
        if df.column(name).is_err() {
            return Err(ContinuumError::DataError(format!("column '{}' not found", name)));
        }
    }

    let complete = df
        .select(used.iter().map(|s| s.as_str()))?
        .drop_nulls::<String>(None)?;
    if complete.height() == 0 {
        return Err(ContinuumError::DataError(
            "no complete rows left after dropping missing values".to_string(),
        ));
    }

    let y = columns_to_array2(&complete, std::slice::from_ref(&spec.target))?.column(0).to_owned();
    let x = columns_to_array2(&complete, &features)?;
    let confounds = columns_to_array2(&complete, &spec.confounds)?;

    let table = FeatureTable::new(x, features)?.with_confounds(confounds, spec.confounds.clone())?;
    Ok((table, y))
}

/// Names of all numeric columns, in frame order
pub fn numeric_column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|col| col.dtype().is_primitive_numeric())
        .map(|col| col.name().to_string())
        .collect()
}

/// Extract named columns into a row-major matrix.
///
/// Missing values are an error; drop incomplete rows first.
pub fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|col_name| {
            let column = df
                .column(col_name)
                .map_err(|_| ContinuumError::DataError(format!("column '{}' not found", col_name)))?;
            let column_f64 = column
                .cast(&DataType::Float64)
                .map_err(|e| ContinuumError::DataError(e.to_string()))?;
            let values: Result<Vec<f64>> = column_f64
                .f64()
                .map_err(|e| ContinuumError::DataError(e.to_string()))?
                .into_iter()
                .map(|v| {
                    v.ok_or_else(|| {
                        ContinuumError::DataError(format!(
                            "column '{}' is not numeric",
                            col_name
                        ))
                    })
                })
                .collect();
            values
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_refs[c][r]))
}
