//! Input validation for feature matrices and target vectors

use crate::error::{ContinuumError, Result};
use ndarray::{Array1, Array2};

/// Reject empty or non-finite matrices
pub fn check_array(x: &Array2<f64>) -> Result<()> {
    if x.nrows() == 0 {
        return Err(ContinuumError::ValidationError(
            "feature matrix has no rows".to_string(),
        ));
    }
    if let Some(pos) = x.iter().position(|v| !v.is_finite()) {
        let (row, col) = (pos / x.ncols().max(1), pos % x.ncols().max(1));
        return Err(ContinuumError::ValidationError(format!(
            "non-finite value at row {}, column {}",
            row, col
        )));
    }
    Ok(())
}

/// Validate a feature matrix together with its target vector
pub fn check_xy(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    check_array(x)?;
    if x.nrows() != y.len() {
        return Err(ContinuumError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(ContinuumError::ValidationError(
            "target vector contains non-finite values".to_string(),
        ));
    }
    Ok(())
}

/// Column layout must match what the model was fitted on
pub fn check_n_features(x: &Array2<f64>, expected: usize) -> Result<()> {
    if x.ncols() != expected {
        return Err(ContinuumError::ShapeError {
            expected: format!("{} columns", expected),
            actual: format!("{} columns", x.ncols()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_check_array_rejects_nan() {
        let x = array![[1.0, 2.0], [f64::NAN, 0.0]];
        let err = check_array(&x).unwrap_err();
        assert!(err.to_string().contains("row 1, column 0"));
    }

    #[test]
    fn test_check_array_rejects_empty() {
        let x = Array2::<f64>::zeros((0, 3));
        assert!(matches!(check_array(&x), Err(ContinuumError::ValidationError(_))));
    }

    #[test]
    fn test_check_xy_length() {
        let x = array![[1.0], [2.0]];
        let y = array![1.0];
        assert!(matches!(check_xy(&x, &y), Err(ContinuumError::ShapeError { .. })));
    }

    #[test]
    fn test_check_n_features() {
        let x = array![[1.0, 2.0]];
        assert!(check_n_features(&x, 2).is_ok());
        assert!(check_n_features(&x, 3).is_err());
    }
}
