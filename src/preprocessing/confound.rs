//! Confound regression
//!
//! The trailing `n_confounds` columns of the input matrix are nuisance
//! variables (age, sex, site, ...). For every selected feature column a
//! separate model predicting that column from the confounds is fitted on the
//! training data; `transform` replaces the column by its residual. The fitted
//! models are reused unchanged for any later data, so no statistic of a held
//! out fold ever reaches the fitted state.

use super::config::{ColumnSelection, ConfoundRemoverConfig};
use super::Transformer;
use crate::error::{ContinuumError, Result};
use crate::training::{LinearRegression, Regressor};
use crate::utils::{check_array, check_n_features, map_jobs, JobsConfig};
use ndarray::{concatenate, s, Array2, Axis};
use tracing::{debug, info, warn};

/// State captured by a successful fit
#[derive(Debug)]
struct FittedConfounds {
    n_features_in: usize,
    /// Candidate-column indices in selection order
    selected: Vec<usize>,
    /// One nuisance model per entry of `selected`
    models: Vec<Box<dyn Regressor>>,
}

/// Removes confound effects from features by per-column regression
#[derive(Debug)]
pub struct ConfoundRemover {
    config: ConfoundRemoverConfig,
    model_confound: Box<dyn Regressor>,
    fitted: Option<FittedConfounds>,
}

impl Default for ConfoundRemover {
    fn default() -> Self {
        Self::new(ConfoundRemoverConfig::default())
    }
}

impl ConfoundRemover {
    /// Create a remover with ordinary least squares as the nuisance model
    pub fn new(config: ConfoundRemoverConfig) -> Self {
        Self {
            config,
            model_confound: Box::new(LinearRegression::new()),
            fitted: None,
        }
    }

    /// Use a different nuisance model. It serves as a template; a fresh copy
    /// is fitted for every column.
    pub fn with_model(mut self, model: Box<dyn Regressor>) -> Self {
        self.model_confound = model;
        self
    }

    pub fn config(&self) -> &ConfoundRemoverConfig {
        &self.config
    }

    pub fn n_confounds(&self) -> usize {
        self.config.n_confounds
    }

    /// Whether confound columns are left out of the output
    pub fn will_drop_confounds(&self) -> bool {
        self.config.drop_confounds
    }

    /// Selected column indices from the last fit, in selection order
    pub fn selected_columns(&self) -> Option<&[usize]> {
        self.fitted.as_ref().map(|f| f.selected.as_slice())
    }

    /// Fitted nuisance models, aligned with `selected_columns`
    pub fn models(&self) -> Option<&[Box<dyn Regressor>]> {
        self.fitted.as_ref().map(|f| f.models.as_slice())
    }

    /// Number of output columns for an input of `n_features_in` columns
    pub fn n_output_features(&self, n_features_in: usize) -> usize {
        if self.config.n_confounds == 0 || !self.config.drop_confounds {
            n_features_in
        } else {
            n_features_in.saturating_sub(self.config.n_confounds)
        }
    }

    /// Fit one nuisance model per selected column.
    ///
    /// `apply_to` picks columns among the non-confound ones; `None` selects
    /// all of them. Refitting discards the previous state.
    pub fn fit(&mut self, x: &Array2<f64>, apply_to: Option<ColumnSelection>) -> Result<&mut Self> {
        self.config.validate()?;
        check_array(x)?;
        self.fitted = None;

        let n_features_in = x.ncols();
        let n_confounds = self.config.n_confounds;

        if n_confounds == 0 {
            warn!("confound removal disabled: n_confounds is 0, features pass through unchanged");
            self.fitted = Some(FittedConfounds {
                n_features_in,
                selected: Vec::new(),
                models: Vec::new(),
            });
            return Ok(self);
        }

        if n_confounds > n_features_in {
            return Err(ContinuumError::ShapeError {
                expected: format!("at least {} columns (n_confounds)", n_confounds),
                actual: format!("{} columns", n_features_in),
            });
        }

        let n_candidates = n_features_in - n_confounds;
        let selected = match apply_to.as_ref() {
            Some(selection) => selection.resolve(n_candidates)?,
            None => (0..n_candidates).collect(),
        };

        let confounds = x.slice(s![.., n_candidates..]).to_owned();
        let template = self.model_confound.as_ref();
        let verbose = self.config.verbose;

        let models = map_jobs(&selected, JobsConfig::new(self.config.n_jobs), |&col| {
            let mut model = template.fresh();
            let target = x.column(col).to_owned();
            model.fit(&confounds, &target)?;
            if verbose >= 2 {
                debug!(column = col, model = model.name(), "Fitted confound model");
            }
            Ok(model)
        })?;

        if verbose >= 1 {
            info!(
                n_models = models.len(),
                n_confounds,
                n_samples = x.nrows(),
                "Fitted confound remover"
            );
        }

        self.fitted = Some(FittedConfounds {
            n_features_in,
            selected,
            models,
        });
        Ok(self)
    }

    /// Replace each selected column by its residual against the confounds.
    ///
    /// Columns that were not selected are returned unchanged in their
    /// original position. With `drop_confounds == false` the confound columns
    /// are appended unchanged after the features.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let fitted = self.fitted.as_ref().ok_or(ContinuumError::ModelNotFitted)?;
        check_array(x)?;
        check_n_features(x, fitted.n_features_in)?;

        let n_confounds = self.config.n_confounds;
        if n_confounds == 0 {
            return Ok(x.to_owned());
        }

        let n_candidates = x.ncols() - n_confounds;
        let confounds = x.slice(s![.., n_candidates..]);
        let confounds_owned = confounds.to_owned();
        let mut features = x.slice(s![.., ..n_candidates]).to_owned();

        for (model, &col) in fitted.models.iter().zip(fitted.selected.iter()) {
            let predicted = model.predict(&confounds_owned)?;
            let mut residual = &features.column(col) - &predicted;
            if let Some(t) = self.config.threshold {
                residual.mapv_inplace(|r| if r.abs() < t { 0.0 } else { r });
            }
            features.column_mut(col).assign(&residual);
        }

        if self.config.drop_confounds {
            Ok(features)
        } else {
            concatenate(Axis(1), &[features.view(), confounds]).map_err(ContinuumError::from)
        }
    }
}

impl Transformer for ConfoundRemover {
    fn name(&self) -> &'static str {
        "ConfoundRemover"
    }

    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        let apply_to = self.config.apply_to.clone();
        ConfoundRemover::fit(self, x, apply_to).map(|_| ())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        ConfoundRemover::transform(self, x)
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    fn n_confounds(&self) -> Option<usize> {
        Some(self.config.n_confounds)
    }

    fn fresh(&self) -> Box<dyn Transformer> {
        Box::new(ConfoundRemover::new(self.config.clone()).with_model(self.model_confound.fresh()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::RidgeCV;
    use ndarray::array;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn remover(n_confounds: usize) -> ConfoundRemover {
        ConfoundRemover::new(ConfoundRemoverConfig::new().with_n_confounds(n_confounds))
    }

    fn keeping(n_confounds: usize) -> ConfoundRemover {
        ConfoundRemover::new(
            ConfoundRemoverConfig::new()
                .with_n_confounds(n_confounds)
                .with_drop_confounds(false),
        )
    }

    fn random_matrix(rows: usize, cols: usize, seed: u64) -> Array2<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-1.0..1.0))
    }

    #[test]
    fn test_disabled_passes_through_and_warns_once() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();

        let x = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let out = tracing::subscriber::with_default(subscriber, || {
            let mut cr = remover(0);
            cr.fit(&x, None).unwrap();
            cr.transform(&x).unwrap()
        });

        assert_eq!(out, x);
        assert_eq!(logs.contents().matches("confound removal disabled").count(), 1);
    }

    #[test]
    fn test_constant_confound_removes_mean() {
        let x = array![[1.0, 2.0, 5.0], [3.0, 4.0, 5.0], [5.0, 6.0, 5.0], [7.0, 8.0, 5.0]];
        let mut cr = remover(1);
        cr.fit(&x, None).unwrap();
        let out = cr.transform(&x).unwrap();

        let expected = array![[-3.0, -3.0], [-1.0, -1.0], [1.0, 1.0], [3.0, 3.0]];
        assert_eq!(out.dim(), (4, 2));
        for (o, e) in out.iter().zip(expected.iter()) {
            assert!((o - e).abs() < 1e-10);
        }
    }

    #[test]
    fn test_residuals_orthogonal_to_confounds() {
        let mut x = random_matrix(60, 5, 7);
        // make feature 0 depend on both confounds
        for i in 0..60 {
            x[[i, 0]] += 3.0 * x[[i, 3]] - 2.0 * x[[i, 4]];
        }

        let mut cr = remover(2);
        cr.fit(&x, None).unwrap();
        let out = cr.transform(&x).unwrap();

        for j in 0..3 {
            let residual = out.column(j);
            assert!(residual.mean().unwrap().abs() < 1e-9);
            for k in 3..5 {
                assert!(residual.dot(&x.column(k)).abs() < 1e-8);
            }
        }
    }

    #[test]
    fn test_transform_is_deterministic() {
        let x = random_matrix(30, 4, 3);
        let mut cr = remover(1);
        cr.fit(&x, None).unwrap();
        assert_eq!(cr.transform(&x).unwrap(), cr.transform(&x).unwrap());
    }

    #[test]
    fn test_refit_on_residuals_is_idempotent() {
        let x = random_matrix(40, 4, 11);
        let mut cr = keeping(1);
        cr.fit(&x, None).unwrap();
        let once = cr.transform(&x).unwrap();

        let mut again = keeping(1);
        again.fit(&once, None).unwrap();
        let twice = again.transform(&once).unwrap();

        for (a, b) in once.iter().zip(twice.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_threshold_zeroes_small_residuals() {
        let x = random_matrix(50, 3, 5);
        let t = 0.2;
        let mut cr = ConfoundRemover::new(
            ConfoundRemoverConfig::new().with_n_confounds(1).with_threshold(t),
        );
        cr.fit(&x, None).unwrap();
        let out = cr.transform(&x).unwrap();

        let mut plain = remover(1);
        plain.fit(&x, None).unwrap();
        let raw = plain.transform(&x).unwrap();

        for (o, r) in out.iter().zip(raw.iter()) {
            if r.abs() < t {
                assert_eq!(*o, 0.0);
            } else {
                assert_eq!(o, r);
            }
        }
    }

    #[test]
    fn test_drop_confounds_controls_width() {
        let x = random_matrix(20, 5, 1);

        let mut dropped = remover(2);
        dropped.fit(&x, None).unwrap();
        assert_eq!(dropped.transform(&x).unwrap().ncols(), 3);
        assert_eq!(dropped.n_output_features(5), 3);

        let mut kept = keeping(2);
        kept.fit(&x, None).unwrap();
        let out = kept.transform(&x).unwrap();
        assert_eq!(out.ncols(), 5);
        assert_eq!(out.slice(s![.., 3..]), x.slice(s![.., 3..]));
    }

    #[test]
    fn test_apply_to_leaves_other_columns() {
        let x = random_matrix(25, 4, 9);
        let mut cr = remover(1);
        cr.fit(&x, Some(ColumnSelection::Indices(vec![2, 0]))).unwrap();

        assert_eq!(cr.selected_columns().unwrap(), &[2, 0]);
        assert_eq!(cr.models().unwrap().len(), 2);

        let out = cr.transform(&x).unwrap();
        assert_eq!(out.column(1), x.column(1));
        assert!(out.column(0) != x.column(0));

        let mut masked = remover(1);
        masked
            .fit(&x, Some(ColumnSelection::Mask(vec![true, false, true])))
            .unwrap();
        assert_eq!(masked.transform(&x).unwrap(), out);
    }

    #[test]
    fn test_models_depend_only_on_training_rows() {
        let train = random_matrix(30, 3, 21);
        let test_a = random_matrix(10, 3, 22);
        let test_b = &test_a * 100.0;

        let mut cr = remover(1);
        cr.fit(&train, None).unwrap();
        let before = cr.transform(&train).unwrap();
        cr.transform(&test_a).unwrap();
        cr.transform(&test_b).unwrap();
        assert_eq!(cr.transform(&train).unwrap(), before);

        let mut other = remover(1);
        other.fit(&train, None).unwrap();
        assert_eq!(other.transform(&test_a).unwrap(), cr.transform(&test_a).unwrap());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let x = random_matrix(40, 8, 4);
        let mut seq = remover(2);
        seq.fit(&x, None).unwrap();

        let mut par = ConfoundRemover::new(
            ConfoundRemoverConfig::new().with_n_confounds(2).with_n_jobs(4),
        );
        par.fit(&x, None).unwrap();

        assert_eq!(seq.transform(&x).unwrap(), par.transform(&x).unwrap());
    }

    #[test]
    fn test_custom_nuisance_model() {
        let x = random_matrix(40, 3, 13);
        let mut cr = remover(1).with_model(Box::new(RidgeCV::default()));
        cr.fit(&x, None).unwrap();
        assert_eq!(cr.models().unwrap()[0].name(), "RidgeCV");
        assert_eq!(cr.transform(&x).unwrap().ncols(), 2);
    }

    #[test]
    fn test_errors() {
        let x = random_matrix(10, 3, 2);

        let cr = remover(1);
        assert!(matches!(cr.transform(&x), Err(ContinuumError::ModelNotFitted)));

        let mut cr = remover(1);
        cr.fit(&x, None).unwrap();
        let narrow = random_matrix(10, 2, 2);
        assert!(matches!(cr.transform(&narrow), Err(ContinuumError::ShapeError { .. })));

        let mut too_many = remover(4);
        assert!(matches!(too_many.fit(&x, None), Err(ContinuumError::ShapeError { .. })));

        let mut bad_sel = remover(1);
        assert!(bad_sel
            .fit(&x, Some(ColumnSelection::Indices(vec![5])))
            .is_err());
    }

    #[test]
    fn test_all_columns_confounds() {
        let x = random_matrix(10, 2, 8);
        let mut cr = remover(2);
        cr.fit(&x, None).unwrap();
        assert_eq!(cr.transform(&x).unwrap().ncols(), 0);
    }

    #[test]
    fn test_transformer_interface_uses_configured_selection() {
        let x = random_matrix(20, 3, 6);
        let config = ConfoundRemoverConfig::new()
            .with_n_confounds(1)
            .with_apply_to(ColumnSelection::Indices(vec![1]));
        let mut cr: Box<dyn Transformer> = Box::new(ConfoundRemover::new(config));
        let out = cr.fit_transform(&x).unwrap();
        assert_eq!(out.column(0), x.column(0));

        let fresh = cr.fresh();
        assert!(!fresh.is_fitted());
    }
}
