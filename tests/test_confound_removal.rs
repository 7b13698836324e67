//! Integration test: confound removal and the row-norm heuristic

use confound_continuum::preprocessing::{ColumnSelection, ConfoundRemover, ConfoundRemoverConfig};
use confound_continuum::training::{
    cross_validate, heuristic_c, CVSplit, HeuristicWrapper, LinearSVR, Regressor,
};
use confound_continuum::utils::JobsConfig;
use confound_continuum::ContinuumError;
use ndarray::{array, s, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn brain_like_data(n: usize, seed: u64) -> Array2<f64> {
    // 3 features driven by 2 confounds (age, sex) plus noise
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Array2::from_shape_fn((n, 5), |(_, j)| match j {
        3 => rng.gen_range(45.0..80.0),
        4 => f64::from(rng.gen_range(0..2u8)),
        _ => rng.gen_range(-0.5..0.5),
    })
}

fn with_confound_signal(mut x: Array2<f64>) -> Array2<f64> {
    for i in 0..x.nrows() {
        let age = x[[i, 3]];
        let sex = x[[i, 4]];
        x[[i, 0]] += 0.05 * age;
        x[[i, 1]] -= 0.8 * sex;
        x[[i, 2]] += 0.02 * age + 0.3 * sex;
    }
    x
}

fn remover(n_confounds: usize) -> ConfoundRemover {
    ConfoundRemover::new(ConfoundRemoverConfig::new().with_n_confounds(n_confounds))
}

#[test]
fn test_constant_confound_scenario() {
    let x = array![[1.0, 2.0, 10.0], [2.0, 3.0, 10.0], [3.0, 4.0, 10.0], [4.0, 5.0, 10.0]];
    let mut cr = remover(1);
    cr.fit(&x, None).unwrap();
    let out = cr.transform(&x).unwrap();

    assert_eq!(out.dim(), (4, 2));
    let expected = array![[-1.5, -1.5], [-0.5, -0.5], [0.5, 0.5], [1.5, 1.5]];
    for (o, e) in out.iter().zip(expected.iter()) {
        assert!((o - e).abs() < 1e-10, "got {}, expected {}", o, e);
    }
}

#[test]
fn test_confound_signal_is_removed() {
    let x = with_confound_signal(brain_like_data(200, 1));
    let mut cr = remover(2);
    cr.fit(&x, None).unwrap();
    let out = cr.transform(&x).unwrap();

    for j in 0..3 {
        let centered_age = &x.column(3) - x.column(3).mean().unwrap();
        let cov = out.column(j).dot(&centered_age) / x.nrows() as f64;
        assert!(cov.abs() < 1e-8, "column {} still covaries with age: {}", j, cov);
    }
}

#[test]
fn test_leakage_invariant() {
    let x = with_confound_signal(brain_like_data(60, 2));
    let train = x.slice(s![..40, ..]).to_owned();
    let test = x.slice(s![40.., ..]).to_owned();
    let mut perturbed_test = test.clone();
    perturbed_test.mapv_inplace(|v| v * 3.0 + 7.0);

    let mut a = remover(2);
    a.fit(&train, None).unwrap();
    let mut b = remover(2);
    b.fit(&train, None).unwrap();

    // Models fitted on identical training rows behave identically on any input
    assert_eq!(a.transform(&test).unwrap(), b.transform(&test).unwrap());
    assert_eq!(
        a.transform(&perturbed_test).unwrap(),
        b.transform(&perturbed_test).unwrap()
    );

    // Transforming held-out data never changes the fitted state
    let before = a.transform(&train).unwrap();
    a.transform(&perturbed_test).unwrap();
    assert_eq!(a.transform(&train).unwrap(), before);

}

#[test]
fn test_heuristic_c_ignores_held_out_rows() {
    let x = with_confound_signal(brain_like_data(60, 2));
    let features = x.slice(s![.., ..3]).to_owned();
    let y = features.column(0).mapv(|v| 2.0 * v + 1.0);

    let mut perturbed = features.clone();
    perturbed.slice_mut(s![40.., ..]).mapv_inplace(|v| v * 3.0 + 7.0);
    assert_ne!(heuristic_c(&features).unwrap(), heuristic_c(&perturbed).unwrap());

    let split = CVSplit {
        train_indices: (0..40).collect(),
        test_indices: (40..60).collect(),
        fold_idx: 0,
    };
    let template = HeuristicWrapper::with_heuristic_c(Box::new(LinearSVR::default()));
    let a = cross_validate(&template, &features, &y, std::slice::from_ref(&split), JobsConfig::default())
        .unwrap();
    let b = cross_validate(&template, &perturbed, &y, &[split], JobsConfig::default()).unwrap();

    let c_train = heuristic_c(&features.slice(s![..40, ..]).to_owned()).unwrap();
    assert_eq!(a.folds[0].params["C"], c_train["C"]);
    assert_eq!(a.folds[0].params["C"], b.folds[0].params["C"]);
    assert_eq!(a.folds[0].train, b.folds[0].train);
}

#[test]
fn test_drop_confounds_toggle() {
    let x = brain_like_data(30, 3);

    let mut dropped = remover(2);
    dropped.fit(&x, Some(ColumnSelection::Indices(vec![0, 2]))).unwrap();
    assert_eq!(dropped.transform(&x).unwrap().ncols(), 3);

    let mut kept = ConfoundRemover::new(
        ConfoundRemoverConfig::new()
            .with_n_confounds(2)
            .with_drop_confounds(false),
    );
    kept.fit(&x, Some(ColumnSelection::Indices(vec![0, 2]))).unwrap();
    let out = kept.transform(&x).unwrap();
    assert_eq!(out.ncols(), 5);
    assert_eq!(out.column(1), x.column(1));
    assert_eq!(out.slice(s![.., 3..]), x.slice(s![.., 3..]));
}

#[test]
fn test_threshold_property() {
    let x = with_confound_signal(brain_like_data(80, 4));
    let t = 0.1;

    let mut raw = remover(2);
    raw.fit(&x, None).unwrap();
    let unthresholded = raw.transform(&x).unwrap();

    let mut thresholded = ConfoundRemover::new(
        ConfoundRemoverConfig::new().with_n_confounds(2).with_threshold(t),
    );
    thresholded.fit(&x, None).unwrap();
    let out = thresholded.transform(&x).unwrap();

    let mut n_zeroed = 0;
    for (o, r) in out.iter().zip(unthresholded.iter()) {
        if r.abs() < t {
            assert_eq!(*o, 0.0);
            n_zeroed += 1;
        } else {
            assert_eq!(*o, *r);
        }
    }
    assert!(n_zeroed > 0);
}

#[test]
fn test_column_layout_mismatch() {
    let x = brain_like_data(20, 5);
    let mut cr = remover(2);
    cr.fit(&x, None).unwrap();

    let wider = Array2::<f64>::zeros((5, 6));
    assert!(matches!(cr.transform(&wider), Err(ContinuumError::ShapeError { .. })));
}

#[test]
fn test_heuristic_wrapper_two_folds() {
    let mut wrapper = HeuristicWrapper::with_heuristic_c(Box::new(LinearSVR::default()));
    let x = with_confound_signal(brain_like_data(40, 6)).slice(s![.., ..3]).to_owned();
    let y = x.column(0).to_owned() * 2.0;

    let fold_a = x.slice(s![..20, ..]).to_owned();
    let fold_b = x.slice(s![20.., ..]).mapv(|v| v * 5.0);

    wrapper.fit(&fold_a, &y.slice(s![..20]).to_owned()).unwrap();
    let c_a = wrapper.get_param("C").unwrap().as_f64().unwrap();
    wrapper.fit(&fold_b, &y.slice(s![20..]).to_owned()).unwrap();
    let c_b = wrapper.get_param("C").unwrap().as_f64().unwrap();

    assert!(c_a != c_b);
    assert_eq!(c_a, heuristic_c(&fold_a).unwrap()["C"].as_f64().unwrap());
    assert_eq!(c_b, heuristic_c(&fold_b).unwrap()["C"].as_f64().unwrap());
}
