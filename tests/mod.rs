use nalgebra::*;
use approx::{assert_relative_eq, assert_abs_diff_eq};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;
use emprec::*;
use emprec::fit::em::{cycle_stats, SufficientStats, block_neg_log_density};
use emprec::sample::{partition, submatrix, subvector};

const EPS : f64 = 1E-10;

const NA : f64 = f64::NAN;

fn prec_3() -> DMatrix<f64> {
    DMatrix::from_row_slice(3, 3, &[
        2.0, -0.6, 0.3,
        -0.6, 1.5, -0.4,
        0.3, -0.4, 1.2
    ])
}

fn indefinite_3() -> DMatrix<f64> {
    DMatrix::from_row_slice(3, 3, &[
        1.0, 2.0, 0.0,
        2.0, 1.0, 0.0,
        0.0, 0.0, 1.0
    ])
}

/// Draws n rows from N(mu, sigma), then removes each entry with probability miss_prob.
fn simulate(rng : &mut StdRng, n : usize, mu : &DVector<f64>, sigma : &DMatrix<f64>, miss_prob : f64) -> DMatrix<f64> {
    let p = mu.nrows();
    let l = Cholesky::new(sigma.clone()).unwrap().l();
    let mut d = DMatrix::zeros(n, p);
    for i in 0..n {
        let z = DVector::from_fn(p, |_, _| rng.sample::<f64, _>(StandardNormal) );
        let x = mu + &l * z;
        for j in 0..p {
            d[(i, j)] = if rng.gen::<f64>() < miss_prob { NA } else { x[j] };
        }
    }
    d
}

#[test]
fn complete_rows_are_unchanged() {
    let d = DMatrix::from_row_slice(3, 3, &[
        1.0, 2.0, 3.0,
        -4.0, 0.0, 6.5,
        1E3, -1E-3, 0.0
    ]);
    let mus = [DVector::zeros(3), DVector::from_vec(vec![10.0, -5.0, 2.0])];
    let precs = [DMatrix::identity(3, 3), prec_3()];
    for mu in mus.iter() {
        for k in precs.iter() {
            assert_eq!(impute(&d, mu, k).unwrap(), d);
        }
    }
}

#[test]
fn fully_missing_row_is_imputed_with_mean() {
    let d = DMatrix::from_row_slice(2, 3, &[
        NA, NA, NA,
        1.0, NA, 3.0
    ]);
    let mu = DVector::from_vec(vec![0.5, -1.5, 2.0]);
    let completed = impute(&d, &mu, &prec_3()).unwrap();
    assert_eq!(completed.row(0).transpose(), mu);
    assert_eq!(completed[(1, 0)], 1.0);
    assert_eq!(completed[(1, 2)], 3.0);
    assert!(completed[(1, 1)].is_finite());

    // The input is not modified.
    assert!(d[(1, 1)].is_nan());
}

#[test]
fn imputation_matches_covariance_form() {
    // E[x_m | x_o] = μ_m + Σ_mo Σ_oo^-1 (x_o - μ_o)
    let k = prec_3();
    let sigma = k.clone().try_inverse().unwrap();
    let mu = DVector::from_vec(vec![1.0, 2.0, 3.0]);
    let d = DMatrix::from_row_slice(1, 3, &[NA, 2.5, NA]);
    let part = partition(d.row(0).iter());
    let s_mo = submatrix(&sigma, &part.missing, &part.observed);
    let s_oo = submatrix(&sigma, &part.observed, &part.observed);
    let x_o = DVector::from_vec(vec![2.5]);
    let expected = subvector(&mu, &part.missing) +
        s_mo * s_oo.try_inverse().unwrap() * (x_o - subvector(&mu, &part.observed));
    let completed = impute(&d, &mu, &k).unwrap();
    assert_relative_eq!(completed[(0, 0)], expected[0], epsilon = EPS);
    assert_relative_eq!(completed[(0, 2)], expected[1], epsilon = EPS);
}

#[test]
fn complete_data_gives_sample_moments() {
    let d = DMatrix::from_row_slice(3, 2, &[
        1.0, 2.0,
        2.0, 5.0,
        6.0, 2.0
    ]);
    let out = run_cycle(&d, &DVector::zeros(2), &DMatrix::identity(2, 2)).unwrap();
    assert_relative_eq!(out.mean()[0], 3.0, epsilon = EPS);
    assert_relative_eq!(out.mean()[1], 3.0, epsilon = EPS);

    // Biased (divide-by-n) sample covariance
    let expected = DMatrix::from_row_slice(2, 2, &[
        14.0 / 3.0, -1.0,
        -1.0, 2.0
    ]);
    assert_abs_diff_eq!(out.cov().clone(), expected, epsilon = EPS);
    let ident = out.cov() * out.prec();
    assert_abs_diff_eq!(ident, DMatrix::identity(2, 2), epsilon = EPS);
}

#[test]
fn maximum_likelihood_is_a_fixed_point() {
    let d = DMatrix::from_row_slice(5, 3, &[
        1.0, 2.0, 0.5,
        2.0, 1.0, 1.5,
        0.0, 3.0, 2.0,
        3.0, 2.5, 1.0,
        1.5, 0.5, 3.0
    ]);
    let first = run_cycle(&d, &DVector::zeros(3), &DMatrix::identity(3, 3)).unwrap();
    let second = run_cycle(&d, first.mean(), first.prec()).unwrap();
    assert!(second.max_abs_diff(&first) < 1E-8);
}

#[test]
fn likelihood_is_invariant_to_row_order() {
    let d = DMatrix::from_row_slice(4, 3, &[
        1.0, NA, 0.5,
        NA, NA, NA,
        0.0, 3.0, NA,
        3.0, 2.5, 1.0
    ]);
    let mu = DVector::from_vec(vec![1.0, 2.0, 1.0]);
    let k = prec_3();
    let nll = neg_log_likelihood(&d, &mu, &k).unwrap();
    let perm = DMatrix::from_fn(4, 3, |i, j| d[([3, 0, 2, 1][i], j)] );
    assert_relative_eq!(neg_log_likelihood(&perm, &mu, &k).unwrap(), nll, epsilon = EPS);
}

#[test]
fn likelihood_is_additive_over_rows() {
    let d = DMatrix::from_row_slice(5, 3, &[
        1.0, NA, 0.5,
        2.0, 1.0, 1.5,
        0.0, 3.0, NA,
        NA, 2.5, 1.0,
        1.5, 0.5, 3.0
    ]);
    let mu = DVector::from_vec(vec![1.0, 2.0, 1.0]);
    let k = prec_3();
    let top = d.rows(0, 2).clone_owned();
    let bottom = d.rows(2, 3).clone_owned();
    let whole = neg_log_likelihood(&d, &mu, &k).unwrap();
    let parts = neg_log_likelihood(&top, &mu, &k).unwrap() + neg_log_likelihood(&bottom, &mu, &k).unwrap();
    assert_relative_eq!(whole, parts, epsilon = EPS);
}

#[test]
fn likelihood_uses_covariance_blocks() {
    let d = DMatrix::from_row_slice(3, 3, &[
        1.0, NA, 0.5,
        2.0, 1.0, 1.5,
        NA, NA, NA
    ]);
    let mu = DVector::from_vec(vec![1.0, 2.0, 1.0]);
    let k = prec_3();
    let sigma = k.clone().try_inverse().unwrap();
    let row0 = block_neg_log_density(
        &DVector::from_vec(vec![1.0, 0.5]),
        &DVector::from_vec(vec![1.0, 1.0]),
        &submatrix(&sigma, &[0, 2], &[0, 2])
    ).unwrap();
    let row1 = block_neg_log_density(
        &DVector::from_vec(vec![2.0, 1.0, 1.5]),
        &mu,
        &sigma
    ).unwrap();
    assert_relative_eq!(neg_log_likelihood(&d, &mu, &k).unwrap(), row0 + row1, epsilon = EPS);

    // The fully missing row contributes nothing.
    let d_obs = d.rows(0, 2).clone_owned();
    assert_relative_eq!(
        neg_log_likelihood(&d_obs, &mu, &k).unwrap(),
        neg_log_likelihood(&d, &mu, &k).unwrap(),
        epsilon = EPS
    );
}

#[test]
fn correction_increases_second_moment() {
    let d = DMatrix::from_row_slice(5, 3, &[
        1.0, 2.0, 0.5,
        2.0, NA, 1.5,
        0.0, 3.0, 2.0,
        3.0, 2.5, 1.0,
        1.5, 0.5, 3.0
    ]);
    let mu = DVector::from_vec(vec![1.5, 2.0, 1.6]);
    let k = prec_3();
    let stats = cycle_stats(&d, &mu, &k).unwrap();
    let completed = impute(&d, &mu, &k).unwrap();
    let gram = SufficientStats::from_completed(&completed);
    assert!(stats.t2[(1, 1)] > gram.t2[(1, 1)]);
    assert_relative_eq!(stats.t2[(1, 1)] - gram.t2[(1, 1)], 1. / k[(1, 1)], epsilon = EPS);

    // Only the missing-by-missing block is corrected.
    assert_relative_eq!(stats.t2[(0, 0)], gram.t2[(0, 0)], epsilon = EPS);
    assert_relative_eq!(stats.t2[(0, 1)], gram.t2[(0, 1)], epsilon = EPS);
    assert_abs_diff_eq!(stats.t1.clone(), gram.t1.clone(), epsilon = EPS);
}

#[test]
fn correction_of_complete_data_is_null() {
    let d = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
    let t2 = DMatrix::from_element(2, 2, 7.0);
    let out = accumulate_correction(&d, &DMatrix::identity(2, 2), t2.clone()).unwrap();
    assert_eq!(out, t2);
}

#[test]
fn indefinite_precision_fails_every_operation() {
    // Every row misses only the last column, whose precision block alone is positive.
    let d = DMatrix::from_row_slice(3, 3, &[
        1.0, 2.0, NA,
        2.0, 1.0, NA,
        0.0, 3.0, NA
    ]);
    let mu = DVector::zeros(3);
    let k = indefinite_3();
    assert!(impute(&d, &mu, &k).unwrap_err().is_numerical());
    assert!(accumulate_correction(&d, &k, DMatrix::zeros(3, 3)).unwrap_err().is_numerical());
    assert!(run_cycle(&d, &mu, &k).unwrap_err().is_numerical());
    assert!(cycle_stats(&d, &mu, &k).unwrap_err().is_numerical());
    assert!(neg_log_likelihood(&d, &mu, &k).unwrap_err().is_numerical());
}

#[test]
fn mismatched_shapes_are_rejected() {
    let d = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, NA, 2.0, 1.0, 0.0]);
    let k = prec_3();
    let short_mu = DVector::zeros(2);
    assert!(matches!(impute(&d, &short_mu, &k), Err(EmError::Shape(_))));
    assert!(matches!(run_cycle(&d, &DVector::zeros(3), &DMatrix::identity(2, 2)), Err(EmError::Shape(_))));
    assert!(matches!(neg_log_likelihood(&d, &short_mu, &k), Err(EmError::Shape(_))));
    assert!(matches!(accumulate_correction(&d, &k, DMatrix::zeros(2, 2)), Err(EmError::Shape(_))));
}

#[test]
fn singular_update_is_reported() {
    // Two rows cannot support a 3x3 covariance.
    let d = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 2.0, 1.0, 0.0]);
    let err = run_cycle(&d, &DVector::zeros(3), &DMatrix::identity(3, 3)).unwrap_err();
    assert!(matches!(err, EmError::Numerical { block : Block::Covariance, .. }));
}

#[test]
fn complete_data_converges_immediately() {
    let d = DMatrix::from_row_slice(4, 2, &[
        1.0, 2.0,
        2.0, 5.0,
        6.0, 2.0,
        3.0, 3.5
    ]);
    let fit = ExpectMax::new(EmSettings::new().tol(1E-9)).fit_from_observed(&d).unwrap();
    assert!(fit.converged);
    assert!(fit.n_iter <= 2);
}

#[test]
fn recovers_simulated_parameters() {
    let mut rng = StdRng::seed_from_u64(1);
    let mu = DVector::from_vec(vec![1.0, -1.0, 0.5]);
    let sigma = DMatrix::from_row_slice(3, 3, &[
        1.0, 0.5, 0.2,
        0.5, 2.0, 0.3,
        0.2, 0.3, 1.5
    ]);
    let d = simulate(&mut rng, 2000, &mu, &sigma, 0.15);
    let fit = ExpectMax::new(EmSettings::new().tol(1E-8)).fit_from_observed(&d).unwrap();
    assert!(fit.converged);
    for w in fit.trace.windows(2) {
        assert!(w[1] <= w[0] + 1E-8);
    }
    assert_abs_diff_eq!(fit.params.mean().clone(), mu, epsilon = 0.15);
    assert_abs_diff_eq!(fit.params.cov().clone(), sigma, epsilon = 0.25);

    // At the estimate, one more cycle does not move the parameters.
    let again = run_cycle(&d, fit.params.mean(), fit.params.prec()).unwrap();
    assert!(again.max_abs_diff(&fit.params) < 1E-3);
}

#[test]
fn fully_missing_row_adds_covariance_to_second_moment() {
    let k = prec_3();
    let mu = DVector::from_vec(vec![0.5, -1.0, 2.0]);
    let d = DMatrix::from_row_slice(3, 3, &[
        1.0, 0.0, 2.5,
        NA, NA, NA,
        -0.5, -2.0, 1.0
    ]);
    let sigma = k.clone().try_inverse().unwrap();
    let completed = impute(&d, &mu, &k).unwrap();
    let gram = SufficientStats::from_completed(&completed);

    let stats = cycle_stats(&d, &mu, &k).unwrap();
    assert_abs_diff_eq!(stats.t2 - &gram.t2, sigma.clone(), epsilon = EPS);

    let t2 = accumulate_correction(&d, &k, gram.t2.clone()).unwrap();
    assert_abs_diff_eq!(t2 - &gram.t2, sigma, epsilon = EPS);
}
