use nalgebra::*;
use rayon::prelude::*;
use std::f64::consts::PI;
use crate::error::{EmError, Block, Result};
use crate::prob::*;
use crate::sample::*;

/// Negative log-density of an observed block x_o under N(μ_o, Σ_oo):
///
/// 0.5 (ln|Σ_oo| + (x_o - μ_o)^T Σ_oo^-1 (x_o - μ_o) + |o| ln(2π))
///
/// Fails with a numerical error if Σ_oo is singular or not positive-definite.
/// An empty block contributes zero.
pub fn block_neg_log_density(x_o : &DVector<f64>, mu_o : &DVector<f64>, s_oo : &DMatrix<f64>) -> Result<f64> {
    if x_o.nrows() == 0 {
        return Ok(0.0);
    }
    let chol = cholesky(s_oo).ok_or(EmError::numerical(Block::ObservedCovariance))?;
    Ok(neg_log_density(&chol, x_o, mu_o))
}

fn neg_log_density(chol : &Cholesky<f64, Dynamic>, x_o : &DVector<f64>, mu_o : &DVector<f64>) -> f64 {
    let err = x_o - mu_o;
    let quad = err.dot(&chol.solve(&err));
    0.5 * (log_det(chol) + quad + (x_o.nrows() as f64) * (2. * PI).ln())
}

/// Observed-data negative log-likelihood given an already inverted covariance.
/// Each row uses the marginal of its observed columns, whose covariance is
/// the matching block of the full covariance. Row contributions are reduced in parallel.
pub(crate) fn nll_partitioned(
    d : &DMatrix<f64>,
    parts : &[Partition],
    mu : &DVector<f64>,
    sigma : &DMatrix<f64>
) -> Result<f64> {
    parts.par_iter()
        .enumerate()
        .map(|(i, part)| -> Result<f64> {
            if part.observed.is_empty() {
                return Ok(0.0);
            }
            let s_oo = submatrix(sigma, &part.observed, &part.observed);
            let chol = cholesky(&s_oo).ok_or(EmError::numerical_at(Block::ObservedCovariance, i))?;
            let x_o = row_entries(d, i, &part.observed);
            let mu_o = subvector(mu, &part.observed);
            Ok(neg_log_density(&chol, &x_o, &mu_o))
        })
        .try_reduce(|| 0.0, |a, b| Ok(a + b) )
}
