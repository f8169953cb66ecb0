use nalgebra::*;
use std::fmt::{self, Display};
use super::*;
use crate::sample::is_missing;

/// Multivariate normal parameter state for the precision parameterization:
/// the mean μ (p x 1), the precision K (p x p) and the covariance Σ = K^-1
/// derived from it. The precision is the source of truth carried between
/// EM cycles; the covariance is recomputed whenever the precision changes
/// (which costs a Cholesky factorization and inversion).
///
/// All constructors guarantee the precision is symmetric and positive-definite.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianParams {

    mu : DVector<f64>,

    sigma : DMatrix<f64>,

    sigma_inv : DMatrix<f64>
}

impl GaussianParams {

    /// Builds the parameter state from a mean vector and a symmetric positive-definite precision matrix.
    pub fn from_precision(mu : DVector<f64>, prec : DMatrix<f64>) -> Result<Self> {
        check_shape(mu.nrows(), &mu, &prec)?;
        let chol = factor_precision(&prec)?;
        let sigma = build_symmetric(chol.inverse());
        Ok(Self { mu, sigma, sigma_inv : prec })
    }

    /// Builds the parameter state from a mean vector and a symmetric positive-definite covariance matrix.
    pub fn from_covariance(mu : DVector<f64>, sigma : DMatrix<f64>) -> Result<Self> {
        check_shape(mu.nrows(), &mu, &sigma)?;
        let sigma_inv = invert_pd(&sigma).ok_or(EmError::numerical(Block::Covariance))?;
        Ok(Self { mu, sigma, sigma_inv })
    }

    /// Assembles a state whose covariance and precision were already verified
    /// to be mutual inverses.
    pub(crate) fn from_parts(mu : DVector<f64>, sigma : DMatrix<f64>, sigma_inv : DMatrix<f64>) -> Self {
        Self { mu, sigma, sigma_inv }
    }

    /// Starting values for the EM iterations, built from the observed entries only:
    /// the mean of the observed entries of each column, and a diagonal precision
    /// holding the inverse of the (biased) observed variance of each column.
    /// Columns with a single observation or a null variance start with unit variance.
    pub fn from_observed(d : &DMatrix<f64>) -> Result<Self> {
        let p = d.ncols();
        let mut mu = DVector::zeros(p);
        let mut var = DVector::from_element(p, 1.0);
        for (j, col) in d.column_iter().enumerate() {
            let obs : Vec<f64> = col.iter().filter(|v| !is_missing(**v) ).cloned().collect();
            if obs.is_empty() {
                return Err(EmError::EmptyColumn(j));
            }
            let n = obs.len() as f64;
            let m = obs.iter().sum::<f64>() / n;
            let v = obs.iter().map(|o| (o - m).powi(2) ).sum::<f64>() / n;
            mu[j] = m;
            if obs.len() > 1 && v > 0.0 {
                var[j] = v;
            }
        }
        let sigma = DMatrix::from_diagonal(&var);
        let sigma_inv = DMatrix::from_diagonal(&var.map(|v| 1. / v ));
        Ok(Self { mu, sigma, sigma_inv })
    }

    pub fn dim(&self) -> usize {
        self.mu.nrows()
    }

    pub fn mean(&self) -> &DVector<f64> {
        &self.mu
    }

    /// Covariance matrix (inverse of the precision).
    pub fn cov(&self) -> &DMatrix<f64> {
        &self.sigma
    }

    /// Precision matrix (inverse covariance).
    pub fn prec(&self) -> &DMatrix<f64> {
        &self.sigma_inv
    }

    /// Partial correlations implied by the precision matrix: -k_ij / sqrt(k_ii k_jj),
    /// with a unit diagonal. Zero entries are the missing edges of the Gaussian graphical model.
    pub fn partial_corr(&self) -> DMatrix<f64> {
        let k = &self.sigma_inv;
        DMatrix::from_fn(k.nrows(), k.ncols(), |i, j| {
            if i == j {
                1.0
            } else {
                -k[(i, j)] / (k[(i, i)] * k[(j, j)]).sqrt()
            }
        })
    }

    /// Largest absolute difference between the means and precisions of two states.
    pub fn max_abs_diff(&self, other : &GaussianParams) -> f64 {
        let mu_diff = (&self.mu - &other.mu).amax();
        let prec_diff = (&self.sigma_inv - &other.sigma_inv).amax();
        mu_diff.max(prec_diff)
    }

}

impl Display for GaussianParams {

    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gaussian(p = {})\nmean = {}\nprecision = {}", self.dim(), self.mu.transpose(), self.sigma_inv)
    }

}
