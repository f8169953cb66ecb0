use nalgebra::*;
use crate::error::{EmError, Block, Result};
use crate::prob::*;

/// Maximization step: converts the sufficient statistics of n (completed) rows into
///
/// μ = t1 / n
/// Σ = t2 / n - μ μ^T
/// K = Σ^-1
///
/// Fails with a numerical error if Σ is singular or not positive-definite, which happens
/// when n is small relative to p or when the statistics are degenerate.
pub fn update_params(t1 : &DVector<f64>, t2 : &DMatrix<f64>, n : usize) -> Result<GaussianParams> {
    let p = t1.nrows();
    if t2.nrows() != p || t2.ncols() != p {
        return Err(EmError::Shape(format!(
            "Second moment is {}x{} but first moment has length {}",
            t2.nrows(),
            t2.ncols(),
            p
        )));
    }
    if n == 0 {
        return Err(EmError::Shape(format!("Cannot update parameters from zero rows")));
    }
    let n = n as f64;
    let mu = t1.unscale(n);
    let sigma = build_symmetric(t2.unscale(n) - &mu * mu.transpose());
    let sigma_inv = invert_pd(&sigma).ok_or(EmError::numerical(Block::Covariance))?;
    Ok(GaussianParams::from_parts(mu, sigma, sigma_inv))
}
