use nalgebra::*;
use rayon::prelude::*;
use crate::error::{EmError, Block, Result};
use crate::prob::*;
use crate::sample::*;
use super::impute::Conditional;

/// First and second moment sufficient statistics of a completed data matrix:
/// t1 = sum_i x_i (p x 1) and t2 = sum_i x_i x_i^T (p x p), with t2 possibly
/// corrected by the conditional covariance of the imputed entries.
#[derive(Debug, Clone, PartialEq)]
pub struct SufficientStats {

    pub n : usize,

    pub t1 : DVector<f64>,

    pub t2 : DMatrix<f64>
}

impl SufficientStats {

    /// Statistics of the completed matrix alone: its column sums
    /// and its Gram matrix, without any correction.
    pub fn from_completed(completed : &DMatrix<f64>) -> Self {
        let t1 = completed.row_sum().transpose();
        let t2 = completed.tr_mul(completed);
        Self { n : completed.nrows(), t1, t2 }
    }

    /// Maximization step over the accumulated statistics.
    pub fn update(&self) -> Result<GaussianParams> {
        super::update::update_params(&self.t1, &self.t2, self.n)
    }

}

/// Adds a block at the informed (symmetric) index sequence of t2.
pub(crate) fn add_block(t2 : &mut DMatrix<f64>, ixs : &[usize], block : &DMatrix<f64>) {
    for (bi, i) in ixs.iter().enumerate() {
        for (bj, j) in ixs.iter().enumerate() {
            t2[(*i, *j)] += block[(bi, bj)];
        }
    }
}

/// Sums the conditional covariances of the imputed rows into a p x p matrix.
/// Rows are folded in parallel into per-worker partial matrices which are then added.
pub(crate) fn correction_from(conds : &[Conditional], p : usize) -> DMatrix<f64> {
    conds.par_iter()
        .fold(|| DMatrix::zeros(p, p), |mut acc, c| {
            if let Some(cov) = &c.cov {
                add_block(&mut acc, &c.missing, cov);
            }
            acc
        })
        .reduce(|| DMatrix::zeros(p, p), |a, b| a + b )
}

pub(crate) fn correction_partitioned(parts : &[Partition], k : &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let p = k.nrows();
    parts.par_iter()
        .enumerate()
        .try_fold(|| DMatrix::zeros(p, p), |mut acc, (i, part)| -> Result<DMatrix<f64>> {
            if !part.is_complete() {
                let k_mm = submatrix(k, &part.missing, &part.missing);
                let cov = invert_pd(&k_mm).ok_or(EmError::numerical_at(Block::MissingPrecision, i))?;
                add_block(&mut acc, &part.missing, &cov);
            }
            Ok(acc)
        })
        .try_reduce(|| DMatrix::zeros(p, p), |a, b| Ok(a + b) )
}
