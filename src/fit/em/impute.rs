use nalgebra::*;
use rayon::prelude::*;
use crate::error::{EmError, Block, Result};
use crate::prob::*;
use crate::sample::*;

/// Conditional distribution of the missing entries of a single row given its observed entries.
#[derive(Debug, Clone)]
pub(crate) struct Conditional {

    pub row : usize,

    pub missing : Vec<usize>,

    /// Conditional expectation of the missing entries.
    pub mean : DVector<f64>,

    /// Conditional covariance of the missing entries (K_mm^-1), when requested.
    pub cov : Option<DMatrix<f64>>
}

/// Conditional mean of the missing block of a multivariate normal given its observed block,
/// under the precision parameterization:
///
/// x_m = μ_m - K_mm^-1 K_mo (x_o - μ_o)
///
/// Fails with a numerical error if K_mm is singular or not positive-definite.
/// With an empty observed block, the result is just μ_m.
pub fn conditional_mean(
    x_o : &DVector<f64>,
    mu_o : &DVector<f64>,
    mu_m : &DVector<f64>,
    k_mm : &DMatrix<f64>,
    k_mo : &DMatrix<f64>
) -> Result<DVector<f64>> {
    let chol = cholesky(k_mm).ok_or(EmError::numerical(Block::MissingPrecision))?;
    Ok(shifted_mean(&chol, x_o, mu_o, mu_m, k_mo))
}

fn shifted_mean(
    chol_mm : &Cholesky<f64, Dynamic>,
    x_o : &DVector<f64>,
    mu_o : &DVector<f64>,
    mu_m : &DVector<f64>,
    k_mo : &DMatrix<f64>
) -> DVector<f64> {
    if x_o.nrows() == 0 {
        return mu_m.clone();
    }
    let offset = k_mo * (x_o - mu_o);
    mu_m - chol_mm.solve(&offset)
}

/// Conditional distribution of the missing entries of row i of d. Returns None
/// for complete rows. Rows where every entry is missing resolve to the mean.
pub(crate) fn conditional(
    d : &DMatrix<f64>,
    i : usize,
    part : &Partition,
    mu : &DVector<f64>,
    k : &DMatrix<f64>,
    with_cov : bool
) -> Result<Option<Conditional>> {
    if part.is_complete() {
        return Ok(None);
    }
    let mu_m = subvector(mu, &part.missing);
    if part.is_degenerate() && !with_cov {
        return Ok(Some(Conditional { row : i, missing : part.missing.clone(), mean : mu_m, cov : None }));
    }
    let k_mm = submatrix(k, &part.missing, &part.missing);
    let chol = cholesky(&k_mm).ok_or(EmError::numerical_at(Block::MissingPrecision, i))?;
    let mean = if part.is_degenerate() {
        mu_m
    } else {
        let x_o = row_entries(d, i, &part.observed);
        let mu_o = subvector(mu, &part.observed);
        let k_mo = submatrix(k, &part.missing, &part.observed);
        shifted_mean(&chol, &x_o, &mu_o, &mu_m, &k_mo)
    };
    let cov = if with_cov {
        Some(build_symmetric(chol.inverse()))
    } else {
        None
    };
    Ok(Some(Conditional { row : i, missing : part.missing.clone(), mean, cov }))
}

/// Computes the conditional distribution of every incomplete row, in parallel over rows.
pub(crate) fn conditionals(
    d : &DMatrix<f64>,
    parts : &[Partition],
    mu : &DVector<f64>,
    k : &DMatrix<f64>,
    with_cov : bool
) -> Result<Vec<Conditional>> {
    let conds : Vec<Option<Conditional>> = parts.par_iter()
        .enumerate()
        .map(|(i, part)| conditional(d, i, part, mu, k, with_cov) )
        .collect::<Result<Vec<_>>>()?;
    Ok(conds.into_iter().flatten().collect())
}

/// Copies d, replacing its missing entries by their conditional expectations.
pub(crate) fn complete(d : &DMatrix<f64>, conds : &[Conditional]) -> DMatrix<f64> {
    let mut completed = d.clone();
    for c in conds.iter() {
        for (j, v) in c.missing.iter().zip(c.mean.iter()) {
            completed[(c.row, *j)] = *v;
        }
    }
    completed
}

pub(crate) fn impute_partitioned(
    d : &DMatrix<f64>,
    parts : &[Partition],
    mu : &DVector<f64>,
    k : &DMatrix<f64>
) -> Result<DMatrix<f64>> {
    let conds = conditionals(d, parts, mu, k, false)?;
    Ok(complete(d, &conds))
}
