use nalgebra::*;
use std::borrow::Borrow;
use log::{debug, info, warn};
use crate::error::{EmError, Result};
use crate::prob::*;
use crate::sample::*;
use super::Estimator;

/// Expectation step: conditional-mean imputation of the missing entries of each row.
mod impute;

/// Sufficient statistics of the completed data and the conditional-covariance correction.
mod stats;

/// Maximization step.
mod update;

/// Observed-data negative log-likelihood.
mod likelihood;

mod settings;

mod report;

pub use impute::conditional_mean;

pub use stats::SufficientStats;

pub use update::update_params;

pub use likelihood::block_neg_log_density;

pub use settings::EmSettings;

pub use report::Report;

fn warn_degenerate(parts : &[Partition]) {
    let n_degenerate = parts.iter().filter(|p| p.is_degenerate() ).count();
    if n_degenerate > 0 {
        warn!("{} row(s) have all entries missing and carry no information", n_degenerate);
    }
}

/// Validates shapes and the precision, and partitions the rows of d.
fn prepare(d : &DMatrix<f64>, mu : &DVector<f64>, k : &DMatrix<f64>) -> Result<(Vec<Partition>, Cholesky<f64, Dynamic>)> {
    check_shape(d.ncols(), mu, k)?;
    let chol = factor_precision(k)?;
    let parts = partition_rows(d);
    warn_degenerate(&parts);
    Ok((parts, chol))
}

/// Replaces the missing (non-finite) entries of d by their conditional expectation
/// given the observed entries of the same row, under N(μ, K^-1):
///
/// x_m = μ_m - K_mm^-1 K_mo (x_o - μ_o)
///
/// Complete rows are copied unchanged, and rows with every entry missing are
/// imputed with μ. The informed matrix is not modified.
///
/// Fails with a shape error if μ or K do not match the columns of d, and with a numerical
/// error if K (or the missing block K_mm of any row) is not symmetric positive-definite.
pub fn impute(d : &DMatrix<f64>, mu : &DVector<f64>, k : &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let (parts, _) = prepare(d, mu, k)?;
    impute::impute_partitioned(d, &parts, mu, k)
}

/// Adds the conditional covariance of the missing entries of each row of d (K_mm^-1)
/// to the second moment t2, at the missing-by-missing block of that row. Complete rows
/// add nothing. Consumes t2 and returns the corrected matrix (nothing is returned on failure).
pub fn accumulate_correction(d : &DMatrix<f64>, k : &DMatrix<f64>, mut t2 : DMatrix<f64>) -> Result<DMatrix<f64>> {
    let p = d.ncols();
    if k.nrows() != p || k.ncols() != p || t2.nrows() != p || t2.ncols() != p {
        return Err(EmError::Shape(format!(
            "Data has {} columns but precision is {}x{} and second moment is {}x{}",
            p,
            k.nrows(),
            k.ncols(),
            t2.nrows(),
            t2.ncols()
        )));
    }
    factor_precision(k)?;
    let parts = partition_rows(d);
    warn_degenerate(&parts);
    t2 += stats::correction_partitioned(&parts, k)?;
    Ok(t2)
}

/// Expectation step over the partitioned data: sufficient statistics of the completed
/// data including the conditional-covariance correction. Assumes a validated precision.
fn expected_stats(d : &DMatrix<f64>, parts : &[Partition], mu : &DVector<f64>, k : &DMatrix<f64>) -> Result<SufficientStats> {
    let conds = impute::conditionals(d, parts, mu, k, true)?;
    let completed = impute::complete(d, &conds);
    let mut stats = SufficientStats::from_completed(&completed);
    stats.t2 += stats::correction_from(&conds, d.ncols());
    Ok(stats)
}

/// Expectation step of one EM cycle, returning the sufficient statistics (t1, t2) of the
/// completed data, where t2 carries the conditional-covariance correction of the imputed entries.
pub fn cycle_stats(d : &DMatrix<f64>, mu : &DVector<f64>, k : &DMatrix<f64>) -> Result<SufficientStats> {
    let (parts, _) = prepare(d, mu, k)?;
    expected_stats(d, &parts, mu, k)
}

/// Runs one full EM cycle: imputes the missing entries of d under the current (μ, K),
/// accumulates the corrected sufficient statistics, and returns the updated mean,
/// covariance and precision. The cycle either completes or fails as a whole.
pub fn run_cycle(d : &DMatrix<f64>, mu : &DVector<f64>, k : &DMatrix<f64>) -> Result<GaussianParams> {
    cycle_stats(d, mu, k)?.update()
}

/// Negative log-likelihood of the observed entries of d under N(μ, K^-1), summed over rows.
/// Each row contributes the marginal density of its observed columns, whose covariance
/// is the observed block of Σ = K^-1 (K is inverted once for all rows). Rows
/// without observed entries contribute zero.
///
/// This is only meaningful for raw data: entries filled by impute(.) would be
/// counted as observed.
pub fn neg_log_likelihood(d : &DMatrix<f64>, mu : &DVector<f64>, k : &DMatrix<f64>) -> Result<f64> {
    let (parts, chol) = prepare(d, mu, k)?;
    let sigma = build_symmetric(chol.inverse());
    likelihood::nll_partitioned(d, &parts, mu, &sigma)
}

/// Result of the EM iterations.
#[derive(Debug, Clone)]
pub struct EmFit {

    pub params : GaussianParams,

    /// Observed-data negative log-likelihood at params.
    pub nll : f64,

    /// Negative log-likelihood at the starting values followed by its value after each cycle.
    pub trace : Vec<f64>,

    pub n_iter : usize,

    pub converged : bool
}

/// The expectation maximization algorithm for the maximum likelihood estimate of the mean
/// and precision of a multivariate normal observed with missing entries
/// (assumed missing at random, with an arbitrary pattern per row).
///
/// At each cycle, the missing entries of each row are replaced by their conditional
/// expectation given the observed entries (expectation step), and the mean and covariance
/// are re-estimated from the completed data, adding the conditional covariance of the imputed
/// entries to the sum of squares and cross-products (maximization step). The observed-data
/// negative log-likelihood is guaranteed not to increase between cycles, and the iterations stop once
/// its change falls below the informed tolerance.
///
/// Numerical failures at any cycle abort the iterations with the error.
///
/// # References
/// Dempster, A. P., Laird, N. M., & Rubin, D. B.
/// ([1977](https://rss.onlinelibrary.wiley.com/doi/abs/10.1111/j.2517-6161.1977.tb01600.x)).
/// Maximum Likelihood from Incomplete Data
/// Via the EM Algorithm. Journal of the Royal Statistical Society: Series B (Methodological),
/// 39(1), 1–22. doi: 10.1111/j.2517-6161.1977.tb01600.x
///
/// Little, R. J. A., & Rubin, D. B. (2002). Statistical Analysis with Missing Data (2nd ed.),
/// Section 11.2. Wiley.
#[derive(Debug, Clone, Default)]
pub struct ExpectMax {
    settings : EmSettings
}

impl ExpectMax {

    pub fn new(settings : EmSettings) -> Self {
        Self { settings }
    }

    /// Iterates EM cycles over d starting from the informed parameters.
    pub fn fit(&self, d : &DMatrix<f64>, start : GaussianParams) -> Result<EmFit> {
        let tol = self.settings.tol;
        let (parts, _) = prepare(d, start.mean(), start.prec())?;

        let mut params = start;
        let mut nll = likelihood::nll_partitioned(d, &parts, params.mean(), params.cov())?;
        let mut trace = vec![nll];
        let mut n_iter = 0;
        let mut converged = false;
        debug!("Starting EM (n = {}, p = {}); nll = {}", d.nrows(), d.ncols(), nll);

        while n_iter < self.settings.max_iter {
            let next = expected_stats(d, &parts, params.mean(), params.prec())?.update()?;
            let next_nll = likelihood::nll_partitioned(d, &parts, next.mean(), next.cov())?;
            n_iter += 1;
            let delta = nll - next_nll;
            debug!("Iteration {}: nll = {} (decrease = {:e})", n_iter, next_nll, delta);
            if delta < -tol {
                warn!("Negative log-likelihood increased by {:e} at iteration {}", -delta, n_iter);
            }
            params = next;
            nll = next_nll;
            trace.push(nll);
            if n_iter >= self.settings.min_iter && delta.abs() < tol {
                converged = true;
                break;
            }
        }

        if converged {
            info!("EM converged after {} iteration(s); nll = {}", n_iter, nll);
        } else {
            warn!("EM did not converge after {} iteration(s); nll = {}", n_iter, nll);
        }
        Ok(EmFit { params, nll, trace, n_iter, converged })
    }

    /// Iterates EM cycles over d starting from the observed-data means and variances.
    pub fn fit_from_observed(&self, d : &DMatrix<f64>) -> Result<EmFit> {
        let start = GaussianParams::from_observed(d)?;
        self.fit(d, start)
    }

}

/// Collects the rows of the sample into a data matrix.
fn collect_rows(sample : impl Iterator<Item=impl Borrow<[f64]>> + Clone) -> Result<DMatrix<f64>> {
    let nrows = sample.clone().count();
    let ncols = sample.clone().next().map(|r| { let r : &[f64] = r.borrow(); r.len() }).unwrap_or(0);
    let mut values = Vec::with_capacity(nrows * ncols);
    for (i, row) in sample.enumerate() {
        let row : &[f64] = row.borrow();
        if row.len() != ncols {
            return Err(EmError::Shape(format!("Row {} has {} entries (expected {})", i, row.len(), ncols)));
        }
        values.extend_from_slice(row);
    }
    Ok(DMatrix::from_row_slice(nrows, ncols, &values[..]))
}

impl Estimator for EmFit {

    type Settings = EmSettings;

    type Error = EmError;

    fn estimate(
        sample : impl Iterator<Item=impl Borrow<[f64]>> + Clone,
        settings : Self::Settings
    ) -> Result<Self> {
        let d = collect_rows(sample)?;
        ExpectMax::new(settings).fit_from_observed(&d)
    }

}
