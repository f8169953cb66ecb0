use nalgebra::*;
use serde::{Serialize, Deserialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use anyhow;
use crate::prob::GaussianParams;
use super::EmFit;

fn to_rows(m : &DMatrix<f64>) -> Vec<Vec<f64>> {
    m.row_iter().map(|r| r.iter().cloned().collect() ).collect()
}

fn from_rows(rows : &[Vec<f64>]) -> Result<DMatrix<f64>, anyhow::Error> {
    let nrows = rows.len();
    let ncols = rows.first().map(|r| r.len() ).unwrap_or(0);
    if rows.iter().any(|r| r.len() != ncols ) {
        return Err(anyhow::Error::msg("Matrix rows have different lengths"));
    }
    Ok(DMatrix::from_fn(nrows, ncols, |i, j| rows[i][j] ))
}

/// Human-readable record of an EM fit, with matrices written as nested rows.
/// Reports can be loaded back to recover the estimated parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {

    pub names : Vec<String>,

    pub mean : Vec<f64>,

    pub cov : Vec<Vec<f64>>,

    pub prec : Vec<Vec<f64>>,

    /// Partial correlations -k_ij / sqrt(k_ii k_jj) implied by the precision.
    pub partial_corr : Vec<Vec<f64>>,

    /// Observed-data negative log-likelihood at the estimate.
    pub nll : f64,

    /// Negative log-likelihood at the starting values and after each cycle.
    pub trace : Vec<f64>,

    pub n_iter : usize,

    pub converged : bool
}

impl Report {

    pub fn new(fit : &EmFit, names : &[String]) -> Self {
        Self {
            names : names.to_vec(),
            mean : fit.params.mean().iter().cloned().collect(),
            cov : to_rows(fit.params.cov()),
            prec : to_rows(fit.params.prec()),
            partial_corr : to_rows(&fit.params.partial_corr()),
            nll : fit.nll,
            trace : fit.trace.clone(),
            n_iter : fit.n_iter,
            converged : fit.converged
        }
    }

    /// Rebuilds the estimated parameters from the reported mean and precision.
    pub fn params(&self) -> Result<GaussianParams, anyhow::Error> {
        let mu = DVector::from_vec(self.mean.clone());
        let prec = from_rows(&self.prec[..])?;
        Ok(GaussianParams::from_precision(mu, prec)?)
    }

    pub fn load<R>(mut reader : R) -> Result<Self, anyhow::Error>
    where
        R : Read
    {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Ok(serde_json::from_str(&content[..])?)
    }

    pub fn load_from_path<P>(path : P) -> Result<Self, anyhow::Error>
    where
        P : AsRef<Path>
    {
        let f = File::open(path)?;
        Self::load(f)
    }

    pub fn save<W>(&self, writer : W) -> Result<(), anyhow::Error>
    where
        W : Write
    {
        serde_json::to_writer_pretty(writer, &self)?;
        Ok(())
    }

    pub fn save_to_path<P>(&self, path : P) -> Result<(), anyhow::Error>
    where
        P : AsRef<Path>
    {
        let f = File::create(path)?;
        self.save(f)
    }

}
