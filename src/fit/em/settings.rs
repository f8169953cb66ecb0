use serde::{Serialize, Deserialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use anyhow;

/// Stopping criteria for the EM iterations. The iterations stop when the change in the
/// observed-data negative log-likelihood between two cycles falls below tol
/// (after at least min_iter cycles) or when max_iter cycles were run.
///
/// Settings can be read from a JSON object; absent fields take their default values:
///
/// ```json
/// { "max_iter" : 500, "tol" : 1E-8 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmSettings {

    pub max_iter : usize,

    pub min_iter : usize,

    pub tol : f64
}

impl Default for EmSettings {

    fn default() -> Self {
        Self { max_iter : 1000, min_iter : 1, tol : 1E-5 }
    }

}

impl EmSettings {

    pub fn new() -> Self {
        Default::default()
    }

    pub fn max_iter(mut self, max_iter : usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn min_iter(mut self, min_iter : usize) -> Self {
        self.min_iter = min_iter;
        self
    }

    pub fn tol(mut self, tol : f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.tol.is_finite() || self.tol < 0.0 {
            return Err(anyhow::Error::msg(format!("Invalid tolerance: {}", self.tol)));
        }
        if self.min_iter > self.max_iter {
            return Err(anyhow::Error::msg(format!(
                "Minimum number of iterations ({}) exceeds maximum ({})",
                self.min_iter,
                self.max_iter
            )));
        }
        Ok(())
    }

    pub fn load<R>(mut reader : R) -> Result<Self, anyhow::Error>
    where
        R : Read
    {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        let settings : EmSettings = serde_json::from_str(&content[..])?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_from_path<P>(path : P) -> Result<Self, anyhow::Error>
    where
        P : AsRef<Path>
    {
        let f = File::open(path)?;
        Self::load(f)
    }

}
