/// Error type shared by all estimation routines.
pub mod error;

/// Data matrices with missing entries: per-row partition of columns into
/// observed and missing sets, submatrix extraction by index sequences, and
/// CSV loading (via the csv crate).
pub mod sample;

/// Gaussian parameter state (mean, precision and the derived covariance),
/// and the positive-definite factorizations all estimators rely on.
pub mod prob;

/// Estimation algorithms. Currently holds the Expectation-Maximization
/// estimator for the mean and precision of a multivariate normal
/// observed with missing entries.
pub mod fit;

pub use error::{EmError, Block, Result};

pub use prob::GaussianParams;

pub use fit::em::{
    impute,
    accumulate_correction,
    run_cycle,
    neg_log_likelihood,
    ExpectMax,
    EmSettings,
    EmFit
};
