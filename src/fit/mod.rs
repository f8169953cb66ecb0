use std::borrow::Borrow;

/// Expectation-Maximization estimation of the mean and precision of a
/// multivariate normal from data with missing entries.
pub mod em;

/// Trait shared by all estimation algorithms. Estimator does not care
/// how the data is stored: the sample is any (cloneable) iterator over rows,
/// each row a slice of values with a fixed number of columns.
/// The implementor is the fitted result itself, so a successful call to
/// estimate(.) yields everything required to inspect the estimate.
pub trait Estimator
where
    Self : Sized
{

    /// Tuning parameters of the algorithm.
    type Settings;

    type Error;

    /// Runs the estimation algorithm over the rows of the sample.
    fn estimate(
        sample : impl Iterator<Item=impl Borrow<[f64]>> + Clone,
        settings : Self::Settings
    ) -> Result<Self, Self::Error>;

}
