use nalgebra::*;
use crate::error::{EmError, Block, Result};

mod multinormal;

pub use multinormal::*;

/// Maximum relative asymmetry tolerated in a precision matrix informed by the user.
const SYMMETRY_TOL : f64 = 1E-8;

/// Cholesky factorization of a symmetric positive-definite matrix. Only the
/// lower triangle of m is read. Returns None if m is not square, has
/// non-finite entries, or is singular or not positive-definite.
pub fn cholesky(m : &DMatrix<f64>) -> Option<Cholesky<f64, Dynamic>> {
    if m.nrows() != m.ncols() || m.iter().any(|v| !v.is_finite() ) {
        return None;
    }
    let chol = Cholesky::new(m.clone())?;
    if chol.l_dirty().diagonal().iter().all(|d| d.is_finite() && *d > 0.0 ) {
        Some(chol)
    } else {
        None
    }
}

/// Log-determinant of the factored matrix: 2 * sum(ln(diag(L))).
pub fn log_det(chol : &Cholesky<f64, Dynamic>) -> f64 {
    2. * chol.l_dirty().diagonal().iter().map(|d| d.ln() ).sum::<f64>()
}

/// Inverts a symmetric positive-definite matrix via its Cholesky factor,
/// returning the symmetrized inverse.
pub fn invert_pd(m : &DMatrix<f64>) -> Option<DMatrix<f64>> {
    cholesky(m).map(|chol| build_symmetric(chol.inverse()) )
}

/// Builds a symmetric matrix from M as (1/2)*(M + M^T)
pub fn build_symmetric(m : DMatrix<f64>) -> DMatrix<f64> {
    assert!(m.nrows() == m.ncols(), "build_symmetric: Informed non-square matrix");
    let mt = m.transpose();
    (m + mt).scale(0.5)
}

/// Largest absolute difference between m and its transpose.
pub fn max_asymmetry(m : &DMatrix<f64>) -> f64 {
    let mut max = 0.0f64;
    for i in 0..m.nrows() {
        for j in (i+1)..m.ncols() {
            max = max.max((m[(i, j)] - m[(j, i)]).abs());
        }
    }
    max
}

/// Verifies that a data matrix with p columns, a mean vector and a
/// precision matrix agree in dimension.
pub fn check_shape(p : usize, mu : &DVector<f64>, k : &DMatrix<f64>) -> Result<()> {
    if k.nrows() != k.ncols() {
        return Err(EmError::Shape(format!("Precision matrix is not square ({}x{})", k.nrows(), k.ncols())));
    }
    if mu.nrows() != p {
        return Err(EmError::Shape(format!("Mean vector has length {} but data has {} columns", mu.nrows(), p)));
    }
    if k.nrows() != p {
        return Err(EmError::Shape(format!("Precision matrix is {}x{} but data has {} columns", k.nrows(), k.ncols(), p)));
    }
    Ok(())
}

/// Verifies the precision matrix is symmetric and positive-definite,
/// returning its Cholesky factor.
pub fn factor_precision(k : &DMatrix<f64>) -> Result<Cholesky<f64, Dynamic>> {
    let asym = max_asymmetry(k);
    let scale = k.amax().max(1.0);
    if !(asym <= SYMMETRY_TOL * scale) {
        if asym.is_nan() {
            return Err(EmError::numerical(Block::Precision));
        }
        return Err(EmError::NotSymmetric(asym));
    }
    cholesky(k).ok_or(EmError::numerical(Block::Precision))
}
