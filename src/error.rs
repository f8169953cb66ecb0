use thiserror::Error;
use std::fmt::{self, Display};

/// Identifies which matrix failed to factor. The row index (when present)
/// is carried by EmError::Numerical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {

    /// The full precision matrix K.
    Precision,

    /// The missing-by-missing block of K for a single row.
    MissingPrecision,

    /// The covariance estimated at the maximization step.
    Covariance,

    /// The observed-by-observed block of the covariance for a single row.
    ObservedCovariance
}

impl Display for Block {

    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Block::Precision => write!(f, "precision matrix"),
            Block::MissingPrecision => write!(f, "missing-block precision"),
            Block::Covariance => write!(f, "updated covariance"),
            Block::ObservedCovariance => write!(f, "observed-block covariance")
        }
    }

}

fn at_row(row : &Option<usize>) -> String {
    match row {
        Some(r) => format!(" (row {})", r),
        None => String::new()
    }
}

#[derive(Debug, Error)]
pub enum EmError {

    /// Data, mean and precision dimensions do not agree.
    #[error("Shape mismatch: {0}")]
    Shape(String),

    /// A matrix that must be inverted is singular or not positive-definite.
    #[error("Numerical failure: {block}{} is singular or not positive-definite", at_row(.row))]
    Numerical {
        block : Block,
        row : Option<usize>
    },

    #[error("Numerical failure: precision matrix is not symmetric (max. asymmetry {0:e})")]
    NotSymmetric(f64),

    /// No observed entry is available to initialize this column.
    #[error("Column {0} has no observed entries")]
    EmptyColumn(usize),

    #[error("Table error: {0}")]
    Table(String)

}

impl EmError {

    pub(crate) fn numerical(block : Block) -> Self {
        EmError::Numerical { block, row : None }
    }

    pub(crate) fn numerical_at(block : Block, row : usize) -> Self {
        EmError::Numerical { block, row : Some(row) }
    }

    pub fn is_numerical(&self) -> bool {
        match self {
            EmError::Numerical { .. } | EmError::NotSymmetric(_) => true,
            _ => false
        }
    }

}

impl From<csv::Error> for EmError {

    fn from(e : csv::Error) -> Self {
        EmError::Table(format!("{}", e))
    }

}

impl From<std::io::Error> for EmError {

    fn from(e : std::io::Error) -> Self {
        EmError::Table(format!("{}", e))
    }

}

pub type Result<T> = std::result::Result<T, EmError>;

#[test]
fn numerical_message() {
    let e = EmError::numerical_at(Block::MissingPrecision, 3);
    assert_eq!(
        format!("{}", e),
        "Numerical failure: missing-block precision (row 3) is singular or not positive-definite"
    );
    assert!(e.is_numerical());
    assert!(!EmError::EmptyColumn(0).is_numerical());
}
