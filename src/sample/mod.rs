use nalgebra::*;
use serde::{Serialize, Deserialize};

/// Reads and writes data matrices with missing entries from/to CSV files.
pub mod table;

pub use table::Table;

/// Returns true when the entry is a missing value. Any non-finite value
/// (NaN or an infinity) marks a missing entry; zero and negative values are observed.
pub fn is_missing(v : f64) -> bool {
    !v.is_finite()
}

/// Partition of the columns of a single data row into the observed (finite)
/// and missing (non-finite) entries. Both index sequences are ascending,
/// and each column appears in exactly one of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub observed : Vec<usize>,
    pub missing : Vec<usize>
}

impl Partition {

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// A degenerate row carries no information (every entry is missing).
    pub fn is_degenerate(&self) -> bool {
        self.observed.is_empty() && !self.missing.is_empty()
    }

    pub fn ncols(&self) -> usize {
        self.observed.len() + self.missing.len()
    }

}

/// Partitions a row (or any sequence of values) into observed and missing column indices.
pub fn partition<'a>(row : impl IntoIterator<Item=&'a f64>) -> Partition {
    let mut observed = Vec::new();
    let mut missing = Vec::new();
    for (j, v) in row.into_iter().enumerate() {
        if is_missing(*v) {
            missing.push(j);
        } else {
            observed.push(j);
        }
    }
    Partition { observed, missing }
}

/// Partitions every row of the data matrix.
pub fn partition_rows(d : &DMatrix<f64>) -> Vec<Partition> {
    d.row_iter().map(|row| partition(row.iter()) ).collect()
}

/// Copies the entries of m at the informed row and column index sequences
/// into a new matrix of size rows.len() x cols.len().
pub fn submatrix(m : &DMatrix<f64>, rows : &[usize], cols : &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(rows.len(), cols.len(), |i, j| m[(rows[i], cols[j])] )
}

/// Copies the entries of v at the informed index sequence into a new vector.
pub fn subvector(v : &DVector<f64>, ixs : &[usize]) -> DVector<f64> {
    DVector::from_iterator(ixs.len(), ixs.iter().map(|ix| v[*ix] ))
}

/// Copies the entries of row i of d at the informed column index sequence
/// into a column vector.
pub fn row_entries(d : &DMatrix<f64>, i : usize, cols : &[usize]) -> DVector<f64> {
    DVector::from_iterator(cols.len(), cols.iter().map(|j| d[(i, *j)] ))
}

/// Summary of the missingness structure of a data matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingPattern {

    pub nrows : usize,

    pub ncols : usize,

    /// Number of missing entries at each column.
    pub missing_per_column : Vec<usize>,

    /// Rows without any missing entry.
    pub complete_rows : usize,

    /// Rows where every entry is missing.
    pub degenerate_rows : usize
}

impl MissingPattern {

    pub fn of(d : &DMatrix<f64>) -> Self {
        let mut missing_per_column = vec![0; d.ncols()];
        let mut complete_rows = 0;
        let mut degenerate_rows = 0;
        for part in partition_rows(d) {
            for j in part.missing.iter() {
                missing_per_column[*j] += 1;
            }
            if part.is_complete() {
                complete_rows += 1;
            }
            if part.is_degenerate() {
                degenerate_rows += 1;
            }
        }
        Self { nrows : d.nrows(), ncols : d.ncols(), missing_per_column, complete_rows, degenerate_rows }
    }

    pub fn total_missing(&self) -> usize {
        self.missing_per_column.iter().sum()
    }

    /// Proportion of missing entries over the whole matrix.
    pub fn missing_rate(&self) -> f64 {
        let n = self.nrows * self.ncols;
        if n == 0 {
            0.0
        } else {
            self.total_missing() as f64 / n as f64
        }
    }

    /// Columns that have no observed entry at all.
    pub fn empty_columns(&self) -> Vec<usize> {
        self.missing_per_column.iter()
            .enumerate()
            .filter(|(_, m)| **m == self.nrows && self.nrows > 0 )
            .map(|(j, _)| j )
            .collect()
    }

}
