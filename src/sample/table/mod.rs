use nalgebra::*;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;
use std::fmt::{self, Display};
use crate::error::{EmError, Result};

/// Tokens read as a missing entry, besides an empty cell.
const MISSING_TOKENS : [&'static str; 5] = ["NA", "NaN", "nan", "na", "."];

/// Wraps a row-per-case double precision data matrix loaded from a CSV
/// source, keeping the column names. Missing cells are represented by NaN.
#[derive(Debug, Clone)]
pub struct Table {

    col_names : Vec<String>,

    data : DMatrix<f64>
}

fn parse_cell(cell : &str, line : usize, col : usize) -> Result<f64> {
    let cell = cell.trim();
    if cell.is_empty() || MISSING_TOKENS.iter().any(|t| *t == cell ) {
        return Ok(f64::NAN);
    }
    cell.parse::<f64>()
        .map_err(|_| EmError::Table(format!("Invalid entry '{}' (Line {}, Column {})", cell, line, col)) )
}

/// CSV files might have unnamed columns. If every entry of the first record
/// parses as a number (or a missing token), the record is data: generate the names
/// "(Column {i})" and return the parsed values. Return None if the first line
/// holds valid names.
fn try_convert_header_to_data(header : &csv::StringRecord) -> Option<(Vec<String>, Vec<f64>)> {
    let mut names = Vec::new();
    let mut first_line = Vec::new();
    for (i, e) in header.iter().enumerate() {
        match parse_cell(e, 1, i) {
            Ok(v) => {
                names.push(format!("(Column {})", i));
                first_line.push(v);
            },
            Err(_) => return None
        }
    }
    Some((names, first_line))
}

impl Table {

    pub fn from_reader<R>(mut reader : R) -> Result<Self>
    where R : Read
    {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        content.parse()
    }

    pub fn open<P>(path : P) -> Result<Self>
    where P : AsRef<Path>
    {
        let f = File::open(path)?;
        Self::from_reader(f)
    }

    /// Builds a new table by associating names to the columns of a data matrix.
    pub fn from_matrix(col_names : Vec<String>, data : DMatrix<f64>) -> Result<Self> {
        if col_names.len() != data.ncols() {
            return Err(EmError::Shape(format!(
                "{} column names informed for a matrix with {} columns",
                col_names.len(),
                data.ncols()
            )));
        }
        Ok(Self { col_names, data })
    }

    fn load_from_str(s : &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_reader(s.as_bytes());
        let mut records = reader.records();
        let first = records.next()
            .ok_or_else(|| EmError::Table(format!("No records available")) )??;
        let mut values : Vec<f64> = Vec::new();
        let col_names = match try_convert_header_to_data(&first) {
            Some((names, first_line)) => {
                values.extend(first_line);
                names
            },
            None => first.iter().map(|n| n.to_string() ).collect()
        };
        let ncols = col_names.len();
        for (ix_rec, rec) in records.enumerate() {
            let rec = rec?;
            let line = ix_rec + 2;
            if rec.len() != ncols {
                return Err(EmError::Table(format!(
                    "Record has {} fields but header has {} (Line {})",
                    rec.len(),
                    ncols,
                    line
                )));
            }
            for (j, cell) in rec.iter().enumerate() {
                values.push(parse_cell(cell, line, j)?);
            }
        }
        if values.is_empty() {
            return Err(EmError::Table(format!("No records available")));
        }
        let nrows = values.len() / ncols;
        Ok(Self { col_names, data : DMatrix::from_row_slice(nrows, ncols, &values[..]) })
    }

    pub fn names(&self) -> &[String] {
        &self.col_names[..]
    }

    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }

    pub fn take_content(self) -> DMatrix<f64> {
        self.data
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    /// Writes the table as CSV, with missing entries written as "NA".
    pub fn write<W>(&self, writer : W) -> Result<()>
    where W : Write
    {
        let mut wr = csv::Writer::from_writer(writer);
        wr.write_record(self.col_names.iter())?;
        for row in self.data.row_iter() {
            let fields : Vec<String> = row.iter()
                .map(|v| if crate::sample::is_missing(*v) { String::from("NA") } else { v.to_string() } )
                .collect();
            wr.write_record(fields.iter())?;
        }
        wr.flush()?;
        Ok(())
    }

    pub fn save_to_path<P>(&self, path : P) -> Result<()>
    where P : AsRef<Path>
    {
        let f = File::create(path)?;
        self.write(f)
    }

}

impl Into<DMatrix<f64>> for Table {

    fn into(self) -> DMatrix<f64> {
        self.take_content()
    }

}

impl FromStr for Table {

    type Err = EmError;

    fn from_str(s : &str) -> Result<Self> {
        Self::load_from_str(s)
    }

}

impl Display for Table {

    fn fmt(&self, f : &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Vec::new();
        self.write(&mut buf).map_err(|_| fmt::Error )?;
        write!(f, "{}", String::from_utf8_lossy(&buf))
    }

}
