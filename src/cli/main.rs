use emprec::*;
use emprec::sample::{Table, MissingPattern};
use emprec::fit::em::Report;
use structopt::*;
use std::path::PathBuf;
use std::io;
use anyhow::Context;
use tracing_subscriber::EnvFilter;
use log::info;

/// Estimate the mean and precision of a multivariate normal from data with missing entries
/// (cells left empty or marked NA/NaN) via Expectation-Maximization.
#[derive(StructOpt, Debug)]
#[structopt(name = "emprec")]
pub enum Emprec {

    /// Fits the mean and precision to a CSV data file, writing a JSON report.
    Fit {
        data : PathBuf,

        /// JSON file with the stopping criteria (max_iter, min_iter, tol).
        #[structopt(short, long)]
        settings : Option<PathBuf>,

        #[structopt(long)]
        max_iter : Option<usize>,

        #[structopt(long)]
        tol : Option<f64>,

        #[structopt(short, long)]
        output : Option<PathBuf>
    },

    /// Evaluates the observed-data negative log-likelihood of a CSV data file
    /// under the parameters of a previous report.
    Nll {
        data : PathBuf,

        #[structopt(short, long)]
        params : PathBuf
    },

    /// Replaces the missing entries of a CSV data file by their conditional expectation
    /// under the parameters of a previous report.
    Impute {
        data : PathBuf,

        #[structopt(short, long)]
        params : PathBuf,

        #[structopt(short, long)]
        output : Option<PathBuf>
    }

}

fn open_table(path : &PathBuf) -> anyhow::Result<Table> {
    Table::open(path).with_context(|| format!("Error opening table {}", path.display()) )
}

fn load_report(path : &PathBuf) -> anyhow::Result<Report> {
    Report::load_from_path(path).with_context(|| format!("Error loading parameters from {}", path.display()) )
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    match Emprec::from_args() {
        Emprec::Fit { data, settings, max_iter, tol, output } => {
            let mut em_settings = match settings {
                Some(path) => EmSettings::load_from_path(&path)
                    .with_context(|| format!("Error loading settings from {}", path.display()) )?,
                None => EmSettings::default()
            };
            if let Some(max_iter) = max_iter {
                em_settings = em_settings.max_iter(max_iter);
            }
            if let Some(tol) = tol {
                em_settings = em_settings.tol(tol);
            }
            em_settings.validate()?;
            let tbl = open_table(&data)?;
            let pattern = MissingPattern::of(tbl.data());
            info!(
                "Loaded {} rows x {} columns; {} missing entries ({:.1}%); {} complete rows",
                pattern.nrows,
                pattern.ncols,
                pattern.total_missing(),
                100. * pattern.missing_rate(),
                pattern.complete_rows
            );
            let empty = pattern.empty_columns();
            if !empty.is_empty() {
                let names : Vec<&str> = empty.iter().map(|j| tbl.names()[*j].as_str() ).collect();
                anyhow::bail!("Columns without any observed entry: {}", names.join(", "));
            }
            let fit = ExpectMax::new(em_settings).fit_from_observed(tbl.data())?;
            let report = Report::new(&fit, tbl.names());
            match output {
                Some(path) => report.save_to_path(path)?,
                None => {
                    report.save(io::stdout())?;
                    println!();
                }
            }
            Ok(())
        },
        Emprec::Nll { data, params } => {
            let tbl = open_table(&data)?;
            let params = load_report(&params)?.params()?;
            let nll = neg_log_likelihood(tbl.data(), params.mean(), params.prec())?;
            println!("{}", nll);
            Ok(())
        },
        Emprec::Impute { data, params, output } => {
            let tbl = open_table(&data)?;
            let params = load_report(&params)?.params()?;
            let completed = impute(tbl.data(), params.mean(), params.prec())?;
            let out = Table::from_matrix(tbl.names().to_vec(), completed)?;
            match output {
                Some(path) => out.save_to_path(path)?,
                None => out.write(io::stdout())?
            }
            Ok(())
        }
    }
}
