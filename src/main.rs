//! Decadal global-mean temperature anomalies for each forcing scenario.
//!
//! # Usage
//!
//! ```bash
//! deltat --config deltat.toml
//! deltat -s 45=af.tas.ccsm4.rcp45.2006-2300.nc -s 85=af.tas.ccsm4.rcp85.2006-2300.nc
//! ```

mod cli;
mod logging;

use clap::Parser;
use deltat_core::errors::DeltaTResult;
use deltat_core::report::AnomalyReport;
use std::process::ExitCode;

use crate::cli::Args;

#[cfg(feature = "netcdf")]
fn forcing_source() -> DeltaTResult<deltat_core::netcdf::NetCdfSource> {
    Ok(deltat_core::netcdf::NetCdfSource)
}

#[cfg(not(feature = "netcdf"))]
fn forcing_source() -> DeltaTResult<deltat_core::forcing::InMemorySource> {
    Err(deltat_core::errors::DeltaTError::InvalidConfig(
        "built without the `netcdf` feature; no forcing files can be read".to_string(),
    ))
}

fn run(args: &Args) -> DeltaTResult<String> {
    let config = args.report_config()?;
    tracing::debug!(?config, "Resolved configuration");

    let table = AnomalyReport::new(&config, forcing_source()?).run()?;
    cli::render(&table, args.format)
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose);

    // Nothing reaches stdout unless every anomaly was computed
    match run(&args) {
        Ok(report) => {
            print!("{}", report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Anomaly report failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
