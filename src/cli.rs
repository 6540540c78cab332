use clap::{Parser, ValueEnum};
use deltat_core::config::{ReportConfig, Scenario};
use deltat_core::errors::{DeltaTError, DeltaTResult};
use deltat_core::report::AnomalyTable;
use std::path::PathBuf;

/// Global mean temperature anomalies per forcing scenario
#[derive(Parser, Debug)]
#[command(name = "deltat", version)]
#[command(about = "Report decadal global-mean tas anomalies for each forcing scenario")]
pub struct Args {
    /// TOML configuration file; built-in defaults apply when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Scenario as NAME=PATH, repeatable. Replaces the configured scenarios, keeping this order
    #[arg(short, long = "scenario", value_parser = parse_scenario)]
    pub scenarios: Vec<Scenario>,

    /// Output rendering
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

fn parse_scenario(value: &str) -> Result<Scenario, String> {
    match value.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok(Scenario::new(name, path))
        }
        _ => Err(format!("expected NAME=PATH, got '{}'", value)),
    }
}

impl Args {
    /// Configuration file (or defaults) with command-line overrides applied.
    pub fn report_config(&self) -> DeltaTResult<ReportConfig> {
        let mut config = match &self.config {
            Some(path) => ReportConfig::from_file(path)?,
            None => ReportConfig::default(),
        };
        if !self.scenarios.is_empty() {
            config.scenarios = self.scenarios.clone();
        }
        Ok(config)
    }
}

pub fn render(table: &AnomalyTable, format: OutputFormat) -> DeltaTResult<String> {
    match format {
        OutputFormat::Text => Ok(table.to_string()),
        OutputFormat::Json => serde_json::to_string_pretty(table)
            .map(|json| json + "\n")
            .map_err(|e| DeltaTError::Output(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_arguments() {
        let args = Args::try_parse_from(["deltat"]).unwrap();
        assert_eq!(args.format, OutputFormat::Text);
        assert_eq!(args.verbose, 0);

        let config = args.report_config().unwrap();
        assert_eq!(config, ReportConfig::default());
    }

    #[test]
    fn test_scenarios_replace_configured_list_in_order() {
        let args = Args::try_parse_from([
            "deltat",
            "-s",
            "85=data/rcp85.nc",
            "--scenario",
            "45=data/rcp45.nc",
            "--format",
            "json",
            "-vv",
        ])
        .unwrap();

        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.verbose, 2);
        let config = args.report_config().unwrap();
        let names: Vec<&str> = config.scenarios.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["85", "45"]);
        assert_eq!(config.scenarios[1].path, PathBuf::from("data/rcp45.nc"));
    }

    #[test]
    fn test_malformed_scenario_is_rejected() {
        assert!(Args::try_parse_from(["deltat", "-s", "rcp45.nc"]).is_err());
        assert!(Args::try_parse_from(["deltat", "-s", "=rcp45.nc"]).is_err());
    }

    #[test]
    fn test_example_file_spells_out_defaults() {
        let config = ReportConfig::from_toml_str(include_str!("../deltat.example.toml")).unwrap();
        assert_eq!(config, ReportConfig::default());
    }

    #[test]
    fn test_json_output_round_trips() {
        use deltat_core::forcing::{InMemorySource, RawForcing};
        use deltat_core::report::AnomalyReport;
        use ndarray::{array, Array3};

        let year = RawForcing {
            tas: Array3::from_elem((12, 2, 2), 1.0),
            latixy: array![[-45.0, -45.0], [45.0, 45.0]],
            longxy: array![[0.0, 180.0], [0.0, 180.0]],
        };
        let config = ReportConfig {
            base_year: 2000,
            window_months: 12,
            target_years: vec![2001],
            scenarios: vec![Scenario::new("45", "45.nc")],
            ..Default::default()
        };
        let source = InMemorySource::new().with_scenario("45", year.tiled(24));
        let table = AnomalyReport::new(&config, source).run().unwrap();

        let json = render(&table, OutputFormat::Json).unwrap();
        assert!(json.ends_with('\n'));
        let decoded: AnomalyTable = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, table);
    }

    #[test]
    fn test_missing_config_file() {
        let args = Args::try_parse_from(["deltat", "-c", "no/such/deltat.toml"]).unwrap();
        assert!(matches!(
            args.report_config(),
            Err(DeltaTError::DataAccess { .. })
        ));
    }
}
