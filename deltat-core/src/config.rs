//! Run configuration
//!
//! Every field has a default, so an empty TOML document describes the standard
//! run: two RCP scenarios from the CCSM4 anomaly forcing files, decadal means
//! starting in 2100 and 2300, cosine-latitude weighting.
//!
//! ```toml
//! target_years = [2100, 2300]
//! window_alignment = "trailing"
//!
//! [grid]
//! mode = "warn"
//!
//! [[scenarios]]
//! name = "45"
//! label = "RCP4.5"
//! path = "af.tas.ccsm4.rcp45.2006-2300.nc"
//! ```

use crate::calendar::{
    AveragingWindow, ShortSeriesPolicy, WindowAlignment, DEFAULT_BASE_YEAR, DEFAULT_WINDOW_MONTHS,
};
use crate::errors::{DeltaTError, DeltaTResult};
use crate::grid::GridValidation;
use crate::spatial::AreaWeighting;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One emissions scenario and the forcing file that holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Short identifier, e.g. `45`
    pub name: String,
    /// Name used in the report, e.g. `RCP4.5`. Falls back to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub path: PathBuf,
}

impl Scenario {
    pub fn new(name: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            label: None,
            path: path.into(),
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// Names of the variables read from each forcing file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariableNames {
    /// Monthly anomaly field `[time, lat, lon]`.
    /// Default: `tas`
    pub tas: String,
    /// 2-D cell-centre latitudes.
    /// Default: `LATIXY`
    pub latitude: String,
    /// 2-D cell-centre longitudes.
    /// Default: `LONGXY`
    pub longitude: String,
}

impl Default for VariableNames {
    fn default() -> Self {
        Self {
            tas: "tas".to_string(),
            latitude: "LATIXY".to_string(),
            longitude: "LONGXY".to_string(),
        }
    }
}

/// Configuration of one anomaly report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Calendar year of the first month in every forcing file.
    /// Default: 2006
    pub base_year: i32,

    /// Number of months averaged for each target year.
    /// Default: 120
    pub window_months: usize,

    /// Whether a window starts at or ends before its target year.
    /// Default: leading
    pub window_alignment: WindowAlignment,

    /// Years reported, in output order.
    /// Default: [2100, 2300]
    pub target_years: Vec<i32>,

    /// Behaviour when a file is too short for a window.
    /// Default: error
    pub short_series: ShortSeriesPolicy,

    /// Spatial weighting scheme.
    /// Default: cosine_latitude
    pub weighting: AreaWeighting,

    pub grid: GridValidation,

    pub variables: VariableNames,

    /// Scenarios in output order. Results are associated with scenarios by position.
    pub scenarios: Vec<Scenario>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            base_year: DEFAULT_BASE_YEAR,
            window_months: DEFAULT_WINDOW_MONTHS,
            window_alignment: WindowAlignment::Leading,
            target_years: vec![2100, 2300],
            short_series: ShortSeriesPolicy::Error,
            weighting: AreaWeighting::CosineLatitude,
            grid: GridValidation::default(),
            variables: VariableNames::default(),
            scenarios: vec![
                Scenario::new("45", "af.tas.ccsm4.rcp45.2006-2300.nc").with_label("RCP4.5"),
                Scenario::new("85", "af.tas.ccsm4.rcp85.2006-2300.nc").with_label("RCP8.5"),
            ],
        }
    }
}

impl ReportConfig {
    pub fn from_toml_str(contents: &str) -> DeltaTResult<Self> {
        toml::from_str(contents).map_err(|e| DeltaTError::InvalidConfig(e.to_string()))
    }

    pub fn from_file(path: &Path) -> DeltaTResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| DeltaTError::DataAccess {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> DeltaTResult<String> {
        toml::to_string(self).map_err(|e| DeltaTError::InvalidConfig(e.to_string()))
    }

    /// Check the configuration for values that cannot produce a report.
    pub fn validate(&self) -> DeltaTResult<()> {
        if self.scenarios.is_empty() {
            return Err(DeltaTError::InvalidConfig(
                "at least one scenario is required".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for scenario in &self.scenarios {
            if !seen.insert(scenario.name.as_str()) {
                return Err(DeltaTError::InvalidConfig(format!(
                    "scenario '{}' is listed more than once",
                    scenario.name
                )));
            }
        }
        if self.target_years.is_empty() {
            return Err(DeltaTError::InvalidConfig(
                "at least one target year is required".to_string(),
            ));
        }
        if !(self.grid.tolerance > 0.0) {
            return Err(DeltaTError::InvalidConfig(format!(
                "grid tolerance must be positive, got {}",
                self.grid.tolerance
            )));
        }
        self.windows().map(|_| ())
    }

    /// Averaging windows for every target year, in `target_years` order.
    pub fn windows(&self) -> DeltaTResult<Vec<AveragingWindow>> {
        self.target_years
            .iter()
            .map(|&year| {
                AveragingWindow::for_year(
                    self.base_year,
                    year,
                    self.window_months,
                    self.window_alignment,
                )
            })
            .collect()
    }
}
