//! Global-mean anomaly report.
//!
//! [`AnomalyReport`] runs the whole computation: for every scenario, in order,
//! load its forcing data, average the anomaly field over each target window and
//! then over the globe. Results land in an [`AnomalyTable`] indexed by
//! `[target year, scenario]`, so a value is tied to its scenario by position
//! only.

use crate::config::ReportConfig;
use crate::errors::{DeltaTError, DeltaTResult};
use crate::forcing::{ForcingDataset, ForcingSource};
use crate::spatial::AreaAverager;
use crate::FloatValue;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Decade- and globe-averaged anomalies, one row per target year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyTable {
    years: Vec<i32>,
    scenarios: Vec<String>,
    labels: Vec<String>,
    /// `[year, scenario]`
    values: Array2<FloatValue>,
}

impl AnomalyTable {
    fn new(years: Vec<i32>, scenarios: Vec<String>, labels: Vec<String>) -> Self {
        let values = Array2::from_elem((years.len(), scenarios.len()), FloatValue::NAN);
        Self {
            years,
            scenarios,
            labels,
            values,
        }
    }

    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn scenario_names(&self) -> &[String] {
        &self.scenarios
    }

    pub fn values(&self) -> &Array2<FloatValue> {
        &self.values
    }

    /// Anomalies of every scenario for `year`, in scenario order
    pub fn for_year(&self, year: i32) -> Option<ArrayView1<FloatValue>> {
        let row = self.years.iter().position(|&y| y == year)?;
        Some(self.values.row(row))
    }

    pub fn get(&self, year: i32, scenario: &str) -> Option<FloatValue> {
        let column = self.scenarios.iter().position(|s| s == scenario)?;
        self.for_year(year).map(|row| row[column])
    }
}

impl fmt::Display for AnomalyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels = self.labels.join(" and ");
        for (year, row) in self.years.iter().zip(self.values.rows()) {
            writeln!(f, "global T anomalies, at {}, for {} are:", year, labels)?;
            writeln!(f, "{:?}", row.to_vec())?;
        }
        Ok(())
    }
}

/// Computes an [`AnomalyTable`] from a configuration and a forcing source.
pub struct AnomalyReport<'a, S: ForcingSource> {
    config: &'a ReportConfig,
    source: S,
    averager: Box<dyn AreaAverager>,
}

impl<'a, S: ForcingSource> AnomalyReport<'a, S> {
    /// Use the weighting scheme named in `config`.
    pub fn new(config: &'a ReportConfig, source: S) -> Self {
        Self {
            config,
            source,
            averager: config.weighting.averager(),
        }
    }

    /// Replace the configured weighting scheme.
    pub fn with_averager(mut self, averager: Box<dyn AreaAverager>) -> Self {
        self.averager = averager;
        self
    }

    /// Compute every (year, scenario) anomaly.
    ///
    /// Stops at the first failure; no partial table is returned.
    pub fn run(&self) -> DeltaTResult<AnomalyTable> {
        self.config.validate()?;
        let windows = self.config.windows()?;

        let mut table = AnomalyTable::new(
            self.config.target_years.clone(),
            self.config
                .scenarios
                .iter()
                .map(|s| s.name.clone())
                .collect(),
            self.config
                .scenarios
                .iter()
                .map(|s| s.label().to_string())
                .collect(),
        );

        for (column, scenario) in self.config.scenarios.iter().enumerate() {
            let raw = self.source.load(scenario, &self.config.variables)?;
            let dataset = ForcingDataset::from_raw(&scenario.name, raw, &self.config.grid)?;
            info!(
                scenario = %scenario.name,
                path = %scenario.path.display(),
                months = dataset.months(),
                rows = dataset.grid().shape().0,
                columns = dataset.grid().shape().1,
                "Loaded forcing dataset"
            );

            for (row, window) in windows.iter().enumerate() {
                let anomaly =
                    dataset.global_mean(window, self.config.short_series, self.averager.as_ref())?;
                if !anomaly.is_finite() {
                    return Err(DeltaTError::NoValidCells {
                        context: format!(
                            "scenario '{}' produced a non-finite mean for {}",
                            scenario.name,
                            window.year()
                        ),
                    });
                }
                info!(
                    scenario = %scenario.name,
                    year = window.year(),
                    weighting = self.averager.name(),
                    anomaly,
                    "Computed global mean anomaly"
                );
                table.values[[row, column]] = anomaly;
            }
        }

        Ok(table)
    }
}
