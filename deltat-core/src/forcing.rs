//! Anomaly forcing datasets and the loaders that produce them.
//!
//! A loader ([`ForcingSource`]) returns the three raw variables of a forcing
//! file as a [`RawForcing`]. Turning that into a [`ForcingDataset`] collapses the
//! coordinate fields into a [`LatLonGrid`] and checks that the anomaly field
//! lives on that grid. Datasets are read once, used for every target year of
//! their scenario and then dropped.

use crate::calendar::{time_mean, AveragingWindow, ShortSeriesPolicy, WindowCoverage};
use crate::config::{Scenario, VariableNames};
use crate::errors::{DeltaTError, DeltaTResult};
use crate::grid::{GridValidation, LatLonGrid};
use crate::spatial::AreaAverager;
use crate::FloatValue;
use ndarray::{Array2, Array3};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Variables read from one forcing file, before any validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawForcing {
    /// Monthly anomaly field, `[time, lat, lon]`
    pub tas: Array3<FloatValue>,
    /// Cell-centre latitudes, `[lat, lon]`
    pub latixy: Array2<FloatValue>,
    /// Cell-centre longitudes, `[lat, lon]`
    pub longxy: Array2<FloatValue>,
}

impl RawForcing {
    /// Repeat the time axis cyclically until it spans `months` months.
    ///
    /// Useful to stretch a short synthetic series over the full projection
    /// period. An empty series stays empty.
    pub fn tiled(&self, months: usize) -> Self {
        let (period, rows, columns) = self.tas.dim();
        let tas = if period == 0 {
            self.tas.clone()
        } else {
            Array3::from_shape_fn((months, rows, columns), |(t, i, j)| {
                self.tas[[t % period, i, j]]
            })
        };
        Self {
            tas,
            latixy: self.latixy.clone(),
            longxy: self.longxy.clone(),
        }
    }
}

/// Anomaly field of one scenario on a validated grid.
#[derive(Debug, Clone)]
pub struct ForcingDataset {
    scenario: String,
    tas: Array3<FloatValue>,
    grid: LatLonGrid,
}

impl ForcingDataset {
    /// # Errors
    ///
    /// * `Schema` if the spatial dimensions of `tas` differ from the grid shape
    pub fn new(scenario: &str, tas: Array3<FloatValue>, grid: LatLonGrid) -> DeltaTResult<Self> {
        let (_, rows, columns) = tas.dim();
        if (rows, columns) != grid.shape() {
            return Err(DeltaTError::Schema {
                variable: "tas".to_string(),
                details: format!(
                    "spatial dimensions {}x{} do not match the {}x{} coordinate grid",
                    rows,
                    columns,
                    grid.shape().0,
                    grid.shape().1
                ),
            });
        }
        Ok(Self {
            scenario: scenario.to_string(),
            tas,
            grid,
        })
    }

    /// Validate raw variables of `scenario` and build the dataset.
    pub fn from_raw(
        scenario: &str,
        raw: RawForcing,
        validation: &GridValidation,
    ) -> DeltaTResult<Self> {
        let grid =
            LatLonGrid::from_coordinate_fields(raw.latixy.view(), raw.longxy.view(), validation)?;
        Self::new(scenario, raw.tas, grid)
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    /// Length of the time axis
    pub fn months(&self) -> usize {
        self.tas.dim().0
    }

    pub fn grid(&self) -> &LatLonGrid {
        &self.grid
    }

    pub fn tas(&self) -> &Array3<FloatValue> {
        &self.tas
    }

    /// Mean anomaly field over `window`.
    ///
    /// # Errors
    ///
    /// * `InsufficientData` if the time axis ends inside the window and `policy`
    ///   is `Error`, or if it ends before the window starts
    pub fn window_mean(
        &self,
        window: &AveragingWindow,
        policy: ShortSeriesPolicy,
    ) -> DeltaTResult<Array2<FloatValue>> {
        let months = match (window.coverage(self.months()), policy) {
            (WindowCoverage::Complete(months), _) => months,
            (WindowCoverage::Partial(months), ShortSeriesPolicy::Truncate) => {
                warn!(
                    scenario = %self.scenario,
                    year = window.year(),
                    used = months.len(),
                    requested = window.months(),
                    "Time series ends inside the averaging window; averaging available months"
                );
                months
            }
            _ => {
                return Err(DeltaTError::InsufficientData {
                    scenario: self.scenario.clone(),
                    year: window.year(),
                    required: window.end(),
                    available: self.months(),
                })
            }
        };

        debug!(
            scenario = %self.scenario,
            year = window.year(),
            start = months.start,
            end = months.end,
            "Averaging anomaly field over time"
        );
        Ok(time_mean(self.tas.view(), months))
    }

    /// Time- and area-averaged anomaly over `window`.
    pub fn global_mean(
        &self,
        window: &AveragingWindow,
        policy: ShortSeriesPolicy,
        averager: &dyn AreaAverager,
    ) -> DeltaTResult<FloatValue> {
        let field = self.window_mean(window, policy)?;
        averager.area_average(field.view(), &self.grid)
    }
}

/// Something that can produce the raw forcing variables of a scenario.
pub trait ForcingSource {
    /// Read the variables named in `names` for `scenario`.
    ///
    /// Implementations must release any file handle before returning.
    fn load(&self, scenario: &Scenario, names: &VariableNames) -> DeltaTResult<RawForcing>;
}

/// Forcing data held in memory, keyed by scenario name
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    datasets: HashMap<String, RawForcing>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scenario(mut self, name: &str, raw: RawForcing) -> Self {
        self.insert(name, raw);
        self
    }

    /// Add or replace the data of scenario `name`
    pub fn insert(&mut self, name: &str, raw: RawForcing) {
        self.datasets.insert(name.to_string(), raw);
    }
}

impl ForcingSource for InMemorySource {
    fn load(&self, scenario: &Scenario, _names: &VariableNames) -> DeltaTResult<RawForcing> {
        self.datasets
            .get(&scenario.name)
            .cloned()
            .ok_or_else(|| DeltaTError::DataAccess {
                path: scenario.path.clone(),
                details: format!("no in-memory data for scenario '{}'", scenario.name),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::WindowAlignment;
    use crate::spatial::CosineLatitude;
    use ndarray::array;

    fn raw(months: usize, value: f64) -> RawForcing {
        RawForcing {
            tas: Array3::from_elem((months, 2, 2), value),
            latixy: array![[-30.0, -30.0], [30.0, 30.0]],
            longxy: array![[0.0, 180.0], [0.0, 180.0]],
        }
    }

    fn window(year: i32) -> AveragingWindow {
        AveragingWindow::for_year(2006, year, 12, WindowAlignment::Leading).unwrap()
    }

    #[test]
    fn test_tiling_repeats_the_series() {
        let mut short = raw(3, 0.0);
        for t in 0..3 {
            short.tas.index_axis_mut(ndarray::Axis(0), t).fill(t as f64);
        }

        let long = short.tiled(8);
        assert_eq!(long.tas.dim(), (8, 2, 2));
        let firsts: Vec<f64> = (0..8).map(|t| long.tas[[t, 1, 1]]).collect();
        assert_eq!(firsts, vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0, 0.0, 1.0]);
        assert_eq!(long.latixy, short.latixy);
    }

    #[test]
    fn test_dataset_shape_must_match_grid() {
        let grid = LatLonGrid::new(array![0.0], array![0.0, 90.0, 180.0]).unwrap();
        let result = ForcingDataset::new("45", Array3::zeros((12, 2, 2)), grid);
        assert!(matches!(result, Err(DeltaTError::Schema { .. })));
    }

    #[test]
    fn test_global_mean_of_constant_forcing() {
        let dataset =
            ForcingDataset::from_raw("85", raw(36, 2.0), &GridValidation::default()).unwrap();
        assert_eq!(dataset.scenario(), "85");
        assert_eq!(dataset.months(), 36);
        assert_eq!(dataset.tas().dim(), (36, 2, 2));

        let mean = dataset
            .global_mean(&window(2007), ShortSeriesPolicy::Error, &CosineLatitude)
            .unwrap();
        assert!((mean - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_short_series_is_an_error_by_default() {
        let dataset =
            ForcingDataset::from_raw("45", raw(18, 1.0), &GridValidation::default()).unwrap();
        let result = dataset.window_mean(&window(2007), ShortSeriesPolicy::Error);
        match result {
            Err(DeltaTError::InsufficientData {
                scenario,
                year,
                required,
                available,
            }) => {
                assert_eq!(scenario, "45");
                assert_eq!(year, 2007);
                assert_eq!(required, 24);
                assert_eq!(available, 18);
            }
            other => panic!("Expected InsufficientData, got {:?}", other),
        }
    }

    #[test]
    fn test_truncation_averages_available_months() {
        let mut data = raw(18, 1.0);
        data.tas
            .slice_mut(ndarray::s![12..18, .., ..])
            .fill(3.0);
        let dataset = ForcingDataset::from_raw("45", data, &GridValidation::default()).unwrap();

        let field = dataset
            .window_mean(&window(2007), ShortSeriesPolicy::Truncate)
            .unwrap();
        assert!(field.iter().all(|v| (v - 3.0).abs() < 1e-12));

        // Nothing left to truncate to
        let result = dataset.window_mean(&window(2008), ShortSeriesPolicy::Truncate);
        assert!(matches!(result, Err(DeltaTError::InsufficientData { .. })));
    }

    #[test]
    fn test_in_memory_source_by_name() {
        let source = InMemorySource::new().with_scenario("45", raw(12, 1.0));
        let names = VariableNames::default();

        let known = Scenario::new("45", "45.nc");
        assert_eq!(source.load(&known, &names).unwrap().tas.dim(), (12, 2, 2));

        let unknown = Scenario::new("26", "26.nc");
        assert!(matches!(
            source.load(&unknown, &names),
            Err(DeltaTError::DataAccess { .. })
        ));
    }
}
