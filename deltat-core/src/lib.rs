//! Global-mean surface temperature anomalies from gridded forcing scenarios.
//!
//! Each scenario's monthly `tas` anomaly field is averaged over a window of
//! months per target year and then over the globe with latitude-aware area
//! weights, giving one number per (year, scenario) pair.
//!
//! ```rust
//! use deltat_core::config::{ReportConfig, Scenario};
//! use deltat_core::forcing::{InMemorySource, RawForcing};
//! use deltat_core::report::AnomalyReport;
//! use ndarray::{array, Array3};
//!
//! let year = RawForcing {
//!     tas: Array3::from_elem((12, 2, 2), 1.0),
//!     latixy: array![[-45.0, -45.0], [45.0, 45.0]],
//!     longxy: array![[0.0, 180.0], [0.0, 180.0]],
//! };
//! let config = ReportConfig {
//!     scenarios: vec![Scenario::new("45", "af.tas.rcp45.nc")],
//!     ..Default::default()
//! };
//! let source = InMemorySource::new().with_scenario("45", year.tiled(3648));
//!
//! let table = AnomalyReport::new(&config, source).run().unwrap();
//! assert!((table.get(2300, "45").unwrap() - 1.0).abs() < 1e-12);
//! ```

pub mod calendar;
pub mod config;
pub mod errors;
pub mod forcing;
pub mod grid;
#[cfg(feature = "netcdf")]
pub mod netcdf;
pub mod report;
pub mod spatial;

/// Floating point type used for all field values and coordinates
pub type FloatValue = f64;
