//! Rectilinear latitude/longitude grids.
//!
//! Forcing files store coordinates as two 2-D fields (`LATIXY`, `LONGXY`) with
//! one value per grid cell. Area averaging only needs one latitude per row and
//! one longitude per column, so the grid is collapsed to the first column of
//! the latitude field and the first row of the longitude field.
//!
//! That reduction is only valid for a rectilinear mesh, where every row shares
//! a latitude and every column shares a longitude. [`GridValidation`] controls
//! whether that precondition is checked.

use crate::errors::{DeltaTError, DeltaTResult};
use crate::FloatValue;
use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// How strictly to check that coordinate fields describe a rectilinear grid.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridCheckMode {
    /// Irregular coordinates are an error.
    #[default]
    Strict,
    /// Irregular coordinates are logged and the first column/row is used anyway.
    Warn,
    /// Trust the first column/row without looking at the rest.
    Off,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridValidation {
    pub mode: GridCheckMode,

    /// Largest accepted deviation from the shared row/column coordinate (degrees).
    /// Default: 1e-4
    pub tolerance: FloatValue,
}

impl Default for GridValidation {
    fn default() -> Self {
        Self {
            mode: GridCheckMode::Strict,
            tolerance: 1e-4,
        }
    }
}

/// Cell-centre coordinates of a rectilinear grid, in degrees.
#[derive(Clone, Debug, PartialEq)]
pub struct LatLonGrid {
    lats: Array1<FloatValue>,
    lons: Array1<FloatValue>,
}

impl LatLonGrid {
    /// Create a grid from one latitude per row and one longitude per column.
    ///
    /// # Errors
    ///
    /// * `Schema` if either axis is empty, or a latitude is not a finite value in [-90, 90]
    pub fn new(lats: Array1<FloatValue>, lons: Array1<FloatValue>) -> DeltaTResult<Self> {
        if lats.is_empty() || lons.is_empty() {
            return Err(DeltaTError::Schema {
                variable: "grid".to_string(),
                details: format!(
                    "grid needs at least one row and column, got {}x{}",
                    lats.len(),
                    lons.len()
                ),
            });
        }
        if let Some(bad) = lats
            .iter()
            .find(|lat| !lat.is_finite() || lat.abs() > 90.0)
        {
            return Err(DeltaTError::Schema {
                variable: "latitude".to_string(),
                details: format!("latitude {} is outside [-90, 90]", bad),
            });
        }
        Ok(Self { lats, lons })
    }

    /// Collapse 2-D coordinate fields into a rectilinear grid.
    ///
    /// Latitudes come from the first column of `latitudes`, longitudes from the
    /// first row of `longitudes`.
    ///
    /// # Errors
    ///
    /// * `Schema` if the two fields differ in shape
    /// * `GridIrregularity` if `validation.mode` is `Strict` and a row or column
    ///   strays further than `validation.tolerance` from the shared coordinate
    pub fn from_coordinate_fields(
        latitudes: ArrayView2<FloatValue>,
        longitudes: ArrayView2<FloatValue>,
        validation: &GridValidation,
    ) -> DeltaTResult<Self> {
        if latitudes.shape() != longitudes.shape() {
            return Err(DeltaTError::Schema {
                variable: "longitude".to_string(),
                details: format!(
                    "coordinate fields differ in shape: latitude {:?}, longitude {:?}",
                    latitudes.shape(),
                    longitudes.shape()
                ),
            });
        }
        if latitudes.is_empty() {
            return Err(DeltaTError::Schema {
                variable: "latitude".to_string(),
                details: "coordinate fields are empty".to_string(),
            });
        }

        let lats = latitudes.column(0).to_owned();
        let lons = longitudes.row(0).to_owned();

        if validation.mode != GridCheckMode::Off {
            let irregularities = [
                row_irregularity("latitude", latitudes, validation.tolerance),
                column_irregularity("longitude", longitudes, validation.tolerance),
            ];
            for irregularity in irregularities.into_iter().flatten() {
                match validation.mode {
                    GridCheckMode::Strict => return Err(irregularity),
                    _ => warn!(
                        error = %irregularity,
                        "Coordinate grid is not rectilinear; using first column/row anyway"
                    ),
                }
            }
        }

        Self::new(lats, lons)
    }

    pub fn lats(&self) -> &Array1<FloatValue> {
        &self.lats
    }

    pub fn lons(&self) -> &Array1<FloatValue> {
        &self.lons
    }

    /// `(rows, columns)`, matching the spatial dimensions of a field on this grid
    pub fn shape(&self) -> (usize, usize) {
        (self.lats.len(), self.lons.len())
    }
}

/// Worst row of `field` whose values are not all equal to its first column.
fn row_irregularity(
    axis: &str,
    field: ArrayView2<FloatValue>,
    tolerance: FloatValue,
) -> Option<DeltaTError> {
    field
        .rows()
        .into_iter()
        .enumerate()
        .map(|(i, row)| {
            let deviation = row.iter().map(|v| (v - row[0]).abs()).fold(0.0, FloatValue::max);
            (i, deviation)
        })
        .filter(|(_, deviation)| *deviation > tolerance)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, deviation)| DeltaTError::GridIrregularity {
            axis: axis.to_string(),
            index,
            deviation,
        })
}

/// Worst column of `field` whose values are not all equal to its first row.
fn column_irregularity(
    axis: &str,
    field: ArrayView2<FloatValue>,
    tolerance: FloatValue,
) -> Option<DeltaTError> {
    row_irregularity(axis, field.t(), tolerance)
}
