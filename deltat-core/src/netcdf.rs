//! NetCDF-backed forcing loader.

use crate::config::{Scenario, VariableNames};
use crate::errors::{DeltaTError, DeltaTResult};
use crate::forcing::{ForcingSource, RawForcing};
use crate::FloatValue;
use ndarray::{Array2, Array3};
use std::path::Path;
use tracing::debug;

/// Attributes whose value marks a missing cell
const FILL_ATTRIBUTES: [&str; 2] = ["_FillValue", "missing_value"];

/// Reads each scenario from the NetCDF file named by its `path`.
///
/// Values equal to the variable's `_FillValue` or `missing_value` attribute
/// become NaN so the averaging code treats them as missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetCdfSource;

impl ForcingSource for NetCdfSource {
    fn load(&self, scenario: &Scenario, names: &VariableNames) -> DeltaTResult<RawForcing> {
        let path = scenario.path.as_path();
        if !path.exists() {
            return Err(DeltaTError::DataAccess {
                path: path.to_path_buf(),
                details: "file not found".to_string(),
            });
        }

        // Closed when `file` drops at the end of this function
        let file = ::netcdf::open(path).map_err(|e| DeltaTError::DataAccess {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;

        let (tas_shape, tas) = read_variable(&file, path, &names.tas, 3)?;
        let (lat_shape, latixy) = read_variable(&file, path, &names.latitude, 2)?;
        let (lon_shape, longxy) = read_variable(&file, path, &names.longitude, 2)?;
        debug!(
            path = %path.display(),
            tas = ?tas_shape,
            latitude = ?lat_shape,
            longitude = ?lon_shape,
            "Read forcing variables"
        );

        Ok(RawForcing {
            tas: Array3::from_shape_vec((tas_shape[0], tas_shape[1], tas_shape[2]), tas)
                .map_err(|e| shape_error(&names.tas, e))?,
            latixy: Array2::from_shape_vec((lat_shape[0], lat_shape[1]), latixy)
                .map_err(|e| shape_error(&names.latitude, e))?,
            longxy: Array2::from_shape_vec((lon_shape[0], lon_shape[1]), longxy)
                .map_err(|e| shape_error(&names.longitude, e))?,
        })
    }
}

/// Read all values of `name` in row-major order, along with its dimension lengths.
fn read_variable(
    file: &::netcdf::File,
    path: &Path,
    name: &str,
    rank: usize,
) -> DeltaTResult<(Vec<usize>, Vec<FloatValue>)> {
    let variable = file.variable(name).ok_or_else(|| DeltaTError::Schema {
        variable: name.to_string(),
        details: format!("not present in {}", path.display()),
    })?;

    let shape: Vec<usize> = variable.dimensions().iter().map(|d| d.len()).collect();
    if shape.len() != rank {
        return Err(DeltaTError::Schema {
            variable: name.to_string(),
            details: format!("expected {} dimensions, found {:?}", rank, shape),
        });
    }

    let values = variable
        .get_values::<FloatValue, _>(..)
        .map_err(|e| DeltaTError::DataAccess {
            path: path.to_path_buf(),
            details: format!("reading '{}': {}", name, e),
        })?;

    let fill_values: Vec<FloatValue> = FILL_ATTRIBUTES
        .iter()
        .filter_map(|attribute| variable.attribute_value(attribute))
        .filter_map(|value| match value {
            Ok(::netcdf::AttributeValue::Double(v)) => Some(v),
            Ok(::netcdf::AttributeValue::Float(v)) => Some(v as FloatValue),
            _ => None,
        })
        .collect();

    Ok((shape, mask_fill_values(values, &fill_values)))
}

/// Replace every value equal to one of `fill_values` with NaN.
fn mask_fill_values(mut values: Vec<FloatValue>, fill_values: &[FloatValue]) -> Vec<FloatValue> {
    for v in values.iter_mut() {
        if fill_values.contains(v) {
            *v = FloatValue::NAN;
        }
    }
    values
}

fn shape_error(variable: &str, e: ndarray::ShapeError) -> DeltaTError {
    DeltaTError::Schema {
        variable: variable.to_string(),
        details: e.to_string(),
    }
}
