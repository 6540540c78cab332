//! Area-weighted spatial averaging of gridded fields
//!
//! Grid cells on a latitude/longitude mesh shrink towards the poles, so a plain
//! mean over cells over-counts high latitudes. This module provides the
//! [`AreaAverager`] trait and implementations for common weighting schemes:
//!
//! - [`CosineLatitude`]: weight by the cosine of the cell-centre latitude
//! - [`CellArea`]: weight by the exact spherical area of each cell
//! - [`Uniform`]: every cell counts the same
//!
//! Cells holding a non-finite value are treated as missing and dropped from
//! both the numerator and the weights.
//!
//! # Examples
//!
//! ```rust
//! use deltat_core::grid::LatLonGrid;
//! use deltat_core::spatial::{AreaAverager, CosineLatitude};
//! use ndarray::array;
//!
//! let grid = LatLonGrid::new(array![0.0, 60.0], array![0.0, 180.0]).unwrap();
//! let field = array![[1.0, 1.0], [4.0, 4.0]];
//!
//! // cos(0) = 1, cos(60) = 0.5: (1 * 1 + 4 * 0.5) / 1.5 = 2
//! let mean = CosineLatitude.area_average(field.view(), &grid).unwrap();
//! assert!((mean - 2.0).abs() < 1e-12);
//! ```

use crate::errors::{DeltaTError, DeltaTResult};
use crate::grid::LatLonGrid;
use crate::FloatValue;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Zip};
use serde::{Deserialize, Serialize};

/// A scheme for collapsing a 2-D field into a single global mean.
///
/// Implementations only decide how much each cell counts; masking of missing
/// cells and normalisation are shared through [`area_average`](Self::area_average).
pub trait AreaAverager: std::fmt::Debug + Send + Sync {
    /// Unique name for this weighting scheme
    ///
    /// Used for logging and error messages
    fn name(&self) -> &'static str;

    /// Relative weight of every cell of `grid`, shaped `(rows, columns)`.
    ///
    /// Weights need not be normalised.
    fn cell_weights(&self, grid: &LatLonGrid) -> Array2<FloatValue>;

    /// Weighted mean of `field` over all cells with a finite value.
    ///
    /// # Errors
    ///
    /// * `Schema` if `field` does not have the shape of `grid`
    /// * `NoValidCells` if no cell with a positive weight holds a finite value
    fn area_average(
        &self,
        field: ArrayView2<FloatValue>,
        grid: &LatLonGrid,
    ) -> DeltaTResult<FloatValue> {
        let (rows, columns) = grid.shape();
        if field.dim() != (rows, columns) {
            return Err(DeltaTError::Schema {
                variable: "field".to_string(),
                details: format!(
                    "field has shape {:?} but the grid is {}x{}",
                    field.shape(),
                    rows,
                    columns
                ),
            });
        }

        let weights = self.cell_weights(grid);
        let (weighted_sum, total_weight) = Zip::from(field).and(&weights).fold(
            (0.0, 0.0),
            |(sum, total), &value, &weight| {
                if value.is_finite() {
                    (sum + value * weight, total + weight)
                } else {
                    (sum, total)
                }
            },
        );

        if total_weight <= 0.0 {
            return Err(DeltaTError::NoValidCells {
                context: format!("{} average over a {}x{} grid", self.name(), rows, columns),
            });
        }
        Ok(weighted_sum / total_weight)
    }
}

/// Cosine-of-latitude weighting
///
/// The standard approximation for cell area on a regular latitude/longitude
/// mesh. Longitude spacing is assumed uniform.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CosineLatitude;

impl AreaAverager for CosineLatitude {
    fn name(&self) -> &'static str {
        "CosineLatitude"
    }

    fn cell_weights(&self, grid: &LatLonGrid) -> Array2<FloatValue> {
        let row_weights = grid.lats().mapv(|lat| lat.to_radians().cos().max(0.0));
        broadcast_rows(row_weights.view(), grid.lons().len())
    }
}

/// Exact spherical cell areas
///
/// Cell edges are placed halfway between neighbouring centres, with the outer
/// edges mirrored about the first and last centre and latitude edges clamped
/// to the poles. Longitude spacing is taken modulo 360 degrees, so a row that
/// crosses the 0/360 seam keeps its true widths. The area of a cell on the unit sphere is then
///
/// $$A_{ij} = (\sin \phi_{i+1/2} - \sin \phi_{i-1/2}) \, \Delta\lambda_j$$
///
/// Unlike [`CosineLatitude`] this stays correct for irregular spacing in
/// either direction.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CellArea;

impl AreaAverager for CellArea {
    fn name(&self) -> &'static str {
        "CellArea"
    }

    fn cell_weights(&self, grid: &LatLonGrid) -> Array2<FloatValue> {
        let lat_edges = cell_edges(grid.lats().view()).mapv(|e| e.clamp(-90.0, 90.0));

        let bands: Array1<FloatValue> = lat_edges
            .windows(2)
            .into_iter()
            .map(|edge| (edge[1].to_radians().sin() - edge[0].to_radians().sin()).abs())
            .collect();
        let widths = longitude_widths(grid.lons().view()).mapv(|w| w.to_radians());

        Array2::from_shape_fn(grid.shape(), |(i, j)| bands[i] * widths[j])
    }
}

/// Unweighted arithmetic mean over cells
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Uniform;

impl AreaAverager for Uniform {
    fn name(&self) -> &'static str {
        "Uniform"
    }

    fn cell_weights(&self, grid: &LatLonGrid) -> Array2<FloatValue> {
        Array2::ones(grid.shape())
    }
}

/// Weighting scheme selectable from configuration
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaWeighting {
    #[default]
    CosineLatitude,
    CellArea,
    Uniform,
}

impl AreaWeighting {
    pub fn averager(&self) -> Box<dyn AreaAverager> {
        match self {
            AreaWeighting::CosineLatitude => Box::new(CosineLatitude),
            AreaWeighting::CellArea => Box::new(CellArea),
            AreaWeighting::Uniform => Box::new(Uniform),
        }
    }
}

/// Cosine-latitude weighted global mean of `field` given its cell-centre coordinates.
pub fn area_average(
    field: ArrayView2<FloatValue>,
    lats: ArrayView1<FloatValue>,
    lons: ArrayView1<FloatValue>,
) -> DeltaTResult<FloatValue> {
    let grid = LatLonGrid::new(lats.to_owned(), lons.to_owned())?;
    CosineLatitude.area_average(field, &grid)
}

fn broadcast_rows(row_weights: ArrayView1<FloatValue>, columns: usize) -> Array2<FloatValue> {
    Array2::from_shape_fn((row_weights.len(), columns), |(i, _)| row_weights[i])
}

/// Signed longitude difference `to - from`, wrapped into `[-180, 180)`.
fn wrapped_spacing(from: FloatValue, to: FloatValue) -> FloatValue {
    (to - from + 540.0).rem_euclid(360.0) - 180.0
}

/// Width in degrees of each longitude cell: half the spacing to each neighbour.
fn longitude_widths(centres: ArrayView1<FloatValue>) -> Array1<FloatValue> {
    let n = centres.len();
    if n == 1 {
        return Array1::from_elem(1, 360.0);
    }
    let spacing: Vec<FloatValue> = centres
        .windows(2)
        .into_iter()
        .map(|pair| wrapped_spacing(pair[0], pair[1]).abs())
        .collect();
    Array1::from_shape_fn(n, |j| {
        let left = if j == 0 { spacing[0] } else { spacing[j - 1] };
        let right = if j == n - 1 { spacing[n - 2] } else { spacing[j] };
        0.5 * (left + right)
    })
}

/// `n + 1` edges around `n` cell centres.
fn cell_edges(centres: ArrayView1<FloatValue>) -> Array1<FloatValue> {
    let n = centres.len();
    if n == 1 {
        // No spacing to infer from: the single cell spans the whole axis
        let c = centres[0];
        return Array1::from(vec![c - 180.0, c + 180.0]);
    }
    let mut edges = Array1::zeros(n + 1);
    for i in 1..n {
        edges[i] = 0.5 * (centres[i - 1] + centres[i]);
    }
    edges[0] = centres[0] - (edges[1] - centres[0]);
    edges[n] = centres[n - 1] + (centres[n - 1] - edges[n - 1]);
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn global_grid(rows: usize, columns: usize) -> LatLonGrid {
        let dlat = 180.0 / rows as f64;
        let dlon = 360.0 / columns as f64;
        LatLonGrid::new(
            Array1::from_shape_fn(rows, |i| -90.0 + dlat * (i as f64 + 0.5)),
            Array1::from_shape_fn(columns, |j| dlon * (j as f64 + 0.5)),
        )
        .unwrap()
    }

    fn all_schemes() -> Vec<Box<dyn AreaAverager>> {
        vec![
            Box::new(CosineLatitude) as Box<dyn AreaAverager>,
            Box::new(CellArea),
            Box::new(Uniform),
        ]
    }

    #[test]
    fn test_constant_field_is_invariant() {
        let grid = global_grid(18, 36);
        let field = Array2::from_elem(grid.shape(), 1.75);
        for scheme in all_schemes() {
            let mean = scheme.area_average(field.view(), &grid).unwrap();
            assert!(
                (mean - 1.75).abs() < 1e-12,
                "{} gave {} for a constant field",
                scheme.name(),
                mean
            );
        }
    }

    #[test]
    fn test_cosine_weighting_matches_hand_computed_mean() {
        // Warming grows linearly with distance from the equator
        let grid = global_grid(6, 4);
        let field = Array2::from_shape_fn(grid.shape(), |(i, _)| grid.lats()[i].abs() / 10.0);

        let weights: Vec<f64> = grid.lats().iter().map(|l| l.to_radians().cos()).collect();
        let expected = grid
            .lats()
            .iter()
            .zip(&weights)
            .map(|(l, w)| l.abs() / 10.0 * w)
            .sum::<f64>()
            / weights.iter().sum::<f64>();

        let mean = CosineLatitude.area_average(field.view(), &grid).unwrap();
        assert!(((mean - expected) / expected).abs() < 1e-6);
        // Polar cells are down-weighted relative to a plain mean
        let plain = Uniform.area_average(field.view(), &grid).unwrap();
        assert!(mean < plain);
    }

    #[test]
    fn test_cell_area_weights_sum_to_sphere() {
        let grid = global_grid(12, 24);
        let total: f64 = CellArea.cell_weights(&grid).sum();
        assert!((total - 4.0 * std::f64::consts::PI).abs() < 1e-9);
    }

    #[test]
    fn test_cell_area_hemispheres() {
        let grid = LatLonGrid::new(array![-45.0, 45.0], array![90.0, 270.0]).unwrap();
        let weights = CellArea.cell_weights(&grid);
        // Each hemisphere band covers sin(90) - sin(0) = 1, each column pi radians
        for w in weights.iter() {
            assert!((w - std::f64::consts::PI).abs() < 1e-12);
        }
    }

    #[test]
    fn test_cell_area_across_longitude_seam() {
        let grid = LatLonGrid::new(
            array![0.0],
            array![180.0, 225.0, 270.0, 315.0, 0.0, 45.0, 90.0, 135.0],
        )
        .unwrap();
        let weights = CellArea.cell_weights(&grid);
        let first = weights[[0, 0]];
        for w in weights.iter() {
            assert!((w - first).abs() < 1e-12);
        }

        let mut field = Array2::zeros(grid.shape());
        field[[0, 4]] = 8.0;
        let mean = CellArea.area_average(field.view(), &grid).unwrap();
        assert!((mean - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cell_area_uneven_longitude_spacing() {
        // Widths 10, 15 and 20 degrees
        let grid = LatLonGrid::new(array![0.0], array![0.0, 10.0, 30.0]).unwrap();
        let field = array![[1.0, 0.0, 0.0]];
        let mean = CellArea.area_average(field.view(), &grid).unwrap();
        assert!((mean - 10.0 / 45.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_cells_are_masked() {
        let grid = LatLonGrid::new(array![0.0, 60.0], array![0.0, 180.0]).unwrap();
        let field = array![[1.0, f64::NAN], [4.0, 4.0]];

        // (1 * 1 + 4 * 0.5 + 4 * 0.5) / 2
        let mean = CosineLatitude.area_average(field.view(), &grid).unwrap();
        assert!((mean - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_all_missing_is_an_error() {
        let grid = global_grid(2, 2);
        let field = Array2::from_elem((2, 2), f64::NAN);
        let result = Uniform.area_average(field.view(), &grid);
        assert!(matches!(result, Err(DeltaTError::NoValidCells { .. })));
    }

    #[test]
    fn test_field_must_match_grid() {
        let grid = global_grid(2, 3);
        let field = Array2::zeros((3, 2));
        let result = CosineLatitude.area_average(field.view(), &grid);
        assert!(matches!(result, Err(DeltaTError::Schema { .. })));
    }

    #[test]
    fn test_free_function_uses_cosine_weights() {
        let field = array![[1.0, 1.0], [4.0, 4.0]];
        let mean = area_average(field.view(), array![0.0, 60.0].view(), array![0.0, 180.0].view())
            .unwrap();
        assert!((mean - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_weighting_from_config_name() {
        let weighting: AreaWeighting = serde_json::from_str("\"cell_area\"").unwrap();
        assert_eq!(weighting, AreaWeighting::CellArea);
        assert_eq!(weighting.averager().name(), "CellArea");
        assert_eq!(AreaWeighting::default().averager().name(), "CosineLatitude");
    }
}
