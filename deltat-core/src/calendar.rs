//! Monthly calendar arithmetic and time averaging.
//!
//! Forcing files carry a strictly monthly time axis that starts in January of
//! a fixed base year. No calendar metadata is read from the files: a target
//! year maps onto an array offset purely by counting months from the base year.
//!
//! ```rust
//! use deltat_core::calendar::{month_offset, AveragingWindow, WindowAlignment};
//!
//! assert_eq!(month_offset(2006, 2100).unwrap(), 1128);
//!
//! let window = AveragingWindow::for_year(2006, 2300, 120, WindowAlignment::Leading).unwrap();
//! assert_eq!(window.start(), 3528);
//! assert_eq!(window.end(), 3648);
//! ```

use crate::errors::{DeltaTError, DeltaTResult};
use crate::FloatValue;
use ndarray::{s, Array2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};
use std::ops::Range;

pub const MONTHS_PER_YEAR: usize = 12;

/// Calendar year of the first time index in the forcing files.
pub const DEFAULT_BASE_YEAR: i32 = 2006;

/// Length of the averaging window (one decade of months).
pub const DEFAULT_WINDOW_MONTHS: usize = 120;

/// Index of January of `year` on a monthly axis starting in January of `base_year`.
pub fn month_offset(base_year: i32, year: i32) -> DeltaTResult<usize> {
    if year < base_year {
        return Err(DeltaTError::InvalidConfig(format!(
            "year {} precedes the base year {}",
            year, base_year
        )));
    }
    Ok((year - base_year) as usize * MONTHS_PER_YEAR)
}

/// Where an averaging window sits relative to its target year.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowAlignment {
    /// The window starts in January of the target year.
    #[default]
    Leading,
    /// The window ends in December of the year before the target year,
    /// e.g. 2090-2099 for 2100 with a ten year window.
    Trailing,
}

/// What to do when the time series stops before the end of a window.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortSeriesPolicy {
    /// Fail with [`DeltaTError::InsufficientData`].
    #[default]
    Error,
    /// Average whatever months fall inside the window.
    Truncate,
}

/// How much of a window a time series of a given length can supply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WindowCoverage {
    Complete(Range<usize>),
    Partial(Range<usize>),
    Empty,
}

/// A run of consecutive months on the forcing time axis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AveragingWindow {
    year: i32,
    start: usize,
    months: usize,
}

impl AveragingWindow {
    /// Build the window reported under `year`.
    ///
    /// # Errors
    ///
    /// * `InvalidConfig` if `months` is zero or the window would start before
    ///   the base year.
    pub fn for_year(
        base_year: i32,
        year: i32,
        months: usize,
        alignment: WindowAlignment,
    ) -> DeltaTResult<Self> {
        if months == 0 {
            return Err(DeltaTError::InvalidConfig(
                "averaging window must span at least one month".to_string(),
            ));
        }

        let start = match alignment {
            WindowAlignment::Leading => month_offset(base_year, year)?,
            WindowAlignment::Trailing => month_offset(base_year, year)?
                .checked_sub(months)
                .ok_or_else(|| {
                    DeltaTError::InvalidConfig(format!(
                        "a {} month window ending before {} starts before the base year {}",
                        months, year, base_year
                    ))
                })?,
        };

        Ok(Self {
            year,
            start,
            months,
        })
    }

    /// Year the window is reported under
    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn start(&self) -> usize {
        self.start
    }

    /// Exclusive end index
    pub fn end(&self) -> usize {
        self.start + self.months
    }

    pub fn months(&self) -> usize {
        self.months
    }

    /// Clip the window against a time axis of `available` months.
    pub fn coverage(&self, available: usize) -> WindowCoverage {
        if available >= self.end() {
            WindowCoverage::Complete(self.start..self.end())
        } else if available > self.start {
            WindowCoverage::Partial(self.start..available)
        } else {
            WindowCoverage::Empty
        }
    }
}

/// Mean over the leading (time) axis of `tas[months, .., ..]`.
///
/// Non-finite values are treated as missing and skipped cell by cell. A cell
/// that is missing for every month in the range comes out as NaN.
///
/// # Panics
///
/// Panics if `months` reaches past the end of the time axis; callers clip the
/// range with [`AveragingWindow::coverage`] first.
pub fn time_mean(tas: ArrayView3<FloatValue>, months: Range<usize>) -> Array2<FloatValue> {
    tas.slice(s![months, .., ..])
        .fold_axis(Axis(0), (0.0, 0usize), |&(sum, count), &v| {
            if v.is_finite() {
                (sum + v, count + 1)
            } else {
                (sum, count)
            }
        })
        .mapv(|(sum, count)| {
            if count > 0 {
                sum / count as FloatValue
            } else {
                FloatValue::NAN
            }
        })
}
