//! Sample scheduling.
//!
//! [`compute_targets`] turns a stream duration and a [`LayoutSpec`] into the
//! ordered list of timestamps a sheet samples. The result depends only on its
//! inputs: the same metadata and layout always produce the same schedule.

use crate::{
    configuration::{DEFAULT_AUTO_ROWS, LayoutSpec},
    error::SheetError,
    metadata::MediaInfo,
};

/// One timestamp to sample.
///
/// `index` is both the position in the schedule and the row-major grid cell
/// the sample is meant for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleTarget {
    /// Zero-based position in the schedule.
    pub index: usize,
    /// Requested timestamp in seconds.
    pub timestamp: f64,
}

impl SampleTarget {
    /// Grid cell `(row, column)` of this target for a grid `columns` wide.
    pub fn cell(&self, columns: u32) -> (u32, u32) {
        let columns = columns.max(1) as usize;
        ((self.index / columns) as u32, (self.index % columns) as u32)
    }
}

/// A computed schedule together with the grid it was resolved against.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    /// Targets in strictly increasing timestamp order.
    pub targets: Vec<SampleTarget>,
    /// Number of grid columns.
    pub columns: u32,
    /// Number of grid rows after auto-resolution.
    pub rows: u32,
    /// `true` when `rows` was derived rather than given by the caller.
    pub auto_rows: bool,
    /// Seconds between consecutive targets.
    pub step: f64,
    /// Effective start of the sampled window, in seconds.
    pub start: f64,
    /// Effective end of the sampled window, in seconds.
    pub end: f64,
}

impl Schedule {
    /// Number of scheduled targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// `true` if nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Grid capacity (`columns * rows`).
    pub fn capacity(&self) -> usize {
        self.columns as usize * self.rows as usize
    }
}

/// Effective `(start, end)` of the sampled window.
///
/// # Errors
///
/// Returns [`SheetError::InvalidRange`] when trims and cut leave nothing to
/// sample.
pub fn sampling_window(info: &MediaInfo, spec: &LayoutSpec) -> Result<(f64, f64), SheetError> {
    let start = spec.begin.max(0.0);
    let mut end = info.duration - spec.end.max(0.0);
    if spec.cut > 0.0 {
        end = end.min(start + spec.cut);
    }

    if end <= start {
        return Err(SheetError::InvalidRange { start, end });
    }
    Ok((start, end))
}

/// Compute the ordered sample targets for one sheet.
///
/// With a positive `step`, targets are `start, start + step, ...` while they
/// stay before the window end, and `rows == 0` is back-filled as
/// `ceil(count / columns)`. An explicit row count truncates the schedule to
/// the grid capacity.
///
/// With `step <= 0`, the window is split into `columns * rows` equal
/// sub-intervals (rows defaulting to [`DEFAULT_AUTO_ROWS`]) and each target
/// sits at the midpoint of its sub-interval.
///
/// # Errors
///
/// - [`SheetError::InvalidLayout`] if `columns` is 0.
/// - [`SheetError::InvalidRange`] if the trimmed window is empty.
///
/// # Example
///
/// ```
/// use thumbsheet::{LayoutSpec, MediaInfo, compute_targets};
///
/// let info = MediaInfo::new(120.0, 1280, 720);
/// let schedule = compute_targets(&info, &LayoutSpec::new(3, 2)).unwrap();
/// let stamps: Vec<f64> = schedule.targets.iter().map(|t| t.timestamp).collect();
/// assert_eq!(stamps, vec![10.0, 30.0, 50.0, 70.0, 90.0, 110.0]);
/// ```
pub fn compute_targets(info: &MediaInfo, spec: &LayoutSpec) -> Result<Schedule, SheetError> {
    if spec.columns == 0 {
        return Err(SheetError::InvalidLayout(
            "at least one column is required".to_string(),
        ));
    }

    let (start, end) = sampling_window(info, spec)?;
    let columns = spec.columns;

    let schedule = if spec.step > 0.0 {
        let step = spec.step;
        let mut timestamps = Vec::new();
        let mut index = 0usize;
        loop {
            let timestamp = start + step * index as f64;
            if timestamp >= end {
                break;
            }
            timestamps.push(timestamp);
            index += 1;
        }

        let (rows, auto_rows) = if spec.rows == 0 {
            (timestamps.len().div_ceil(columns as usize) as u32, true)
        } else {
            timestamps.truncate(columns as usize * spec.rows as usize);
            (spec.rows, false)
        };

        Schedule {
            targets: into_targets(timestamps),
            columns,
            rows,
            auto_rows,
            step,
            start,
            end,
        }
    } else {
        let (rows, auto_rows) = if spec.rows == 0 {
            (DEFAULT_AUTO_ROWS, true)
        } else {
            (spec.rows, false)
        };
        let count = columns as usize * rows as usize;
        let step = (end - start) / count as f64;
        let timestamps = (0..count)
            .map(|index| start + step * (index as f64 + 0.5))
            .collect();

        Schedule {
            targets: into_targets(timestamps),
            columns,
            rows,
            auto_rows,
            step,
            start,
            end,
        }
    };

    log::debug!(
        "Scheduled {} samples over {:.3}s..{:.3}s (step {:.3}s, grid {}x{})",
        schedule.len(),
        schedule.start,
        schedule.end,
        schedule.step,
        schedule.columns,
        schedule.rows,
    );

    Ok(schedule)
}

fn into_targets(timestamps: Vec<f64>) -> Vec<SampleTarget> {
    timestamps
        .into_iter()
        .enumerate()
        .map(|(index, timestamp)| SampleTarget { index, timestamp })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(duration: f64) -> MediaInfo {
        MediaInfo::new(duration, 640, 360)
    }

    #[test]
    fn auto_mode_uses_midpoints() {
        let schedule = compute_targets(&info(120.0), &LayoutSpec::new(3, 2)).unwrap();
        let stamps: Vec<f64> = schedule.targets.iter().map(|t| t.timestamp).collect();
        assert_eq!(stamps, vec![10.0, 30.0, 50.0, 70.0, 90.0, 110.0]);
        assert_eq!(schedule.step, 20.0);
        assert!(!schedule.auto_rows);
    }

    #[test]
    fn auto_mode_defaults_rows() {
        let schedule = compute_targets(&info(60.0), &LayoutSpec::new(3, 0)).unwrap();
        assert_eq!(schedule.rows, DEFAULT_AUTO_ROWS);
        assert_eq!(schedule.len(), 3 * DEFAULT_AUTO_ROWS as usize);
        assert!(schedule.auto_rows);
    }

    #[test]
    fn auto_mode_targets_lie_inside_sub_intervals() {
        let spec = LayoutSpec::new(4, 3).with_begin(5.0).with_end(7.0);
        let schedule = compute_targets(&info(100.0), &spec).unwrap();
        assert_eq!(schedule.len(), 12);
        for target in &schedule.targets {
            let lower = schedule.start + schedule.step * target.index as f64;
            let upper = lower + schedule.step;
            assert!(target.timestamp > lower && target.timestamp < upper);
        }
    }

    #[test]
    fn step_mode_counts_with_ceiling() {
        let spec = LayoutSpec::new(4, 0).with_step(15.0);
        let schedule = compute_targets(&info(100.0), &spec).unwrap();
        // ceil(100 / 15) = 7
        assert_eq!(schedule.len(), 7);
        assert_eq!(schedule.rows, 2);
        assert!(schedule.auto_rows);
        assert!(
            schedule
                .targets
                .windows(2)
                .all(|pair| pair[0].timestamp < pair[1].timestamp)
        );
        assert_eq!(schedule.targets[6].timestamp, 90.0);
    }

    #[test]
    fn step_mode_with_explicit_rows_respects_capacity() {
        let spec = LayoutSpec::new(2, 2).with_step(10.0);
        let schedule = compute_targets(&info(100.0), &spec).unwrap();
        assert_eq!(schedule.len(), 4);
        assert_eq!(schedule.capacity(), 4);
    }

    #[test]
    fn cut_truncates_window() {
        let spec = LayoutSpec::new(2, 0).with_step(10.0).with_begin(20.0).with_cut(30.0);
        let schedule = compute_targets(&info(600.0), &spec).unwrap();
        assert_eq!(schedule.start, 20.0);
        assert_eq!(schedule.end, 50.0);
        let stamps: Vec<f64> = schedule.targets.iter().map(|t| t.timestamp).collect();
        assert_eq!(stamps, vec![20.0, 30.0, 40.0]);
    }

    #[test]
    fn empty_window_is_invalid_range() {
        let spec = LayoutSpec::new(3, 2).with_begin(8.0).with_end(3.0);
        let error = compute_targets(&info(10.0), &spec).unwrap_err();
        assert!(matches!(error, SheetError::InvalidRange { .. }));
    }

    #[test]
    fn zero_columns_is_invalid_layout() {
        let error = compute_targets(&info(10.0), &LayoutSpec::new(0, 2)).unwrap_err();
        assert!(matches!(error, SheetError::InvalidLayout(_)));
    }

    #[test]
    fn schedule_is_deterministic() {
        let spec = LayoutSpec::new(5, 0).with_step(7.5).with_begin(1.25);
        let first = compute_targets(&info(333.3), &spec).unwrap();
        let second = compute_targets(&info(333.3), &spec).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn cells_are_row_major() {
        let target = SampleTarget {
            index: 5,
            timestamp: 0.0,
        };
        assert_eq!(target.cell(3), (1, 2));
    }
}
