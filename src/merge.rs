//! Stream re-synchronization via alignment boundaries
//!
//! The street and timing streams drop malformed rows independently during
//! cleaning, so their row counts drift. Header rows survive cleaning as
//! boundary markers in both streams; slicing between consecutive boundaries
//! and re-joining the slices positionally lines the streams back up.

use crate::clean::{StreetCell, TimingRow};
use crate::ScheduleError;
use chrono::NaiveDate;

/// One recovered schedule row. Terminal output, read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleRecord {
    pub date: NaiveDate,
    pub street: String,
    pub on: String,
    pub off: String,
    pub duration: String,
}

fn boundary_positions<T>(rows: &[T], is_boundary: impl Fn(&T) -> bool) -> Vec<usize> {
    let mut positions: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| is_boundary(row))
        .map(|(idx, _)| idx)
        .collect();
    // Synthetic boundary at end-of-stream closes the last window.
    positions.push(rows.len());
    positions
}

/// Merge the three streams into the final record set.
///
/// Boundary positions must agree in count between the street and timing
/// streams, and each window must hold the same number of data rows in both;
/// either mismatch breaks the positional join and is reported instead of
/// silently misaligning. The reconstructed date column is prepended last
/// and must cover every merged row.
pub fn merge_streams(
    dates: &[NaiveDate],
    streets: &[StreetCell],
    timings: &[TimingRow],
) -> Result<Vec<ScheduleRecord>, ScheduleError> {
    let street_bounds = boundary_positions(streets, |c| matches!(c, StreetCell::Boundary));
    let timing_bounds = boundary_positions(timings, |r| matches!(r, TimingRow::Boundary));

    if street_bounds.len() != timing_bounds.len() {
        return Err(ScheduleError::Misaligned(format!(
            "{} street boundaries vs {} timing boundaries",
            street_bounds.len() - 1,
            timing_bounds.len() - 1
        )));
    }

    let mut merged_streets: Vec<&str> = Vec::new();
    let mut merged_timings: Vec<(&str, &str, &str)> = Vec::new();

    for window in 0..street_bounds.len() - 1 {
        let street_slice = &streets[street_bounds[window] + 1..street_bounds[window + 1]];
        let timing_slice = &timings[timing_bounds[window] + 1..timing_bounds[window + 1]];

        if street_slice.len() != timing_slice.len() {
            return Err(ScheduleError::Misaligned(format!(
                "window {}: {} street rows vs {} timing rows",
                window,
                street_slice.len(),
                timing_slice.len()
            )));
        }

        for cell in street_slice {
            if let StreetCell::Street(s) = cell {
                merged_streets.push(s);
            }
        }
        for row in timing_slice {
            if let TimingRow::Entry { on, off, duration } = row {
                merged_timings.push((on, off, duration));
            }
        }
    }

    if dates.len() != merged_streets.len() {
        return Err(ScheduleError::Misaligned(format!(
            "date column has {} rows, merged body has {}",
            dates.len(),
            merged_streets.len()
        )));
    }

    let records = dates
        .iter()
        .zip(merged_streets)
        .zip(merged_timings)
        .map(|((date, street), (on, off, duration))| ScheduleRecord {
            date: *date,
            street: street.to_string(),
            on: on.to_string(),
            off: off.to_string(),
            duration: duration.to_string(),
        })
        .collect();

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, d).unwrap()
    }

    fn street(s: &str) -> StreetCell {
        StreetCell::Street(s.to_string())
    }

    fn entry(on: &str, off: &str, duration: &str) -> TimingRow {
        TimingRow::Entry {
            on: on.to_string(),
            off: off.to_string(),
            duration: duration.to_string(),
        }
    }

    #[test]
    fn test_merge_interleaves_windows() {
        // Two sections; each stream lost different rows outside the
        // boundaries, but the intra-window counts agree.
        let streets = vec![
            StreetCell::Boundary,
            street("1"),
            street("2"),
            StreetCell::Boundary,
            street("8"),
        ];
        let timings = vec![
            TimingRow::Boundary,
            entry("06:30", "14:30", "8"),
            entry("06:30", "14:30", "8"),
            TimingRow::Boundary,
            entry("14:30", "22:30", "8"),
        ];
        let dates = vec![date(1), date(1), date(2)];

        let records = merge_streams(&dates, &streets, &timings).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].street, "1");
        assert_eq!(records[2].street, "8");
        assert_eq!(records[2].date, date(2));
        assert_eq!(records[2].on, "14:30");
    }

    #[test]
    fn test_merge_window_length_mismatch() {
        let streets = vec![StreetCell::Boundary, street("1"), street("2")];
        let timings = vec![TimingRow::Boundary, entry("06:30", "14:30", "8")];
        let dates = vec![date(1), date(1)];

        let err = merge_streams(&dates, &streets, &timings).unwrap_err();
        assert!(matches!(err, ScheduleError::Misaligned(_)));
    }

    #[test]
    fn test_merge_boundary_count_mismatch() {
        let streets = vec![StreetCell::Boundary, street("1")];
        let timings = vec![
            TimingRow::Boundary,
            entry("06:30", "14:30", "8"),
            TimingRow::Boundary,
        ];
        let dates = vec![date(1)];

        let err = merge_streams(&dates, &streets, &timings).unwrap_err();
        assert!(matches!(err, ScheduleError::Misaligned(_)));
    }

    #[test]
    fn test_merge_date_column_mismatch() {
        let streets = vec![StreetCell::Boundary, street("1")];
        let timings = vec![TimingRow::Boundary, entry("06:30", "14:30", "8")];
        let dates = vec![date(1), date(2)];

        let err = merge_streams(&dates, &streets, &timings).unwrap_err();
        assert!(matches!(err, ScheduleError::Misaligned(_)));
    }
}
