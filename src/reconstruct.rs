//! Temporal reconstruction
//!
//! Three passes between cleaning and the merge: back-filling unresolved date
//! markers from the nearest later anchor, 12-hour to 24-hour time
//! conversion, and regenerating the full per-row date column from street
//! scheduling-group parity.

use crate::clean::{DateCell, StreetCell, TimingRow};
use crate::{Field, ScheduleError, GROUP_ONE_LEN, STREETS};
use chrono::{Duration, NaiveDate, NaiveTime};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

static TIME_12H_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,2}:\d{2};[AP]M$").unwrap());

/// Resolve the schedule's first date, back-filling unresolved markers along
/// the way.
///
/// Each unresolved row takes the nearest following resolved date minus one
/// day per row of distance. The final row is exempt, as it has no later
/// anchor and nothing downstream needs it. A non-final marker with no anchor
/// at all cannot be reconstructed and is surfaced as an error.
pub fn resolve_first_date(dates: &mut [DateCell]) -> Result<NaiveDate, ScheduleError> {
    if dates.is_empty() {
        return Err(ScheduleError::EmptyStream(Field::Date));
    }

    if let Some(DateCell::Resolved(first)) = dates.first() {
        debug!("Date - first date is not a marker - {}", first);
        return Ok(*first);
    }

    let last = dates.len() - 1;
    let mut anchor: Option<(usize, NaiveDate)> = None;

    for idx in (0..dates.len()).rev() {
        match dates[idx] {
            DateCell::Resolved(date) => anchor = Some((idx, date)),
            DateCell::Unresolved => {
                if idx == last {
                    continue;
                }
                match anchor {
                    Some((anchor_idx, anchor_date)) => {
                        let corrected = anchor_date - Duration::days((anchor_idx - idx) as i64);
                        dates[idx] = DateCell::Resolved(corrected);
                    }
                    None => return Err(ScheduleError::UnresolvedDate { row: idx }),
                }
            }
        }
    }

    match dates.first() {
        Some(DateCell::Resolved(first)) => {
            debug!("Date - first date after substituting markers - {}", first);
            Ok(*first)
        }
        _ => Err(ScheduleError::UnresolvedDate { row: 0 }),
    }
}

/// Convert a `H:MM;AM|PM` value to 24-hour `HH:MM`. Anything else (a
/// boundary label or a bare duration) passes through unchanged.
pub fn convert_to_24_hours(value: &str) -> String {
    if TIME_12H_RE.is_match(value) {
        if let Ok(time) = NaiveTime::parse_from_str(value, "%I:%M;%p") {
            return time.format("%H:%M").to_string();
        }
    }
    value.to_string()
}

/// Apply 24-hour conversion to the on/off cells of every timing entry.
pub fn convert_timings(rows: &mut [TimingRow]) {
    for row in rows {
        if let TimingRow::Entry { on, off, .. } = row {
            *on = convert_to_24_hours(on);
            *off = convert_to_24_hours(off);
        }
    }
}

/// Which scheduling group a catalog street belongs to.
fn is_group_one(street: &str) -> Option<bool> {
    STREETS
        .iter()
        .position(|s| *s == street)
        .map(|idx| idx < GROUP_ONE_LEN)
}

/// Regenerate the per-row date column from street group parity.
///
/// The date advances by one day on each transition to the opposite group
/// from the last increment; no date values are read from the street stream
/// itself. Boundary rows contribute nothing, so the output length equals
/// the number of data rows.
pub fn generate_dates(streets: &[StreetCell], start: NaiveDate) -> Vec<NaiveDate> {
    let mut date = start;
    let mut incremented_for_group_two = false;
    let mut out = Vec::new();

    for cell in streets {
        let street = match cell {
            StreetCell::Street(s) => s,
            StreetCell::Boundary => continue,
        };
        match is_group_one(street) {
            Some(true) => {
                if incremented_for_group_two {
                    date += Duration::days(1);
                    incremented_for_group_two = false;
                }
                out.push(date);
            }
            Some(false) => {
                if !incremented_for_group_two {
                    date += Duration::days(1);
                    incremented_for_group_two = true;
                }
                out.push(date);
            }
            None => {}
        }
    }

    out
}
