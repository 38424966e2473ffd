//! Post-merge invariant checks
//!
//! Report-only: a violation is logged and recorded, never aborts the
//! pipeline. Two independent properties: every street value belongs to the
//! catalog, and consecutive dates differ by zero days (same-day entries) or
//! exactly one day.

use crate::merge::ScheduleRecord;
use crate::STREETS;
use chrono::Duration;
use log::{error, warn};

/// Outcome of the post-merge checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationReport {
    pub streets_ok: bool,
    pub dates_ok: bool,
}

impl VerificationReport {
    pub fn clean(&self) -> bool {
        self.streets_ok && self.dates_ok
    }
}

/// Run both checks over the merged record set.
pub fn verify(records: &[ScheduleRecord]) -> VerificationReport {
    let streets_ok = verify_streets(records);
    if !streets_ok {
        error!("Street - street values do not match the predefined street catalog");
    }

    let dates_ok = verify_dates(records);
    if !dates_ok {
        warn!("Date - consecutive dates are not incremented by at most one day");
    }

    VerificationReport {
        streets_ok,
        dates_ok,
    }
}

fn verify_streets(records: &[ScheduleRecord]) -> bool {
    records
        .iter()
        .all(|r| STREETS.contains(&r.street.as_str()))
}

fn verify_dates(records: &[ScheduleRecord]) -> bool {
    let mut prev = match records.first() {
        Some(record) => record.date,
        None => return true,
    };

    for record in &records[1..] {
        let diff = record.date - prev;
        // Zero-day gaps are same-day entries, not violations.
        if diff == Duration::zero() {
            continue;
        }
        if diff != Duration::days(1) {
            return false;
        }
        prev = record.date;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(day: u32, street: &str) -> ScheduleRecord {
        ScheduleRecord {
            date: NaiveDate::from_ymd_opt(2021, 1, day).unwrap(),
            street: street.to_string(),
            on: "06:30".to_string(),
            off: "14:30".to_string(),
            duration: "8".to_string(),
        }
    }

    #[test]
    fn test_valid_records_pass() {
        let records = vec![record(1, "1"), record(1, "2"), record(2, "8")];
        let report = verify(&records);
        assert!(report.streets_ok);
        assert!(report.dates_ok);
        assert!(report.clean());
    }

    #[test]
    fn test_unknown_street_flagged() {
        let records = vec![record(1, "1"), record(1, "99")];
        let report = verify(&records);
        assert!(!report.streets_ok);
        assert!(report.dates_ok);
    }

    #[test]
    fn test_date_gap_flagged() {
        let records = vec![record(1, "1"), record(3, "2")];
        let report = verify(&records);
        assert!(report.streets_ok);
        assert!(!report.dates_ok);
    }

    #[test]
    fn test_empty_record_set_is_clean() {
        assert!(verify(&[]).clean());
    }
}
