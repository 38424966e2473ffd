//! Cell cleanup and malformation classification
//!
//! Every stream goes through the same normalization (noise stripping,
//! separator canonicization, carriage-return explosion, duplicate collapse)
//! and then a per-field classifier. Dates are repaired or marked, never
//! dropped, because row positions carry ordering information; street and
//! timing rows that fail every pattern are dropped instead.

use crate::extractor::RawTable;
use crate::{COL_NAMES, MONTHS, STREETS};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

/// A date cell after classification. `Unresolved` marks a cell that failed
/// every date pattern; it is filled in later by interpolation and never
/// reaches the final output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateCell {
    Resolved(NaiveDate),
    Unresolved,
}

/// A street cell after classification. `Boundary` marks a header row kept
/// as a re-synchronization anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreetCell {
    Boundary,
    Street(String),
}

/// A timing row after classification. Entry values are canonical strings:
/// clock times as `"6:30;AM"`, durations as `"8"` or `"8.5"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimingRow {
    Boundary,
    Entry {
        on: String,
        off: String,
        duration: String,
    },
}

static NOISE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9:;.\s]").unwrap());
static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2};[a-zA-Z]+;\d{4}$").unwrap());
static DURATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d$|^\d\.\d$").unwrap());
static CLOCK_12H_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(0?[1-9]|1[0-2]):[0-5][0-9](AM|PM)$").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static REPEAT_SEMI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r";+").unwrap());

/// Column-header labels after the same normalization the cells get.
static HEADER_LABELS: Lazy<Vec<String>> = Lazy::new(|| {
    COL_NAMES
        .iter()
        .map(|name| name.to_lowercase().replace(' ', ""))
        .collect()
});

/// Uniform per-cell cleanup applied to every field.
///
/// Lowercases, canonicalizes separators (`;` becomes `:`, `,` becomes `;`),
/// strips hour words, uppercases meridiem markers, and removes everything
/// that is not a letter, digit, whitespace, `:`, `;`, or `.`.
pub fn normalize_cell(raw: &str) -> String {
    let lowered = raw
        .to_lowercase()
        .replace(';', ":")
        .replace(',', ";")
        .replace("hours", "")
        .replace("hour", "")
        .replace("am", "AM")
        .replace("pm", "PM");
    NOISE_RE.replace_all(&lowered, "").trim().to_string()
}

/// Split any cell containing an embedded carriage return into one row per
/// segment. Rows widen to the deepest cell; missing segments become empty
/// cells, which fail classification and drop later.
pub fn explode_rows(rows: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let segments: Vec<Vec<&str>> = row.iter().map(|c| c.split('\r').collect()).collect();
        let depth = segments.iter().map(|s| s.len()).max().unwrap_or(1);
        for i in 0..depth {
            out.push(
                segments
                    .iter()
                    .map(|s| s.get(i).copied().unwrap_or("").to_string())
                    .collect(),
            );
        }
    }
    out
}

/// Remove all whitespace and collapse duplicate semicolons.
pub fn squash_cell(cell: &str) -> String {
    let no_ws = WHITESPACE_RE.replace_all(cell, "");
    REPEAT_SEMI_RE.replace_all(&no_ws, ";").to_string()
}

fn is_header_label(cell: &str) -> bool {
    HEADER_LABELS.iter().any(|label| cell == label)
}

/// Levenshtein distance, used only as a scoring primitive for month-name
/// repair.
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Nearest valid month for a (possibly misspelled) month token, as a
/// 1-based month number.
fn repair_month(token: &str) -> u32 {
    let mut best = (usize::MAX, 1);
    for (idx, month) in MONTHS.iter().enumerate() {
        let dist = edit_distance(&month.to_lowercase(), token);
        if dist < best.0 {
            best = (dist, idx + 1);
        }
    }
    best.1 as u32
}

/// Classify one pre-cleaned date cell of the form `DD;month;YYYY`.
///
/// A recognizable cell has its month corrected by minimum edit distance and
/// resolves to a calendar date; anything else becomes `Unresolved`.
pub fn classify_date(cell: &str) -> DateCell {
    if !DATE_RE.is_match(cell) {
        return DateCell::Unresolved;
    }

    let mut parts = cell.split(';');
    let day = parts.next().and_then(|p| p.parse::<u32>().ok());
    let month = parts.next().map(repair_month);
    let year = parts.next().and_then(|p| p.parse::<i32>().ok());

    match (day, month, year) {
        (Some(day), Some(month), Some(year)) => NaiveDate::from_ymd_opt(year, month, day)
            .map(DateCell::Resolved)
            .unwrap_or(DateCell::Unresolved),
        _ => DateCell::Unresolved,
    }
}

/// Clean the date stream: normalize, explode, squash, drop the `date`
/// header row, strip the weekday prefix, then classify every remaining row.
/// Row count is preserved after the header drop: malformed dates are
/// marked, not removed.
pub fn clean_date(table: &RawTable) -> Vec<DateCell> {
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|r| vec![normalize_cell(r.first().map(String::as_str).unwrap_or(""))])
        .collect();

    let mut out = Vec::new();
    for row in explode_rows(rows) {
        let cell = squash_cell(&row[0]);
        if cell == "date" {
            continue;
        }

        // Cells arrive as "weekday;DD;month;YYYY"; the weekday is noise.
        let without_weekday = match cell.split_once(';') {
            Some((_, rest)) => rest,
            None => cell.as_str(),
        };
        out.push(classify_date(without_weekday.trim_end_matches(';')));
    }
    out
}

/// Clean the street stream: header rows become boundaries, catalog members
/// pass through, everything else drops.
pub fn clean_street(table: &RawTable) -> Vec<StreetCell> {
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|r| vec![normalize_cell(r.first().map(String::as_str).unwrap_or(""))])
        .collect();

    let mut out = Vec::new();
    for row in explode_rows(rows) {
        let cell = squash_cell(&row[0]);
        if is_header_label(&cell) {
            out.push(StreetCell::Boundary);
        } else if STREETS.contains(&cell.as_str()) {
            out.push(StreetCell::Street(cell));
        }
        // else: malformed, dropped
    }
    out
}

/// One classified timing cell: a boundary label or a canonical value.
enum TimingValue {
    Label,
    Value(String),
}

/// Classify one timing cell: header label, bare duration numeral, or a
/// 12-hour clock reformatted to `time;AM|PM`. `None` means malformed.
fn classify_timing_cell(cell: &str) -> Option<TimingValue> {
    if is_header_label(cell) {
        return Some(TimingValue::Label);
    }

    let cell = cell.trim_end_matches(';');
    if DURATION_RE.is_match(cell) {
        return Some(TimingValue::Value(cell.to_string()));
    }

    if CLOCK_12H_RE.is_match(cell) {
        let (time, meridiem) = cell.split_at(cell.len() - 2);
        return Some(TimingValue::Value(format!("{time};{meridiem}")));
    }

    None
}

/// Clean the 3-column timing stream. A row of three header labels is a
/// boundary; a row of three valid values is an entry; any other row drops.
pub fn clean_timing(table: &RawTable) -> Vec<TimingRow> {
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|r| {
            (0..3)
                .map(|col| normalize_cell(r.get(col).map(String::as_str).unwrap_or("")))
                .collect()
        })
        .collect();

    let mut out = Vec::new();
    for row in explode_rows(rows) {
        let cells: Vec<Option<TimingValue>> = row
            .iter()
            .map(|c| classify_timing_cell(&squash_cell(c)))
            .collect();

        if cells
            .iter()
            .all(|c| matches!(c, Some(TimingValue::Label)))
        {
            out.push(TimingRow::Boundary);
            continue;
        }

        let mut values = Vec::with_capacity(3);
        for cell in cells {
            match cell {
                Some(TimingValue::Value(v)) => values.push(v),
                _ => break,
            }
        }
        if values.len() == 3 {
            let duration = values.pop().unwrap_or_default();
            let off = values.pop().unwrap_or_default();
            let on = values.pop().unwrap_or_default();
            out.push(TimingRow::Entry { on, off, duration });
        }
        // else: at least one malformed cell, row dropped
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_cell() {
        assert_eq!(normalize_cell("6:30 pm"), "6:30 PM");
        assert_eq!(normalize_cell("8 hours"), "8");
        // Separators: ';' canonicalizes to ':', ',' to ';'.
        assert_eq!(normalize_cell("Monday, 01, January, 2021"), "monday; 01; january; 2021");
        // Noise characters outside the allowed set are stripped.
        assert_eq!(normalize_cell("  3*# "), "3");
    }

    #[test]
    fn test_explode_rows_grows_row_count() {
        let rows = vec![vec!["a\rb".to_string(), "x".to_string()]];
        let exploded = explode_rows(rows);
        assert_eq!(
            exploded,
            vec![
                vec!["a".to_string(), "x".to_string()],
                vec!["b".to_string(), "".to_string()],
            ]
        );
    }

    #[test]
    fn test_squash_cell() {
        assert_eq!(squash_cell("01; january ;2021"), "01;january;2021");
        assert_eq!(squash_cell("a;;b"), "a;b");
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("january", "january"), 0);
        assert_eq!(edit_distance("january", "jnuary"), 1);
        assert_eq!(edit_distance("", "may"), 3);
    }

    #[test]
    fn test_date_repair_misspelled_month() {
        // "Jnuary" is closest to January.
        assert_eq!(
            classify_date("05;jnuary;2021"),
            DateCell::Resolved(NaiveDate::from_ymd_opt(2021, 1, 5).unwrap())
        );
    }

    #[test]
    fn test_date_marker_on_malformed() {
        assert_eq!(classify_date("garbage"), DateCell::Unresolved);
        assert_eq!(classify_date("5;january;2021"), DateCell::Unresolved); // one-digit day
        assert_eq!(classify_date("31;february;2021"), DateCell::Unresolved); // impossible day
    }

    #[test]
    fn test_clean_date_preserves_positions() {
        let table = RawTable::new(vec![
            vec!["Date".to_string()],
            vec!["Monday, 04, January, 2021".to_string()],
            vec!["??".to_string()],
            vec!["Tuesday, 05, January, 2021".to_string()],
        ]);

        let cells = clean_date(&table);
        assert_eq!(
            cells,
            vec![
                DateCell::Resolved(NaiveDate::from_ymd_opt(2021, 1, 4).unwrap()),
                DateCell::Unresolved,
                DateCell::Resolved(NaiveDate::from_ymd_opt(2021, 1, 5).unwrap()),
            ]
        );
    }

    #[test]
    fn test_clean_street_drops_invalid_marks_headers() {
        let table = RawTable::new(vec![
            vec!["Street".to_string()],
            vec!["3".to_string()],
            vec!["99".to_string()],
            vec!["12".to_string()],
        ]);

        let cells = clean_street(&table);
        assert_eq!(
            cells,
            vec![
                StreetCell::Boundary,
                StreetCell::Street("3".to_string()),
                StreetCell::Street("12".to_string()),
            ]
        );
    }

    #[test]
    fn test_clean_timing_rows() {
        let table = RawTable::new(vec![
            vec![
                "On Time".to_string(),
                "Off Time".to_string(),
                "Duration".to_string(),
            ],
            vec![
                "6:30 am".to_string(),
                "2:30 pm".to_string(),
                "8 hours".to_string(),
            ],
            vec![
                "garbage".to_string(),
                "2:30 pm".to_string(),
                "8".to_string(),
            ],
        ]);

        let rows = clean_timing(&table);
        assert_eq!(
            rows,
            vec![
                TimingRow::Boundary,
                TimingRow::Entry {
                    on: "6:30;AM".to_string(),
                    off: "2:30;PM".to_string(),
                    duration: "8".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_timing_duration_patterns() {
        assert!(matches!(
            classify_timing_cell("8"),
            Some(TimingValue::Value(v)) if v == "8"
        ));
        assert!(matches!(
            classify_timing_cell("8.5"),
            Some(TimingValue::Value(v)) if v == "8.5"
        ));
        assert!(classify_timing_cell("85").is_none());
        assert!(classify_timing_cell("13:30AM").is_none()); // out of 12-hour range
    }
}
