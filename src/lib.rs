//! Water-supply schedule recovery from lattice-formatted PDF notices
//!
//! This crate provides:
//! - Keyword-guided refinement of the extraction area for each table region
//! - A cleaning pipeline that normalizes, repairs, and re-synchronizes the
//!   independently extracted date, street, and timing column streams
//! - Temporal reconstruction of the per-row date column from street
//!   scheduling-group parity
//! - Post-merge verification of the recovered record set

pub mod clean;
pub mod extractor;
pub mod merge;
pub mod pipeline;
pub mod reconstruct;
pub mod refine;
pub mod verify;

pub use extractor::{Area, LatticeExtractor, RawTable, TableExtractor};
pub use merge::{merge_streams, ScheduleRecord};
pub use pipeline::{process_schedule, run_pipeline, FieldSpec, PipelineConfig, ScheduleResult};
pub use refine::{refine_area, RefineConfig};
pub use verify::{verify, VerificationReport};

use std::fmt;

/// Output column labels. Rows matching one of these (lowercased, spaces
/// removed) are section headers, not data.
pub const COL_NAMES: [&str; 5] = ["Date", "Street", "On Time", "Off Time", "Duration"];

/// Month names used to repair misspelled month tokens in date cells.
pub const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// The street catalog: every valid street identifier, in group order.
pub const STREETS: [&str; 15] = [
    "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14", "15",
];

/// The first `GROUP_ONE_LEN` catalog entries form scheduling group one; the
/// remaining entries form group two. Alternation between the groups drives
/// the one-day date increment during reconstruction.
pub const GROUP_ONE_LEN: usize = 7;

/// The three independently extracted table regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Date,
    Street,
    Timing,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Date => write!(f, "Date"),
            Field::Street => write!(f, "Street"),
            Field::Timing => write!(f, "Timing"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("{field} area refinement did not converge after {iterations} iterations")]
    Refinement { field: Field, iterations: u32 },
    #[error("{0} stream is empty after cleaning")]
    EmptyStream(Field),
    #[error("date at row {row} has no later resolved anchor to interpolate from")]
    UnresolvedDate { row: usize },
    #[error("street/timing streams out of alignment: {0}")]
    Misaligned(String),
}

impl From<lopdf::Error> for ScheduleError {
    fn from(e: lopdf::Error) -> Self {
        ScheduleError::Parse(e.to_string())
    }
}
