//! Keyword-guided extraction area refinement
//!
//! Extraction starts from a generous ball-park area. The refinement loop
//! narrows it from both sides: first the left bound advances until the
//! field's keyword shows up in the leading column, then the right bound
//! pulls in until the extraction collapses to the expected column count.
//!
//! ```text
//! |  ball-park --> area of interest <-- ball-park  |
//! ```

use crate::extractor::{Area, RawTable, TableExtractor};
use crate::{Field, ScheduleError};
use log::debug;
use regex::Regex;

/// Whole-word keyword hits a column needs before it counts as found.
/// A single hit can come from stray scan noise.
pub const KEYWORD_THRESHOLD: usize = 2;

/// Page units an area bound moves per refinement iteration.
pub const CLIPPING_UNITS: f32 = 5.0;

/// Refinement loop bounds.
#[derive(Debug, Clone)]
pub struct RefineConfig {
    /// Iteration cap; a malformed source document can otherwise keep the
    /// loop adjusting bounds forever.
    pub max_iterations: u32,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self { max_iterations: 64 }
    }
}

/// Whole-word, case-insensitive keyword count over one side of the table.
///
/// A compound keyword `"first;last"` selects its first half when searching
/// the first column (`expand_right`) and its second half when searching the
/// last column. Returns true once [`KEYWORD_THRESHOLD`] rows match.
pub fn keyword_present(keyword: &str, table: &RawTable, expand_right: bool) -> bool {
    let (first_half, last_half) = match keyword.split_once(';') {
        Some((a, b)) => (a, b),
        None => (keyword, keyword),
    };
    let needle = if expand_right { first_half } else { last_half };
    let col = if expand_right {
        0
    } else {
        table.column_count().saturating_sub(1)
    };

    // The needle is escaped, so the pattern always compiles.
    let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(needle))).unwrap();

    let hits = table.column(col).filter(|cell| pattern.is_match(cell)).count();
    hits >= KEYWORD_THRESHOLD
}

/// Refine the extraction area for one field until the table has exactly
/// `expected_columns` columns and the keyword test passes on the active side.
///
/// Re-running on an already-satisfied table is a no-op: the first check
/// returns the table unchanged. Non-convergence within the iteration cap is
/// a [`ScheduleError::Refinement`].
pub fn refine_area<E: TableExtractor>(
    engine: &E,
    field: Field,
    keyword: &str,
    mut area: Area,
    expected_columns: usize,
    config: &RefineConfig,
) -> Result<RawTable, ScheduleError> {
    let mut table = engine.extract(&area)?;
    let mut expand_right = true;

    for _ in 0..config.max_iterations {
        if keyword_present(keyword, &table, expand_right)
            && table.column_count() == expected_columns
        {
            return Ok(table);
        }

        if expand_right {
            // Flip to the shrink phase once the keyword first appears in the
            // leading column; this iteration still takes one expand step.
            if keyword_present(keyword, &table, true) {
                expand_right = false;
            }
            table = engine.extract(&area)?;
            area.left += CLIPPING_UNITS;
            debug!("{} - expand right - {:?}", keyword, area);
        } else {
            table = engine.extract(&area)?;
            area.right -= CLIPPING_UNITS;
            debug!("{} - shrink left - {:?}", keyword, area);
        }
    }

    Err(ScheduleError::Refinement {
        field,
        iterations: config.max_iterations,
    })
}
