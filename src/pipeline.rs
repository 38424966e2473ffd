//! Staged recovery pipeline
//!
//! Four super-stages: parallel area refinement for the three fields, stream
//! cleaning, temporal reconstruction, and merge + verification. Each stage
//! logs a pass/fail status line; the first failure aborts with its typed
//! error after being reported. There is no partial-result path.

use crate::clean::{clean_date, clean_street, clean_timing};
use crate::extractor::{Area, LatticeExtractor, RawTable, TableExtractor};
use crate::merge::{merge_streams, ScheduleRecord};
use crate::reconstruct::{convert_timings, generate_dates, resolve_first_date};
use crate::refine::{refine_area, RefineConfig};
use crate::verify::{verify, VerificationReport};
use crate::{Field, ScheduleError};
use log::{error, info};
use std::fmt;
use std::path::Path;

/// Ball-park extraction geometry for one field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub keyword: String,
    pub area: Area,
    pub expected_columns: usize,
}

/// Full pipeline configuration: one spec per field plus refinement bounds.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub date: FieldSpec,
    pub street: FieldSpec,
    pub timing: FieldSpec,
    pub refine: RefineConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            date: FieldSpec {
                keyword: "Date".to_string(),
                area: Area::new(40.0, 100.0, 920.0, 300.0),
                expected_columns: 1,
            },
            street: FieldSpec {
                keyword: "Street".to_string(),
                area: Area::new(40.0, 220.0, 920.0, 360.0),
                expected_columns: 1,
            },
            timing: FieldSpec {
                keyword: "On Time;Duration".to_string(),
                area: Area::new(40.0, 275.0, 920.0, 830.0),
                expected_columns: 3,
            },
            refine: RefineConfig::default(),
        }
    }
}

/// The recovered schedule plus its verification outcome.
#[derive(Debug)]
pub struct ScheduleResult {
    pub records: Vec<ScheduleRecord>,
    pub report: VerificationReport,
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Refine,
    Clean,
    Reconstruct,
    Merge,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Refine => write!(f, "ALL - tweaking areas to extract correct data"),
            Stage::Clean => write!(f, "ALL - cleaning and formatting data"),
            Stage::Reconstruct => write!(f, "ALL - reconstructing date and time data"),
            Stage::Merge => write!(f, "ALL - merging and verifying the record set"),
        }
    }
}

/// Log the stage outcome and pass the result through.
fn checked<T>(stage: Stage, result: Result<T, ScheduleError>) -> Result<T, ScheduleError> {
    match &result {
        Ok(_) => info!("{} - PASS", stage),
        Err(e) => error!("{} - FAIL: {}", stage, e),
    }
    result
}

/// Open a PDF and run the full pipeline with the given configuration.
pub fn process_schedule<P: AsRef<Path>>(
    path: P,
    config: &PipelineConfig,
) -> Result<ScheduleResult, ScheduleError> {
    let engine = LatticeExtractor::open(path)?;
    run_pipeline(&engine, config)
}

/// Run the pipeline against any extraction engine.
pub fn run_pipeline<E: TableExtractor + Sync>(
    engine: &E,
    config: &PipelineConfig,
) -> Result<ScheduleResult, ScheduleError> {
    // Stage 1: three independent refinements, joined at a single barrier.
    // Each worker owns its area; results meet only here.
    let (date_result, (street_result, timing_result)) = rayon::join(
        || refine_field(engine, Field::Date, &config.date, &config.refine),
        || {
            rayon::join(
                || refine_field(engine, Field::Street, &config.street, &config.refine),
                || refine_field(engine, Field::Timing, &config.timing, &config.refine),
            )
        },
    );
    let (date_table, street_table, timing_table) = checked(
        Stage::Refine,
        date_result.and_then(|d| Ok((d, street_result?, timing_result?))),
    )?;

    // Stage 2: per-stream cleaning. Rows may be dropped or exploded here;
    // an entirely empty stream means the geometry was wrong after all.
    let (dates, streets, timings) = checked(Stage::Clean, {
        let dates = clean_date(&date_table);
        let streets = clean_street(&street_table);
        let timings = clean_timing(&timing_table);
        if streets.is_empty() {
            Err(ScheduleError::EmptyStream(Field::Street))
        } else if timings.is_empty() {
            Err(ScheduleError::EmptyStream(Field::Timing))
        } else {
            Ok((dates, streets, timings))
        }
    })?;

    // Stage 3: temporal reconstruction.
    let (generated_dates, timings) = checked(Stage::Reconstruct, {
        let mut dates = dates;
        let mut timings = timings;
        resolve_first_date(&mut dates).map(|first| {
            convert_timings(&mut timings);
            (generate_dates(&streets, first), timings)
        })
    })?;

    // Stage 4: merge and verify. Verification is report-only.
    let records = checked(
        Stage::Merge,
        merge_streams(&generated_dates, &streets, &timings),
    )?;
    let report = verify(&records);

    Ok(ScheduleResult { records, report })
}

fn refine_field<E: TableExtractor>(
    engine: &E,
    field: Field,
    spec: &FieldSpec,
    config: &RefineConfig,
) -> Result<RawTable, ScheduleError> {
    refine_area(
        engine,
        field,
        &spec.keyword,
        spec.area,
        spec.expected_columns,
        config,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_registers_three_regions() {
        let config = PipelineConfig::default();
        assert_eq!(config.date.expected_columns, 1);
        assert_eq!(config.street.expected_columns, 1);
        assert_eq!(config.timing.expected_columns, 3);
        assert_eq!(config.timing.keyword, "On Time;Duration");
        assert!(config.date.area.left < config.street.area.left);
    }
}
