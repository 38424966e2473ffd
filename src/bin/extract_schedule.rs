//! CLI tool: recover a water-supply schedule from a registered sample PDF

use schedule_scraper::{process_schedule, PipelineConfig};
use std::env;
use std::process;

/// How many records to surface for inspection.
const PREVIEW_ROWS: usize = 50;

const SAMPLE_COUNT: u32 = 6;

fn main() {
    let args: Vec<String> = env::args().collect();

    let selector = args.get(1).and_then(|a| a.parse::<u32>().ok());
    let selector = match selector {
        Some(n) if (1..=SAMPLE_COUNT).contains(&n) => n,
        _ => {
            eprintln!("Usage: {} <1-{}>", args[0], SAMPLE_COUNT);
            eprintln!();
            eprintln!("Selects one of the registered sample schedules under samples/");
            eprintln!("and prints the first {} recovered records.", PREVIEW_ROWS);
            process::exit(1);
        }
    };

    let path = format!("samples/test{}.pdf", selector);
    println!("Processing data of test{}.pdf:", selector);

    match process_schedule(&path, &PipelineConfig::default()) {
        Ok(result) => {
            println!(
                "{:<12} {:<8} {:<9} {:<9} {:<8}",
                "Date", "Street", "On Time", "Off Time", "Duration"
            );
            for record in result.records.iter().take(PREVIEW_ROWS) {
                println!(
                    "{:<12} {:<8} {:<9} {:<9} {:<8}",
                    record.date.format("%d-%m-%Y"),
                    record.street,
                    record.on,
                    record.off,
                    record.duration
                );
            }
            println!();
            println!("{} records recovered", result.records.len());

            if !result.report.clean() {
                eprintln!("Warning: verification flagged the recovered records");
                if !result.report.streets_ok {
                    eprintln!("  - street values outside the catalog");
                }
                if !result.report.dates_ok {
                    eprintln!("  - date sequence is not continuous");
                }
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
