//! # Report Module
//!
//! Aggregation pass over a campaign's log directory. It needs no index: the
//! matrix comes from the log file names, and the samples are scraped from the
//! log text.

pub mod aggregate;
pub mod dataset;
pub mod extract;
pub mod scanner;

use anyhow::Result;

use crate::campaign::DescriptionLog;
use crate::logname::{CellLogName, DateId};
use aggregate::{AggregatedSeries, Aggregator};
use scanner::ReportScanner;

/// Aggregated results of one campaign
#[derive(Debug)]
pub struct Report {
    pub date: DateId,
    pub description: Option<String>,
    pub series: Vec<AggregatedSeries>,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Extract and aggregate every cell log of `date`
pub fn build_report(
    scanner: &ReportScanner,
    date: &DateId,
    aggregator: &Aggregator,
) -> Result<Report> {
    let matrix = scanner.scan(date)?;

    let mut series = Vec::with_capacity(matrix.len());
    for (key, numbers) in matrix.iter() {
        let mut cells = Vec::with_capacity(numbers.len());
        for number in numbers {
            let path = scanner.log_path(&CellLogName::for_series(date, key, number));
            cells.push((number, extract::extract_file(&path)?));
        }
        series.push(aggregator.aggregate(key.clone(), cells));
    }

    Ok(Report {
        date: date.clone(),
        description: DescriptionLog::read(scanner.dir(), date),
        series,
    })
}
