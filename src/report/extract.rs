//! Throughput samples from the free text of a cell log.
//!
//! The throughput tool prints a header line carrying the `Bandwidth` label
//! and then one data line per measurement:
//!
//! ```text
//! [ ID] Interval       Transfer     Bandwidth
//! [  3]  0.0-30.0 sec   337 MBytes  94371 Kbits/sec
//! ```
//!
//! The label line plus exactly one following line form a window. Label and
//! separator lines are dropped; the second to last field of each remaining
//! line is the sample.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const LABEL: &str = "Bandwidth";

#[derive(Debug, Error, PartialEq)]
pub enum MalformedLine {
    #[error("expected at least two fields")]
    TooFewFields,

    #[error("{0:?} is not a number")]
    NotANumber(String),
}

/// A data line that does not carry a readable sample
#[derive(Debug, Error, PartialEq)]
#[error("{}:{line}: {kind}: {text:?}", .path.display())]
pub struct ExtractError {
    pub path: PathBuf,
    /// 1-based
    pub line: usize,
    pub text: String,
    #[source]
    pub kind: MalformedLine,
}

fn is_separator(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line == "--"
}

/// Value of one data line
pub fn parse_data_line(line: &str) -> Result<f64, MalformedLine> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 2 {
        return Err(MalformedLine::TooFewFields);
    }

    let field = fields[fields.len() - 2];
    match field.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(MalformedLine::NotANumber(field.to_string())),
    }
}

/// Samples of a log's text, in order. `origin` only labels errors.
pub fn extract_samples(text: &str, origin: &Path) -> Result<Vec<f64>, ExtractError> {
    let lines: Vec<&str> = text.lines().collect();
    let mut samples = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        if !line.contains(LABEL) {
            continue;
        }
        let Some(next) = lines.get(index + 1) else {
            continue;
        };
        if next.contains(LABEL) || is_separator(next) {
            continue;
        }

        let value = parse_data_line(next).map_err(|kind| ExtractError {
            path: origin.to_path_buf(),
            line: index + 2,
            text: next.to_string(),
            kind,
        })?;
        samples.push(value);
    }

    Ok(samples)
}

/// Samples of the log at `path`.
///
/// The log also carries the subject's raw output, which need not be UTF-8,
/// so invalid bytes are replaced rather than rejected.
pub fn extract_file(path: &Path) -> Result<Vec<f64>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read log {}", path.display()))?;
    Ok(extract_samples(&String::from_utf8_lossy(&bytes), path)?)
}
