//! File name grammar of the campaign log directory.
//!
//! The log directory has no index file: a log's name is the only record of
//! which campaign and which matrix cell it belongs to.
//!
//! ```text
//! <date>.log                      description log
//! <date>-<mode>-<NN>.log          association sweep, NN = association count
//! <date>-<mode>tree-<NN>.log      tree depth sweep, NN = tree depth
//! ```
//!
//! `<date>` is `YYYYMMDD-HHMMSS` and `NN` is zero padded to two digits.
//! Parsing only accepts names that [`std::fmt::Display`] would produce.

use chrono::{DateTime, Local};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::{TREE_SUFFIX, is_valid_mode_name};

pub const LOG_EXTENSION: &str = ".log";

const DATE_FORMAT: &str = "%Y%m%d-%H%M%S";
const DATE_LEN: usize = 15;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogNameError {
    #[error("{0:?} does not end in .log")]
    MissingExtension(String),

    #[error("{0:?} is not a YYYYMMDD-HHMMSS date")]
    BadDate(String),

    #[error("{0:?} does not have the form <date>-<mode>-<number>")]
    BadArity(String),

    #[error("{0:?} is not a valid mode")]
    BadMode(String),

    #[error("{0:?} is not a canonical two digit number")]
    BadNumber(String),
}

/// Campaign identifier: the local start time, `YYYYMMDD-HHMMSS`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateId(String);

impl DateId {
    pub fn now() -> Self {
        Self::from_datetime(&Local::now())
    }

    pub fn from_datetime(time: &DateTime<Local>) -> Self {
        Self(time.format(DATE_FORMAT).to_string())
    }

    pub fn parse(s: &str) -> Result<Self, LogNameError> {
        let bytes = s.as_bytes();
        let well_formed = bytes.len() == DATE_LEN
            && bytes[8] == b'-'
            && bytes
                .iter()
                .enumerate()
                .all(|(i, b)| i == 8 || b.is_ascii_digit());

        if well_formed {
            Ok(Self(s.to_string()))
        } else {
            Err(LogNameError::BadDate(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of this campaign's description log
    pub fn description_log(&self) -> String {
        format!("{}{}", self.0, LOG_EXTENSION)
    }
}

impl fmt::Display for DateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DateId {
    type Err = LogNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Which sweep a log belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Sweep {
    Associations,
    TreeDepth,
}

/// A mode together with its sweep kind. Reports group logs by this key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeriesKey {
    pub mode: String,
    pub sweep: Sweep,
}

impl SeriesKey {
    pub fn new(mode: impl Into<String>, sweep: Sweep) -> Self {
        Self {
            mode: mode.into(),
            sweep,
        }
    }

    fn parse(token: &str) -> Result<Self, LogNameError> {
        let (mode, sweep) = match token.strip_suffix(TREE_SUFFIX) {
            Some(mode) => (mode, Sweep::TreeDepth),
            None => (token, Sweep::Associations),
        };

        if !is_valid_mode_name(mode) {
            return Err(LogNameError::BadMode(token.to_string()));
        }
        Ok(Self::new(mode, sweep))
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sweep {
            Sweep::Associations => f.write_str(&self.mode),
            Sweep::TreeDepth => write!(f, "{}{}", self.mode, TREE_SUFFIX),
        }
    }
}

/// Name of a per-cell log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellLogName {
    pub date: DateId,
    pub mode: String,
    pub sweep: Sweep,
    /// Association count or tree depth, depending on `sweep`
    pub number: u32,
}

impl CellLogName {
    pub fn series(&self) -> SeriesKey {
        SeriesKey::new(self.mode.clone(), self.sweep)
    }

    pub fn for_series(date: &DateId, series: &SeriesKey, number: u32) -> Self {
        Self {
            date: date.clone(),
            mode: series.mode.clone(),
            sweep: series.sweep,
            number,
        }
    }
}

impl fmt::Display for CellLogName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{:02}{}",
            self.date,
            self.series(),
            self.number,
            LOG_EXTENSION
        )
    }
}

/// Any file name the log directory may legitimately contain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogName {
    Description(DateId),
    Cell(CellLogName),
}

impl LogName {
    pub fn date(&self) -> &DateId {
        match self {
            LogName::Description(date) => date,
            LogName::Cell(cell) => &cell.date,
        }
    }

    pub fn parse(name: &str) -> Result<Self, LogNameError> {
        let stem = name
            .strip_suffix(LOG_EXTENSION)
            .ok_or_else(|| LogNameError::MissingExtension(name.to_string()))?;

        let date_part = stem
            .get(..DATE_LEN)
            .ok_or_else(|| LogNameError::BadDate(stem.to_string()))?;
        let date = DateId::parse(date_part)?;

        let rest = &stem[DATE_LEN..];
        if rest.is_empty() {
            return Ok(LogName::Description(date));
        }

        let tokens: Vec<&str> = rest
            .strip_prefix('-')
            .ok_or_else(|| LogNameError::BadDate(stem.to_string()))?
            .split('-')
            .collect();
        let [series, number] = tokens[..] else {
            return Err(LogNameError::BadArity(name.to_string()));
        };

        let series = SeriesKey::parse(series)?;
        let number = parse_number(number)?;

        Ok(LogName::Cell(CellLogName::for_series(&date, &series, number)))
    }
}

impl fmt::Display for LogName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogName::Description(date) => f.write_str(&date.description_log()),
            LogName::Cell(cell) => write!(f, "{cell}"),
        }
    }
}

impl FromStr for LogName {
    type Err = LogNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_number(token: &str) -> Result<u32, LogNameError> {
    let bad = || LogNameError::BadNumber(token.to_string());

    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let number: u32 = token.parse().map_err(|_| bad())?;
    if format!("{number:02}") != token {
        return Err(bad());
    }
    Ok(number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::TestCell;

    fn date() -> DateId {
        DateId::parse("20240101-000000").unwrap()
    }

    #[test]
    fn test_cell_names() {
        let name = CellLogName {
            date: date(),
            mode: "N".to_string(),
            sweep: Sweep::Associations,
            number: 1,
        };
        assert_eq!(name.to_string(), "20240101-000000-N-01.log");

        let name = CellLogName {
            sweep: Sweep::TreeDepth,
            number: 80,
            ..name
        };
        assert_eq!(name.to_string(), "20240101-000000-Ntree-80.log");
    }

    #[test]
    fn test_round_trip_for_cells() {
        let modes = ["N", "C", "M", "CNa", "MNb"];
        let numbers = [0, 1, 9, 10, 32, 99, 100, 1024];

        for mode in modes {
            for number in numbers {
                for tree_depth in [None, Some(number)] {
                    let cell = TestCell {
                        mode: mode.to_string(),
                        associations: if tree_depth.is_some() { 4 } else { number },
                        tree_depth,
                        repeat: 0,
                    };
                    let name = cell.log_name(&date());
                    let parsed = LogName::parse(&name.to_string()).unwrap();

                    let LogName::Cell(parsed) = parsed else {
                        panic!("{name} parsed as a description log");
                    };
                    assert_eq!(parsed, name);
                    assert_eq!(parsed.series().mode, cell.mode);
                    assert_eq!(parsed.sweep, cell.sweep());
                    assert_eq!(parsed.number, cell.sweep_value());
                }
            }
        }
    }

    #[test]
    fn test_description_log() {
        let parsed = LogName::parse("20240101-000000.log").unwrap();
        assert_eq!(parsed, LogName::Description(date()));
        assert_eq!(parsed.to_string(), "20240101-000000.log");
    }

    #[test]
    fn test_rejects_non_canonical_names() {
        let cases = [
            ("20240101-000000-N-01", LogNameError::MissingExtension("20240101-000000-N-01".into())),
            ("2024010-000000-N-01.log", LogNameError::BadDate("2024010-000000-".into())),
            ("20240101-000000-N.log", LogNameError::BadArity("20240101-000000-N.log".into())),
            (
                "20240101-000000-N-01-x.log",
                LogNameError::BadArity("20240101-000000-N-01-x.log".into()),
            ),
            ("20240101-000000-N-1.log", LogNameError::BadNumber("1".into())),
            ("20240101-000000-N-007.log", LogNameError::BadNumber("007".into())),
            ("20240101-000000-N-+1.log", LogNameError::BadNumber("+1".into())),
            ("20240101-000000--01.log", LogNameError::BadMode("".into())),
            ("20240101-000000-tree-01.log", LogNameError::BadMode("tree".into())),
        ];

        for (name, expected) in cases {
            assert_eq!(LogName::parse(name), Err(expected), "{name}");
        }
    }

    #[test]
    fn test_date_id() {
        assert!(DateId::parse("20240101-235959").is_ok());
        assert!(DateId::parse("20240101_235959").is_err());
        assert!(DateId::parse("2024010a-235959").is_err());
        assert!(DateId::parse("20240101-23595").is_err());

        let now = DateId::now();
        assert_eq!(DateId::parse(now.as_str()), Ok(now.clone()));
        assert_eq!(now.description_log(), format!("{now}.log"));
    }

    #[test]
    fn test_series_display() {
        assert_eq!(SeriesKey::new("M", Sweep::Associations).to_string(), "M");
        assert_eq!(SeriesKey::new("M", Sweep::TreeDepth).to_string(), "Mtree");
    }
}
