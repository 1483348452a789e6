use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::campaign::DescriptionLog;
use crate::logname::{CellLogName, DateId, LogName, SeriesKey};

/// Matrix of a campaign as rebuilt from its log file names
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Matrix {
    series: BTreeMap<SeriesKey, BTreeSet<u32>>,
}

impl Matrix {
    pub fn insert(&mut self, name: &CellLogName) {
        self.series.entry(name.series()).or_default().insert(name.number);
    }

    /// Association counts or depths recorded for a series, ascending
    pub fn get(&self, key: &SeriesKey) -> Option<Vec<u32>> {
        self.series.get(key).map(|numbers| numbers.iter().copied().collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SeriesKey, Vec<u32>)> {
        self.series
            .iter()
            .map(|(key, numbers)| (key, numbers.iter().copied().collect()))
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }
}

/// A campaign found in the log directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub date: DateId,
    pub description: Option<String>,
}

/// Which campaign a report covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Selected(DateId),
    NoCampaigns,
    /// More than one campaign and none was asked for
    Ambiguous(Vec<Candidate>),
}

/// Rebuilds campaign matrices from a log directory listing
pub struct ReportScanner {
    dir: PathBuf,
}

impl ReportScanner {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self, name: &CellLogName) -> PathBuf {
        self.dir.join(name.to_string())
    }

    /// Every entry that follows the log name grammar
    fn entries(&self) -> Result<Vec<LogName>> {
        let listing = fs::read_dir(&self.dir)
            .with_context(|| format!("failed to list log directory {}", self.dir.display()))?;

        let mut names = Vec::new();
        for entry in listing {
            let entry = entry?;
            let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            match LogName::parse(&file_name) {
                Ok(name) => names.push(name),
                Err(e) => debug!(file = %file_name, reason = %e, "ignoring entry"),
            }
        }
        Ok(names)
    }

    /// Pick the campaign to report on
    pub fn select(&self, requested: Option<&DateId>) -> Result<Selection> {
        if let Some(date) = requested {
            return Ok(Selection::Selected(date.clone()));
        }

        let dates: BTreeSet<DateId> = self
            .entries()?
            .into_iter()
            .map(|name| name.date().clone())
            .collect();

        let mut dates = dates.into_iter();
        Ok(match (dates.next(), dates.len()) {
            (None, _) => Selection::NoCampaigns,
            (Some(date), 0) => Selection::Selected(date),
            (Some(first), _) => Selection::Ambiguous(
                std::iter::once(first)
                    .chain(dates)
                    .map(|date| Candidate {
                        description: DescriptionLog::read(&self.dir, &date),
                        date,
                    })
                    .collect(),
            ),
        })
    }

    /// Series and numbers that have a log for `date`
    pub fn scan(&self, date: &DateId) -> Result<Matrix> {
        let mut matrix = Matrix::default();
        for name in self.entries()? {
            if let LogName::Cell(cell) = name {
                if &cell.date == date {
                    matrix.insert(&cell);
                }
            }
        }
        Ok(matrix)
    }
}
