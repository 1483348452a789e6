use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::aggregate::AggregatedSeries;

pub const DATASET_EXTENSION: &str = "dat";

/// Writes one plotting dataset per series
pub struct DatasetWriter {
    dir: PathBuf,
}

impl DatasetWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dataset_path(&self, series: &AggregatedSeries) -> PathBuf {
        self.dir.join(format!("{}.{}", series.name(), DATASET_EXTENSION))
    }

    /// Create the plot directory if needed and delete the files in it
    pub fn clear(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create plot directory {}", self.dir.display()))?;

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::remove_file(entry.path())
                    .with_context(|| format!("failed to remove {}", entry.path().display()))?;
                debug!(file = %entry.path().display(), "removed stale dataset");
            }
        }
        Ok(())
    }

    /// Clear the plot directory, then write every series to its own file and
    /// echo it to `console`
    pub fn write_all(
        &self,
        series: &[AggregatedSeries],
        console: &mut dyn Write,
    ) -> Result<Vec<PathBuf>> {
        self.clear()?;
        series
            .iter()
            .map(|s| self.write_series(s, &mut *console))
            .collect()
    }

    fn write_series(&self, series: &AggregatedSeries, console: &mut dyn Write) -> Result<PathBuf> {
        let path = self.dataset_path(series);
        let mut file = BufWriter::new(
            File::create(&path).with_context(|| format!("failed to create {}", path.display()))?,
        );

        writeln!(console, "ALPHA-{}", series.name())?;
        for row in &series.rows {
            let line = row.dataset_line();
            writeln!(console, "{line}")?;
            writeln!(file, "{line}")?;
        }
        writeln!(console)?;
        file.flush()?;

        Ok(path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logname::{SeriesKey, Sweep};
    use crate::report::aggregate::Aggregator;

    #[test]
    fn test_writes_one_file_per_series() {
        let dir = tempfile::tempdir().unwrap();
        let plot_dir = dir.path().join("gnuplot");
        fs::create_dir(&plot_dir).unwrap();
        fs::write(plot_dir.join("old.dat"), "stale").unwrap();

        let aggregator = Aggregator::default();
        let series = vec![
            aggregator.aggregate(
                SeriesKey::new("C", Sweep::Associations),
                vec![(1, vec![10.0, 0.0, 20.0])],
            ),
            aggregator.aggregate(
                SeriesKey::new("M", Sweep::TreeDepth),
                vec![(3, vec![]), (16, vec![5.2])],
            ),
        ];

        let writer = DatasetWriter::new(&plot_dir);
        let mut console = Vec::new();
        let written = writer.write_all(&series, &mut console).unwrap();

        assert_eq!(written, vec![plot_dir.join("C.dat"), plot_dir.join("Mtree.dat")]);
        assert!(!plot_dir.join("old.dat").exists());
        assert_eq!(
            fs::read_to_string(plot_dir.join("C.dat")).unwrap(),
            " 1 15.00 (10.0, 0.0, 20.0)\n"
        );
        assert_eq!(
            fs::read_to_string(plot_dir.join("Mtree.dat")).unwrap(),
            " 3 no data ()\n16  5.20 (5.2)\n"
        );

        let console = String::from_utf8(console).unwrap();
        assert!(console.starts_with("ALPHA-C\n 1 15.00"));
        assert!(console.contains("ALPHA-Mtree\n"));
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let writer = DatasetWriter::new(dir.path().join("plots"));
        writer.write_all(&[], &mut std::io::sink()).unwrap();
        assert!(writer.dir().is_dir());
    }
}
