use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::config::CampaignConfig;
use crate::executor::RunExecutor;
use crate::logname::DateId;
use crate::matrix::MatrixEnumerator;
use crate::process::ProcessRunner;

#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("log directory `{}' does not exist", .0.display())]
    MissingOutputDir(PathBuf),
}

/// The one-line summary log of a campaign, `<date>.log`
pub struct DescriptionLog;

impl DescriptionLog {
    pub fn path(dir: &Path, date: &DateId) -> PathBuf {
        dir.join(date.description_log())
    }

    /// Write the operator's description with the throughput arguments appended
    pub fn write(
        dir: &Path,
        date: &DateId,
        description: &str,
        throughput_args: &str,
    ) -> Result<PathBuf> {
        let path = Self::path(dir, date);
        let description = description.split_whitespace().collect::<Vec<_>>().join(" ");
        fs::write(&path, format!("{description} iperfp={throughput_args}\n"))
            .with_context(|| format!("failed to write description log {}", path.display()))?;
        Ok(path)
    }

    /// Description text with line breaks folded into spaces, if the log exists
    pub fn read(dir: &Path, date: &DateId) -> Option<String> {
        let text = fs::read_to_string(Self::path(dir, date)).ok()?;
        Some(text.lines().collect::<Vec<_>>().join(" ").trim().to_string())
    }
}

/// Outcome of a completed campaign
#[derive(Debug)]
pub struct CampaignSummary {
    pub date: DateId,
    pub cells: usize,
    /// Cell logs in the order they were first written
    pub logs: Vec<PathBuf>,
    pub description_log: PathBuf,
}

/// Runs every cell of a campaign, one after the other
pub struct Campaign<'a, R: ProcessRunner + ?Sized> {
    config: &'a CampaignConfig,
    runner: &'a R,
    date: DateId,
}

impl<'a, R: ProcessRunner + ?Sized> Campaign<'a, R> {
    pub fn new(config: &'a CampaignConfig, runner: &'a R) -> Self {
        Self {
            config,
            runner,
            date: DateId::now(),
        }
    }

    /// Use a fixed campaign identifier instead of the current time
    pub fn with_date(mut self, date: DateId) -> Self {
        self.date = date;
        self
    }

    pub fn date(&self) -> &DateId {
        &self.date
    }

    /// Start-of-campaign banner, shown before the description is asked for
    pub fn banner(&self) -> String {
        format!(
            "\nALPHA TEST SCRIPT\n=================\n\n\
             Time of start: {}\n\
             Remote server: {}\n\
             Tests per run: {}\n\n",
            self.date, self.config.server, self.config.repeats
        )
    }

    pub fn run(&self, description: &str) -> Result<CampaignSummary> {
        let output = &self.config.output;
        if !output.is_dir() {
            return Err(CampaignError::MissingOutputDir(output.clone()).into());
        }

        let description_log = DescriptionLog::write(
            output,
            &self.date,
            description,
            &self.config.throughput_args,
        )?;

        let cells = MatrixEnumerator::new(self.config).cells();
        let executor = RunExecutor::new(self.config, self.runner);
        let mut logs: Vec<PathBuf> = Vec::new();
        let mut current_mode: Option<&str> = None;

        for (index, cell) in cells.iter().enumerate() {
            if current_mode != Some(cell.mode.as_str()) {
                if current_mode.is_some() {
                    println!();
                }
                println!(
                    "Initiating ALPHA-{} benchmarks (-n {})",
                    cell.mode,
                    self.config.modes.get(&cell.mode).map_or("", String::as_str)
                );
                current_mode = Some(cell.mode.as_str());
            }

            let log = output.join(cell.log_name(&self.date).to_string());
            if cell.repeat == 0 {
                match cell.tree_depth {
                    Some(depth) => println!(
                        "ALPHA-{}: {} associations, tree depth {:3} ({})",
                        cell.mode,
                        cell.associations,
                        depth,
                        log.display()
                    ),
                    None => println!(
                        "ALPHA-{}: {:2} associations ({})",
                        cell.mode,
                        cell.associations,
                        log.display()
                    ),
                }
                logs.push(log.clone());
            }

            info!(
                cell = index + 1,
                total = cells.len(),
                mode = %cell.mode,
                associations = cell.associations,
                tree_depth = ?cell.tree_depth,
                repeat = cell.repeat,
                "running cell"
            );
            executor.execute(cell, &log)?;
        }

        println!("\nAll tests done.\n");

        Ok(CampaignSummary {
            date: self.date.clone(),
            cells: cells.len(),
            logs,
            description_log,
        })
    }
}
