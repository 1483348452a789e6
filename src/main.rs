use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use alphatest::{
    Aggregator, AveragePolicy, Campaign, CampaignConfig, DatasetWriter, DateId, MatrixEnumerator,
    ReportScanner, Selection, SystemRunner, build_report,
};

#[derive(Debug, Parser)]
pub struct ConfigArgs {
    /// Campaign file (TOML); built-in defaults are used when omitted
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl ConfigArgs {
    fn load(&self) -> Result<CampaignConfig> {
        match &self.config {
            Some(path) => Ok(CampaignConfig::load(path)?),
            None => {
                let config = CampaignConfig::default();
                config.validate()?;
                Ok(config)
            }
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a benchmark campaign
    Run {
        #[command(flatten)]
        config: ConfigArgs,

        /// One-line description of this run, e.g. the server's association
        /// configuration (read from stdin when omitted)
        description: Vec<String>,
    },

    /// Print the cells a campaign would run, without running anything
    Plan {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Aggregate the logs of a campaign into plotting datasets
    Report {
        /// Campaign date (YYYYMMDD-HHMMSS); required when the log directory
        /// holds more than one campaign
        date: Option<DateId>,

        /// Log directory
        #[arg(long, default_value = "logs")]
        logs: PathBuf,

        /// Output directory for the .dat files (cleared first)
        #[arg(long = "plot-dir", default_value = "gnuplot")]
        plot_dir: PathBuf,

        /// Drop the lowest and highest sample of each cell before averaging
        #[arg(long)]
        trim: bool,
    },
}

#[derive(Debug, Parser)]
#[command(name = "alphatest", author, version, about)]
struct Cli {
    /// Log filter, e.g. "debug" or "alphatest=trace" (overrides RUST_LOG)
    #[arg(long = "log-level", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match cli.cmd {
        Commands::Run {
            config,
            description,
        } => cmd_run(config, description),
        Commands::Plan { config } => cmd_plan(config),
        Commands::Report {
            date,
            logs,
            plot_dir,
            trim,
        } => cmd_report(date, logs, plot_dir, trim),
    }
}

/// `alphatest run [--config FILE] [DESCRIPTION...]`
fn cmd_run(args: ConfigArgs, description: Vec<String>) -> Result<()> {
    let config = args.load()?;
    // Checked before prompting so a typo does not cost a description
    if !config.output.is_dir() {
        return Err(alphatest::CampaignError::MissingOutputDir(config.output.clone()).into());
    }

    let runner = SystemRunner::new();
    let campaign = Campaign::new(&config, &runner);
    print!("{}", campaign.banner());

    let description = if description.is_empty() {
        println!("Please enter a short one-line description of this test run,");
        println!("for example, the servers association configuration, etc.:");
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("failed to read description")?;
        line
    } else {
        let description = description.join(" ");
        println!("Setting description:");
        println!("{description}");
        description
    };

    let summary = campaign.run(&description)?;
    eprintln!(
        "Campaign {}: {} runs, {} logs, description in {}",
        summary.date,
        summary.cells,
        summary.logs.len(),
        summary.description_log.display()
    );
    Ok(())
}

/// `alphatest plan [--config FILE]`
fn cmd_plan(args: ConfigArgs) -> Result<()> {
    let config = args.load()?;
    let date = DateId::now();
    let enumerator = MatrixEnumerator::new(&config);

    println!("{} runs against {}", enumerator.len(), config.server);
    for cell in enumerator.cells() {
        let depth = cell
            .tree_depth
            .map_or_else(|| "-".to_string(), |d| d.to_string());
        println!(
            "{:<6} n={:<4} depth={:<4} run={:<3} {}",
            cell.mode,
            cell.associations,
            depth,
            cell.repeat,
            config.output.join(cell.log_name(&date).to_string()).display()
        );
    }
    Ok(())
}

/// `alphatest report [--logs DIR] [--plot-dir DIR] [--trim] [DATE]`
fn cmd_report(date: Option<DateId>, logs: PathBuf, plot_dir: PathBuf, trim: bool) -> Result<()> {
    let scanner = ReportScanner::new(&logs);

    let date = match scanner.select(date.as_ref())? {
        Selection::Selected(date) => date,
        Selection::NoCampaigns => {
            println!("No campaign logs found in {}", logs.display());
            return Ok(());
        }
        Selection::Ambiguous(candidates) => {
            println!("Please specify a test date. Possible values:");
            for candidate in candidates {
                match candidate.description {
                    Some(desc) => println!("* {} ({})", candidate.date, desc),
                    None => println!("* {}", candidate.date),
                }
            }
            return Ok(());
        }
    };

    let policy = if trim {
        AveragePolicy::TrimmedMean
    } else {
        AveragePolicy::Mean
    };
    let report = build_report(&scanner, &date, &Aggregator::new(policy))?;
    if report.is_empty() {
        println!("No logs for {date} in {}", logs.display());
        return Ok(());
    }

    println!("\nReport for {}\n", report.date);
    if let Some(description) = &report.description {
        println!("{description}");
    }
    println!();

    let stdout = io::stdout();
    let written = DatasetWriter::new(plot_dir).write_all(&report.series, &mut stdout.lock())?;
    tracing::info!(datasets = written.len(), "report written");

    Ok(())
}
