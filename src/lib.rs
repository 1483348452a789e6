//! Benchmark campaigns against the ALPHA daemon.
//!
//! A campaign walks a matrix of modes, association counts and optionally
//! tree depths, runs the daemon plus ping and iperf for every cell, and
//! appends everything to one log per cell. The report pass later rebuilds
//! the matrix from the log file names alone and turns the iperf bandwidth
//! lines into plotting datasets.

pub mod campaign;
pub mod config;
pub mod executor;
pub mod logname;
pub mod matrix;
pub mod process;
pub mod report;

// Re-export main types for public API
pub use campaign::{Campaign, CampaignError, CampaignSummary, DescriptionLog};
pub use config::{CampaignConfig, ConfigError, ToolPaths};
pub use executor::{RunExecutor, Teardown, TeardownState};
pub use logname::{CellLogName, DateId, LogName, LogNameError, SeriesKey, Sweep};
pub use matrix::{MatrixEnumerator, TestCell};
pub use process::{Invocation, Output, ProcessRunner, RecordingRunner, SystemRunner};
pub use report::{
    Report,
    aggregate::{AggregatedSeries, Aggregator, AveragePolicy, Statistic},
    build_report,
    dataset::DatasetWriter,
    extract::{ExtractError, extract_samples},
    scanner::{Candidate, Matrix, ReportScanner, Selection},
};
