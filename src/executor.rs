use anyhow::{Context, Result, anyhow};
use chrono::Local;
use std::path::Path;
use tracing::{debug, warn};

use crate::config::{CampaignConfig, split_args};
use crate::matrix::TestCell;
use crate::process::{Invocation, Output, ProcessRunner, append_line};

/// Forced termination attempts during teardown
pub const FORCE_KILL_ATTEMPTS: u8 = 5;

/// Teardown progress between two cells.
///
/// Every state advances unconditionally; no step looks at whether the
/// previous one succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownState {
    Running,
    SignalSent,
    ForceSignaling(u8),
    SocketCleared,
    Idle,
}

/// Drives the subject from any state to `Idle`
pub struct Teardown<'a, R: ProcessRunner + ?Sized> {
    config: &'a CampaignConfig,
    runner: &'a R,
}

impl<'a, R: ProcessRunner + ?Sized> Teardown<'a, R> {
    pub fn new(config: &'a CampaignConfig, runner: &'a R) -> Self {
        Self { config, runner }
    }

    /// Perform the action leaving `state` and return the state reached
    pub fn step(&self, state: TeardownState) -> TeardownState {
        match state {
            TeardownState::Running => {
                self.quietly(&self.kill(false));
                TeardownState::SignalSent
            }
            TeardownState::SignalSent => {
                self.quietly(&self.kill(true));
                TeardownState::ForceSignaling(1)
            }
            TeardownState::ForceSignaling(attempt) if attempt < FORCE_KILL_ATTEMPTS => {
                self.quietly(&self.kill(true));
                TeardownState::ForceSignaling(attempt + 1)
            }
            TeardownState::ForceSignaling(_) => {
                // Our own child may have escaped killall; it must be gone
                // before the socket is removed
                self.runner.reap();
                self.quietly(
                    &Invocation::new(&self.config.tools.remove)
                        .arg("-f")
                        .arg(self.config.socket_file.to_string_lossy()),
                );
                TeardownState::SocketCleared
            }
            TeardownState::SocketCleared | TeardownState::Idle => TeardownState::Idle,
        }
    }

    /// Run every step from `Running` to `Idle`, returning the states visited
    pub fn run(&self) -> Vec<TeardownState> {
        let mut state = TeardownState::Running;
        let mut visited = vec![state];
        while state != TeardownState::Idle {
            state = self.step(state);
            visited.push(state);
        }
        visited
    }

    fn kill(&self, forced: bool) -> Invocation {
        let inv = Invocation::new(&self.config.tools.kill);
        let inv = if forced { inv.arg("-9") } else { inv };
        inv.arg(self.config.subject_process_name())
    }

    fn quietly(&self, invocation: &Invocation) {
        match self.runner.run(invocation, Output::Discard) {
            Ok(code) => debug!(%invocation, ?code, "teardown step"),
            Err(e) => debug!(%invocation, error = %e, "teardown step failed"),
        }
    }
}

/// Executes single test cells against the subject
pub struct RunExecutor<'a, R: ProcessRunner + ?Sized> {
    config: &'a CampaignConfig,
    runner: &'a R,
}

impl<'a, R: ProcessRunner + ?Sized> RunExecutor<'a, R> {
    pub fn new(config: &'a CampaignConfig, runner: &'a R) -> Self {
        Self { config, runner }
    }

    /// Subject command line for a cell
    pub fn subject_invocation(&self, cell: &TestCell) -> Result<Invocation> {
        let slot = self
            .config
            .association_slot(&cell.mode, cell.associations)
            .ok_or_else(|| anyhow!("mode {} is not configured", cell.mode))?;

        let mut inv =
            Invocation::new(&self.config.tools.subject).args(split_args(&self.config.subject_args));
        if let Some(depth) = cell.tree_depth {
            inv = inv.arg("-t").arg(depth.to_string());
        }
        Ok(inv
            .arg("-d")
            .arg("-c")
            .arg(self.config.subject_config.to_string_lossy())
            .arg("-n")
            .arg(slot))
    }

    pub fn ping_invocation(&self) -> Invocation {
        Invocation::new(&self.config.tools.ping)
            .arg(&self.config.server)
            .arg("-c")
            .arg(self.config.pings.to_string())
    }

    pub fn throughput_invocation(&self) -> Invocation {
        Invocation::new(&self.config.tools.throughput)
            .arg("-c")
            .arg(&self.config.server)
            .args(split_args(&self.config.throughput_args))
    }

    /// Run one cell, appending everything to `log`.
    ///
    /// Tool failures never fail the cell; only errors writing the log itself
    /// are returned. Teardown always runs.
    pub fn execute(&self, cell: &TestCell, log: &Path) -> Result<()> {
        let subject = self.subject_invocation(cell)?;

        append_line(log, &self.header(cell))
            .with_context(|| format!("failed to write log {}", log.display()))?;

        if let Err(e) = self.runner.spawn_detached(&subject, Output::AppendTo(log)) {
            warn!(invocation = %subject, error = %e, "failed to launch subject");
        }
        self.run_tool(&self.ping_invocation(), log);
        self.run_tool(&self.throughput_invocation(), log);

        Teardown::new(self.config, self.runner).run();

        append_line(log, "")
            .with_context(|| format!("failed to write log {}", log.display()))?;
        Ok(())
    }

    fn header(&self, cell: &TestCell) -> String {
        let template = self.config.modes.get(&cell.mode).map_or("", String::as_str);
        let depth = cell
            .tree_depth
            .map_or_else(|| "nil".to_string(), |d| d.to_string());

        format!(
            "[{}] Starting run {}. mode={}, associations={} x={}, treedepth={}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            cell.repeat,
            cell.mode,
            template,
            cell.associations,
            depth
        )
    }

    fn run_tool(&self, invocation: &Invocation, log: &Path) {
        match self.runner.run(invocation, Output::AppendTo(log)) {
            Ok(code) => debug!(%invocation, ?code, "tool finished"),
            Err(e) => warn!(%invocation, error = %e, "failed to launch tool"),
        }
    }
}
