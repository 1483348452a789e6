use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use tracing::debug;

/// A program plus its arguments. Never passed through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Where a child's combined stdout and stderr go
#[derive(Debug, Clone, Copy)]
pub enum Output<'a> {
    /// Appended to the file, which is created if missing
    AppendTo(&'a Path),
    Discard,
}

/// Capability to start external programs.
///
/// Exit statuses are reported but callers in this crate never act on them;
/// a tool that fails leaves only its own output behind.
pub trait ProcessRunner {
    /// Run to completion. Returns the exit code, or `None` if the child was
    /// killed by a signal.
    fn run(&self, invocation: &Invocation, output: Output<'_>) -> io::Result<Option<i32>>;

    /// Start without waiting for the child to finish
    fn spawn_detached(&self, invocation: &Invocation, output: Output<'_>) -> io::Result<()>;

    /// Collect detached children that have exited, killing any still alive
    fn reap(&self) {}
}

/// Runs programs for real through `std::process::Command`
#[derive(Debug, Default)]
pub struct SystemRunner {
    detached: RefCell<Vec<Child>>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn command(invocation: &Invocation, output: Output<'_>) -> io::Result<Command> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args).stdin(Stdio::null());

        match output {
            Output::AppendTo(path) => {
                let file = open_append(path)?;
                let stderr = file.try_clone()?;
                cmd.stdout(file).stderr(stderr);
            }
            Output::Discard => {
                cmd.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        Ok(cmd)
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation, output: Output<'_>) -> io::Result<Option<i32>> {
        let status = Self::command(invocation, output)?.status()?;
        Ok(status.code())
    }

    fn spawn_detached(&self, invocation: &Invocation, output: Output<'_>) -> io::Result<()> {
        let child = Self::command(invocation, output)?.spawn()?;
        debug!(pid = child.id(), program = %invocation.program.display(), "spawned detached");
        self.detached.borrow_mut().push(child);
        Ok(())
    }

    fn reap(&self) {
        for mut child in self.detached.borrow_mut().drain(..) {
            let pid = child.id();
            match child.try_wait() {
                Ok(Some(status)) => debug!(pid, %status, "detached child exited"),
                Ok(None) => {
                    // Still alive after teardown; make sure it is gone before the next cell
                    let _ = child.kill();
                    let _ = child.wait();
                    debug!(pid, "killed lingering detached child");
                }
                Err(e) => debug!(pid, error = %e, "failed to poll detached child"),
            }
        }
    }
}

/// Open a log for appending, creating it if needed
pub fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Append a single line to a log
pub fn append_line(path: &Path, line: &str) -> io::Result<()> {
    let mut file = open_append(path)?;
    writeln!(file, "{line}")
}

/// One invocation seen by [`RecordingRunner`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub invocation: Invocation,
    pub detached: bool,
    /// Log the output would have been appended to
    pub log: Option<PathBuf>,
}

/// Test double that records invocations instead of executing them.
///
/// Canned output registered with [`RecordingRunner::with_output`] is appended
/// to the log exactly as a real tool's output would be, and programs marked
/// with [`RecordingRunner::failing`] fail to start.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: RefCell<Vec<Recorded>>,
    reaps: RefCell<Vec<usize>>,
    outputs: HashMap<PathBuf, String>,
    failing: HashSet<PathBuf>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, program: impl Into<PathBuf>, output: impl Into<String>) -> Self {
        self.outputs.insert(program.into(), output.into());
        self
    }

    pub fn failing(mut self, program: impl Into<PathBuf>) -> Self {
        self.failing.insert(program.into());
        self
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.borrow().clone()
    }

    /// Number of invocations recorded before each reap
    pub fn reaps(&self) -> Vec<usize> {
        self.reaps.borrow().clone()
    }

    /// Invocations of a single program, in order
    pub fn calls_to(&self, program: impl AsRef<Path>) -> Vec<Invocation> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.invocation.program == program.as_ref())
            .map(|call| call.invocation.clone())
            .collect()
    }

    fn record(
        &self,
        invocation: &Invocation,
        output: Output<'_>,
        detached: bool,
    ) -> io::Result<()> {
        let log = match output {
            Output::AppendTo(path) => Some(path.to_path_buf()),
            Output::Discard => None,
        };
        self.calls.borrow_mut().push(Recorded {
            invocation: invocation.clone(),
            detached,
            log: log.clone(),
        });

        if self.failing.contains(&invocation.program) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", invocation.program.display()),
            ));
        }

        if let (Some(log), Some(text)) = (log, self.outputs.get(&invocation.program)) {
            open_append(&log)?.write_all(text.as_bytes())?;
        }
        Ok(())
    }
}

impl ProcessRunner for RecordingRunner {
    fn run(&self, invocation: &Invocation, output: Output<'_>) -> io::Result<Option<i32>> {
        self.record(invocation, output, false).map(|()| Some(0))
    }

    fn spawn_detached(&self, invocation: &Invocation, output: Output<'_>) -> io::Result<()> {
        self.record(invocation, output, true)
    }

    fn reap(&self) {
        let seen = self.calls.borrow().len();
        self.reaps.borrow_mut().push(seen);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_display() {
        let inv = Invocation::new("/bin/ping").arg("10.0.0.1").args(["-c", "5"]);
        assert_eq!(inv.to_string(), "/bin/ping 10.0.0.1 -c 5");
    }

    #[test]
    fn test_recording_runner_appends_canned_output() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("cell.log");
        let runner = RecordingRunner::new()
            .with_output("/usr/bin/iperf", "Bandwidth\n")
            .failing("/bin/ping");

        append_line(&log, "header").unwrap();
        runner
            .run(&Invocation::new("/usr/bin/iperf"), Output::AppendTo(&log))
            .unwrap();
        assert!(
            runner
                .run(&Invocation::new("/bin/ping"), Output::AppendTo(&log))
                .is_err()
        );

        assert_eq!(std::fs::read_to_string(&log).unwrap(), "header\nBandwidth\n");
        assert_eq!(runner.calls().len(), 2);
        assert_eq!(runner.calls_to("/bin/ping").len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_appends_combined_output() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("cell.log");
        let runner = SystemRunner::new();

        append_line(&log, "first").unwrap();
        let code = runner
            .run(
                &Invocation::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]),
                Output::AppendTo(&log),
            )
            .unwrap();

        assert_eq!(code, Some(3));
        let text = std::fs::read_to_string(&log).unwrap();
        assert!(text.starts_with("first\n"));
        assert!(text.contains("out\n"));
        assert!(text.contains("err\n"));
    }

    #[test]
    fn test_system_runner_missing_program() {
        let runner = SystemRunner::new();
        let result = runner.run(
            &Invocation::new("/nonexistent/definitely-not-a-tool"),
            Output::Discard,
        );
        assert!(result.is_err());
    }
}
