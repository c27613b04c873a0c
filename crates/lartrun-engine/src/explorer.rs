//! Decision-path exploration.
//!
//! The explorer advances a single search frontier. Starting from the empty
//! path at depth 0, each step runs the target with the current path and
//! reads back the decisions it actually took. If the run reached a decision
//! beyond the frontier, the decision at the frontier is bumped to its next
//! value, the whole taken path becomes the next forced path and the depth
//! grows by one. Otherwise exploration stops.
//!
//! Sibling branches at shallower depths are never revisited, so not every
//! reachable path is enumerated. Depth strictly increases, which bounds the
//! number of runs by the number of decision points the target can reach.

use std::error::Error as StdError;
use std::ffi::OsString;
use std::path::PathBuf;

use lartrun_report::choice::ChoicePath;
use lartrun_report::diagnostics::ReportSource;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::process::{ProcessError, ProcessRunner, RunSpec};

/// Forced-path channel read by the target.
pub const PATH_ENV: &str = "LART_PATH";
/// Makes the target report every decision it takes.
pub const TRACE_CHOICES_ENV: &str = "LART_TRACE_CHOICES";

/// What one execution of the target revealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Execution {
    pub taken: ChoicePath,
    pub exit_code: Option<i32>,
}

/// Runs the target along a forced path.
pub trait PathExecutor {
    type Error: StdError + Send + Sync + 'static;

    fn execute(&mut self, path: &ChoicePath) -> Result<Execution, Self::Error>;
}

#[derive(Debug, Error)]
pub enum ExploreError {
    #[error("execution along path '{path}' failed: {source}")]
    Execution {
        path: ChoicePath,
        source: Box<dyn StdError + Send + Sync>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplorationStep {
    pub depth: usize,
    pub forced: ChoicePath,
    pub taken: ChoicePath,
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExplorationSummary {
    pub steps: Vec<ExplorationStep>,
    pub final_depth: usize,
}

pub struct DecisionPathExplorer<E> {
    executor: E,
}

impl<E: PathExecutor> DecisionPathExplorer<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn into_executor(self) -> E {
        self.executor
    }

    pub fn explore(&mut self) -> Result<ExplorationSummary, ExploreError> {
        let mut summary = ExplorationSummary::default();
        let mut path = ChoicePath::new();
        let mut depth = 0;

        loop {
            info!("running: {path}");
            let execution = self
                .executor
                .execute(&path)
                .map_err(|e| ExploreError::Execution {
                    path: path.clone(),
                    source: Box::new(e),
                })?;
            let next = if execution.taken.len() > depth {
                execution.taken.advanced_at(depth)
            } else {
                None
            };
            if next.is_none() && execution.taken.len() > depth {
                warn!("decision {depth} of '{}' cannot be advanced", execution.taken);
            }
            summary.steps.push(ExplorationStep {
                depth,
                forced: path,
                taken: execution.taken,
                exit_code: execution.exit_code,
            });

            match next {
                Some(advanced) => {
                    path = advanced;
                    depth += 1;
                }
                None => break,
            }
        }

        summary.final_depth = depth;
        Ok(summary)
    }
}

/// Knobs for running a real target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExplorerOptions {
    /// Arguments passed to the target on every run.
    pub args: Vec<OsString>,
    /// Mirror the target's stderr while it runs.
    pub echo: bool,
    /// Parent directory for per-run scratch directories.
    pub scratch_root: Option<PathBuf>,
}

/// Executes a real program, forcing the path through its environment.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    runner: ProcessRunner,
    program: PathBuf,
    options: ExplorerOptions,
}

impl ProcessExecutor {
    pub fn new(program: impl Into<PathBuf>, options: ExplorerOptions) -> Self {
        let runner = match &options.scratch_root {
            Some(root) => ProcessRunner::with_scratch_root(root),
            None => ProcessRunner::new(),
        };
        Self {
            runner,
            program: program.into(),
            options,
        }
    }

    fn spec(&self, path: &ChoicePath) -> RunSpec {
        RunSpec::new(&self.program)
            .args(self.options.args.iter().cloned())
            .env(PATH_ENV, path.to_string())
            .env(TRACE_CHOICES_ENV, "ON")
            .echo(self.options.echo)
    }
}

impl PathExecutor for ProcessExecutor {
    type Error = ProcessError;

    fn execute(&mut self, path: &ChoicePath) -> Result<Execution, ProcessError> {
        self.runner.run_scoped(&self.spec(path), |artifacts| {
            let taken = match ReportSource::read(artifacts.stderr_path) {
                ReportSource::Parsed(report) => report.choices,
                ReportSource::Missing => ChoicePath::new(),
                ReportSource::Unreadable(message) => {
                    warn!("no choices read: {message}");
                    ChoicePath::new()
                }
            };
            Execution {
                taken,
                exit_code: artifacts.exit_code(),
            }
        })
    }
}
