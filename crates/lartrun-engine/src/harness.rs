//! The bounded verification pipeline.
//!
//! `Configured → Preprocessed → Compiled → Executing(bound) → Classified →
//! (WitnessReady | Done)`. Every failure after configuration is absorbed
//! into the [`AnalysisResult`]; [`Harness::run`] itself never fails.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use lartrun_report::diagnostics::ReportSource;
use lartrun_report::{AnalysisResult, ResultCause, VerificationResult};
use lartrun_witness::{check_witness, write_witness, WitnessContext, WitnessDocument};
use miette::Diagnostic;
use serde::Serialize;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigError};
use crate::preprocess::{self, PreprocessSummary};
use crate::process::{ProcessRunner, RunSpec};

pub const PREPROCESSED_FILE: &str = "benchmark.c";
pub const COMPILED_FILE: &str = "abstracted";
pub const WITNESS_FILE_NAME: &str = "witness.graphml";

pub const BOUND_ENV: &str = "LART_CHOOSE_BOUND";
pub const DFSAN_OPTIONS_ENV: &str = "DFSAN_OPTIONS";
pub const DFSAN_OPTIONS: &str = "warn_unimplemented=0";
pub const BACKTRACE_ENV: &str = "LART_ERROR_BACKTRACE";
pub const TRACE_MODEL_ENV: &str = "TERM_TRACE_MODEL";

/// Lines of compiler stderr kept in a compilation failure message.
const COMPILE_LOG_EXCERPT: usize = 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WitnessMode {
    Off,
    /// Emit when the result is `true` or `false`.
    #[default]
    Auto,
    /// Always emit a correctness witness.
    Correctness,
}

impl WitnessMode {
    pub fn as_str(self) -> &'static str {
        match self {
            WitnessMode::Off => "off",
            WitnessMode::Auto => "auto",
            WitnessMode::Correctness => "correctness",
        }
    }
}

impl fmt::Display for WitnessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WitnessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "off" | "none" => Ok(WitnessMode::Off),
            "auto" => Ok(WitnessMode::Auto),
            "correctness" => Ok(WitnessMode::Correctness),
            other => Err(format!(
                "unknown witness mode '{other}' (expected off, auto or correctness)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessOptions {
    /// Work directory; a private temporary directory when unset.
    pub workdir: Option<PathBuf>,
    pub witness: WitnessMode,
    /// Where `witness.graphml` goes; the current directory when unset.
    pub witness_dir: Option<PathBuf>,
    pub initial_bound: u64,
    pub bound_step: u64,
    /// Stop escalating past this bound. Unbounded when unset.
    pub max_bound: Option<u64>,
    /// Mirror the verified program's stderr while it runs.
    pub echo: bool,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            workdir: None,
            witness: WitnessMode::Auto,
            witness_dir: None,
            initial_bound: 10,
            bound_step: 50,
            max_bound: None,
            echo: false,
        }
    }
}

/// One execution of the compiled program at a fixed bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundAttempt {
    pub bound: u64,
    pub result: VerificationResult,
    pub cause: ResultCause,
    /// Recorded for reporting only.
    pub exit_code: Option<i32>,
}

/// Last stage the pipeline reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HarnessStage {
    Configured,
    Preprocessed,
    Classified,
    WitnessReady,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HarnessOutcome {
    pub analysis: AnalysisResult,
    pub attempts: Vec<BoundAttempt>,
    pub witness: Option<PathBuf>,
    pub stage: HarnessStage,
}

impl HarnessOutcome {
    fn halted(analysis: AnalysisResult, stage: HarnessStage) -> Self {
        Self {
            analysis,
            attempts: Vec::new(),
            witness: None,
            stage,
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    #[error("cannot prepare work directory: {0}")]
    #[diagnostic(code(lartrun::harness::workdir))]
    Workdir(#[source] io::Error),
    #[error("cannot resolve compiler path {path}: {source}")]
    #[diagnostic(code(lartrun::harness::compiler))]
    Compiler {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug)]
enum Workdir {
    Owned(TempDir),
    Borrowed(PathBuf),
}

impl Workdir {
    fn path(&self) -> &Path {
        match self {
            Workdir::Owned(dir) => dir.path(),
            Workdir::Borrowed(path) => path,
        }
    }
}

/// Runs one verification task.
#[derive(Debug)]
pub struct Harness {
    config: Config,
    options: HarnessOptions,
    workdir: Workdir,
    runner: ProcessRunner,
}

impl Harness {
    /// Validate `config` and prepare the work directory.
    ///
    /// Children run inside the work directory, so the work directory and a
    /// compiler given by path are made absolute here. A bare compiler name
    /// is left to the `PATH` lookup.
    pub fn new(mut config: Config, options: HarnessOptions) -> Result<Self, HarnessError> {
        config.validate()?;
        if config.lartcc.components().count() > 1 {
            let resolved = std::path::absolute(&config.lartcc).map_err(|source| HarnessError::Compiler {
                path: config.lartcc.clone(),
                source,
            })?;
            config.lartcc = resolved;
        }
        let workdir = match &options.workdir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(HarnessError::Workdir)?;
                Workdir::Borrowed(std::path::absolute(dir).map_err(HarnessError::Workdir)?)
            }
            None => Workdir::Owned(
                tempfile::Builder::new()
                    .prefix("lartrun-")
                    .tempdir()
                    .map_err(HarnessError::Workdir)?,
            ),
        };
        let runner = ProcessRunner::with_scratch_root(workdir.path());
        Ok(Self {
            config,
            options,
            workdir,
            runner,
        })
    }

    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run(&mut self) -> HarnessOutcome {
        info!("Verifying {}...", self.config.benchmark.display());

        let summary = match self.preprocess() {
            Ok(summary) => summary,
            Err(e) => {
                warn!("preprocessing failed: {e}");
                let analysis = AnalysisResult::unknown(
                    ResultCause::EnvironmentError,
                    format!("cannot preprocess {}: {e}", self.config.benchmark.display()),
                );
                return HarnessOutcome::halted(analysis, HarnessStage::Configured);
            }
        };

        let artifact = match self.compile() {
            Ok(artifact) => artifact,
            Err(analysis) => return HarnessOutcome::halted(analysis, HarnessStage::Preprocessed),
        };

        let (analysis, attempts) = self.execute(&artifact);
        let mut outcome = HarnessOutcome {
            analysis,
            attempts,
            witness: None,
            stage: HarnessStage::Classified,
        };
        info!("{}", outcome.analysis.render_line(true));

        if let Some(path) = self.emit_witness(&outcome.analysis, &summary) {
            outcome.witness = Some(path);
            outcome.stage = HarnessStage::WitnessReady;
        }
        outcome
    }

    fn preprocess(&mut self) -> io::Result<PreprocessSummary> {
        let output = self.workdir().join(PREPROCESSED_FILE);
        remove_stale(&output)?;
        info!("Preprocessing into {}...", output.display());
        let summary = preprocess::preprocess_file(&self.config.benchmark, &output, &mut self.config.flags)?;
        debug!("benchmark flags: {:?}", self.config.flags);
        Ok(summary)
    }

    /// Compile the preprocessed source; the error side is the final result.
    fn compile(&self) -> Result<PathBuf, AnalysisResult> {
        let source = self.workdir().join(PREPROCESSED_FILE);
        let artifact = self.workdir().join(COMPILED_FILE);
        let spec = RunSpec::new(&self.config.lartcc)
            .args(self.config.compile_args(&source, &artifact))
            .current_dir(self.workdir());
        if let Err(e) = remove_stale(&artifact) {
            warn!("cannot remove stale {}: {e}", artifact.display());
            return Err(AnalysisResult::unknown(
                ResultCause::EnvironmentError,
                format!("cannot remove stale {}: {e}", artifact.display()),
            ));
        }
        info!("Compiling with {}...", self.config.lartcc.display());

        let log = self
            .runner
            .run_scoped(&spec, |a| match a.read_stderr() {
                Ok(log) => log,
                Err(e) => {
                    warn!("cannot read compiler log: {e}");
                    String::new()
                }
            })
            .map_err(|e| AnalysisResult::compilation_failed(e.to_string()))?;

        if !artifact.is_file() {
            let excerpt: Vec<&str> = log.lines().take(COMPILE_LOG_EXCERPT).collect();
            let message = if excerpt.is_empty() {
                format!("{} was not produced", artifact.display())
            } else {
                excerpt.join("\n")
            };
            warn!("compilation failed: {} missing", artifact.display());
            return Err(AnalysisResult::compilation_failed(message));
        }
        Ok(artifact)
    }

    fn run_spec(&self, artifact: &Path, bound: u64) -> RunSpec {
        let mut spec = RunSpec::new(artifact)
            .current_dir(self.workdir())
            .env(DFSAN_OPTIONS_ENV, DFSAN_OPTIONS)
            .env(BACKTRACE_ENV, "ON")
            .env(BOUND_ENV, bound.to_string())
            .echo(self.options.echo);
        if self.config.flags.symbolic {
            spec = spec.env(TRACE_MODEL_ENV, "ON");
        }
        spec
    }

    /// Run at escalating bounds until the result stops being bound-limited.
    fn execute(&self, artifact: &Path) -> (AnalysisResult, Vec<BoundAttempt>) {
        let with_model = self.config.flags.symbolic;
        let mut attempts = Vec::new();
        let mut bound = self.options.initial_bound;

        loop {
            info!("Running with bound {bound}...");
            let spec = self.run_spec(artifact, bound);
            let (analysis, exit_code) = match self.runner.run_scoped(&spec, |a| {
                let source = ReportSource::read(a.stderr_path);
                let analysis = AnalysisResult::from_source(&source, &self.config.properties, with_model);
                (analysis, a.exit_code())
            }) {
                Ok(done) => done,
                Err(e) => {
                    warn!("{e}");
                    (AnalysisResult::unknown(ResultCause::EnvironmentError, e.to_string()), None)
                }
            };
            attempts.push(BoundAttempt {
                bound,
                result: analysis.result(),
                cause: analysis.cause(),
                exit_code,
            });

            if analysis.cause() != ResultCause::BoundReached {
                return (analysis, attempts);
            }
            let next = match bound.checked_add(self.options.bound_step) {
                Some(next) if self.options.bound_step > 0 => next,
                _ => return (analysis, attempts),
            };
            if self.options.max_bound.is_some_and(|max| next > max) {
                info!("bound {next} exceeds the maximum, giving up");
                return (analysis, attempts);
            }
            bound = next;
        }
    }

    fn witness_path(&self) -> PathBuf {
        match &self.options.witness_dir {
            Some(dir) => dir.join(WITNESS_FILE_NAME),
            None => PathBuf::from(WITNESS_FILE_NAME),
        }
    }

    fn emit_witness(&self, analysis: &AnalysisResult, summary: &PreprocessSummary) -> Option<PathBuf> {
        let force_correctness = match self.options.witness {
            WitnessMode::Off => return None,
            WitnessMode::Auto => false,
            WitnessMode::Correctness => true,
        };
        if !force_correctness && !analysis.can_generate_witness() {
            debug!("no witness for result {}", analysis.result());
            return None;
        }

        let context = match WitnessContext::for_program(
            &self.config.benchmark,
            self.config.architecture.bits(),
            self.config.property_strings.clone(),
            summary.line_offset,
        ) {
            Ok(context) => context,
            Err(e) => {
                warn!("{e}");
                return None;
            }
        };
        let document = WitnessDocument::for_result(&context, analysis, force_correctness)?;
        for issue in check_witness(&document) {
            warn!("witness issue {}: {}", issue.code, issue.message);
        }

        let path = self.witness_path();
        match write_witness(&document, &path) {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("{e}");
                None
            }
        }
    }
}

/// Drop an output left behind by an earlier run in a reused work directory.
fn remove_stale(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lartrun_report::taxonomy::Property;

    fn config() -> Config {
        let mut config = Config::new("/opt/lart/lartcc", "main.c");
        config.add_property(Property::Reach).unwrap();
        config
    }

    #[test]
    fn witness_mode_round_trips_through_text() {
        for mode in [WitnessMode::Off, WitnessMode::Auto, WitnessMode::Correctness] {
            assert_eq!(mode.as_str().parse::<WitnessMode>().unwrap(), mode);
        }
        assert!("sometimes".parse::<WitnessMode>().is_err());
    }

    #[test]
    fn default_bounds_escalate_from_ten_by_fifty() {
        let options = HarnessOptions::default();
        assert_eq!(options.initial_bound, 10);
        assert_eq!(options.bound_step, 50);
        assert_eq!(options.max_bound, None);
        assert_eq!(options.witness, WitnessMode::Auto);
    }

    #[test]
    fn config_without_properties_is_rejected() {
        let err = Harness::new(Config::new("lartcc", "main.c"), HarnessOptions::default()).unwrap_err();
        assert!(matches!(err, HarnessError::Config(ConfigError::NoProperty)));
    }

    #[test]
    fn compiler_given_by_path_is_made_absolute() {
        let mut relative = config();
        relative.lartcc = PathBuf::from("./bin/lartcc");
        let harness = Harness::new(relative, HarnessOptions::default()).unwrap();
        assert!(harness.config().lartcc.is_absolute());
        assert!(harness.config().lartcc.ends_with("bin/lartcc"));

        let mut bare = config();
        bare.lartcc = PathBuf::from("lartcc");
        let harness = Harness::new(bare, HarnessOptions::default()).unwrap();
        assert_eq!(harness.config().lartcc, PathBuf::from("lartcc"));
    }

    #[test]
    fn remove_stale_tolerates_absent_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(COMPILED_FILE);
        remove_stale(&path).unwrap();
        std::fs::write(&path, "old").unwrap();
        remove_stale(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn owned_workdir_is_released_on_drop() {
        let harness = Harness::new(config(), HarnessOptions::default()).unwrap();
        let dir = harness.workdir().to_path_buf();
        assert!(dir.is_dir());
        drop(harness);
        assert!(!dir.exists());
    }

    #[test]
    fn run_environment_is_set_on_the_child_only() {
        let workdir = tempfile::tempdir().unwrap();
        let options = HarnessOptions {
            workdir: Some(workdir.path().to_path_buf()),
            ..HarnessOptions::default()
        };
        let mut harness = Harness::new(config(), options).unwrap();
        let spec = harness.run_spec(Path::new("abstracted"), 60);
        let env: Vec<(String, String)> = spec
            .env
            .iter()
            .map(|(k, v)| (k.to_string_lossy().into_owned(), v.to_string_lossy().into_owned()))
            .collect();
        assert!(env.contains(&(BOUND_ENV.to_string(), "60".to_string())));
        assert!(env.contains(&(DFSAN_OPTIONS_ENV.to_string(), DFSAN_OPTIONS.to_string())));
        assert!(env.contains(&(BACKTRACE_ENV.to_string(), "ON".to_string())));
        assert!(!env.iter().any(|(k, _)| k == TRACE_MODEL_ENV));
        assert_eq!(spec.cwd.as_deref(), Some(workdir.path()));

        harness.config.flags.symbolic = true;
        let spec = harness.run_spec(Path::new("abstracted"), 10);
        assert!(spec.env.iter().any(|(k, _)| k == TRACE_MODEL_ENV));
        assert!(std::env::var_os(BOUND_ENV).is_none());
    }

    #[test]
    fn missing_benchmark_is_an_environment_error() {
        let workdir = tempfile::tempdir().unwrap();
        let mut config = config();
        config.benchmark = workdir.path().join("absent.c");
        let options = HarnessOptions {
            workdir: Some(workdir.path().to_path_buf()),
            ..HarnessOptions::default()
        };
        let outcome = Harness::new(config, options).unwrap().run();
        assert_eq!(outcome.analysis.cause(), ResultCause::EnvironmentError);
        assert_eq!(outcome.stage, HarnessStage::Configured);
        assert!(outcome.attempts.is_empty());
        assert!(outcome.witness.is_none());
    }

    #[test]
    fn missing_compiler_halts_with_compilation_failed() {
        let workdir = tempfile::tempdir().unwrap();
        std::fs::write(workdir.path().join("main.c"), "int main() { return 0; }\n").unwrap();
        let mut config = config();
        config.lartcc = workdir.path().join("no-such-lartcc");
        config.benchmark = workdir.path().join("main.c");
        let options = HarnessOptions {
            workdir: Some(workdir.path().to_path_buf()),
            witness: WitnessMode::Off,
            ..HarnessOptions::default()
        };
        let outcome = Harness::new(config, options).unwrap().run();
        assert_eq!(outcome.analysis.cause(), ResultCause::CompilationFailed);
        assert_eq!(outcome.stage, HarnessStage::Preprocessed);
        assert!(outcome.attempts.is_empty());
    }
}
