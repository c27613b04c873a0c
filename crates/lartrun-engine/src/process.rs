//! Subprocess execution with private output capture.
//!
//! Every launch gets its own scratch directory holding `exec.out` and
//! `exec.err`. The directory lives exactly as long as the [`RunHandle`]:
//! it is removed by [`RunHandle::close`], when the handle is dropped, and
//! when the program cannot be launched at all. Environment overlays are
//! applied to the child `Command` only; the parent environment is never
//! touched.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const STDOUT_FILE: &str = "exec.out";
pub const STDERR_FILE: &str = "exec.err";

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("cannot create scratch directory: {0}")]
    Scratch(#[source] io::Error),
    #[error("cannot create capture file {path}: {source}")]
    Capture { path: PathBuf, source: io::Error },
    #[error("cannot launch {program}: {source}")]
    Launch { program: String, source: io::Error },
    #[error("waiting for {program} failed: {source}")]
    Wait { program: String, source: io::Error },
    #[error("cannot read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot remove scratch directory {path}: {source}")]
    Cleanup { path: PathBuf, source: io::Error },
}

/// What to launch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Variables added to the child's environment.
    pub env: Vec<(OsString, OsString)>,
    pub cwd: Option<PathBuf>,
    /// Mirror stderr through `tracing` while the child runs.
    pub echo: bool,
}

impl RunSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    fn display_program(&self) -> String {
        self.program.display().to_string()
    }
}

/// Launches programs into private scratch directories.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    scratch_root: Option<PathBuf>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create scratch directories under `root` instead of the system
    /// temporary directory.
    pub fn with_scratch_root(root: impl Into<PathBuf>) -> Self {
        Self {
            scratch_root: Some(root.into()),
        }
    }

    fn scratch(&self) -> Result<TempDir, ProcessError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("lartrun-run-");
        match &self.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(ProcessError::Scratch)
    }

    /// Launch `spec` without waiting for it.
    pub fn spawn(&self, spec: &RunSpec) -> Result<RunHandle, ProcessError> {
        let scratch = self.scratch()?;
        let stdout_path = scratch.path().join(STDOUT_FILE);
        let stderr_path = scratch.path().join(STDERR_FILE);
        let stdout = create_capture(&stdout_path)?;
        let stderr = create_capture(&stderr_path)?;

        let program = spec.display_program();
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout));
        let echo_sink = if spec.echo {
            command.stderr(Stdio::piped());
            Some(stderr)
        } else {
            command.stderr(Stdio::from(stderr));
            None
        };
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        debug!("spawning {program} with {} args", spec.args.len());
        let mut child = command.spawn().map_err(|source| ProcessError::Launch {
            program: program.clone(),
            source,
        })?;

        let echo = match (child.stderr.take(), echo_sink) {
            (Some(pipe), Some(sink)) => match spawn_echo(&program, pipe, sink) {
                Ok(handle) => Some(handle),
                Err(source) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ProcessError::Launch { program, source });
                }
            },
            _ => None,
        };

        Ok(RunHandle {
            program,
            child,
            echo,
            status: None,
            scratch: Some(scratch),
            stdout_path,
            stderr_path,
        })
    }

    /// Launch, wait, hand the artifacts to `f`, and release the scratch
    /// directory before returning.
    pub fn run_scoped<T>(
        &self,
        spec: &RunSpec,
        f: impl FnOnce(&RunArtifacts<'_>) -> T,
    ) -> Result<T, ProcessError> {
        let mut handle = self.spawn(spec)?;
        let status = handle.wait()?;
        let value = f(&RunArtifacts {
            status,
            stdout_path: &handle.stdout_path,
            stderr_path: &handle.stderr_path,
        });
        if let Err(e) = handle.close() {
            warn!("{e}");
        }
        Ok(value)
    }
}

fn create_capture(path: &Path) -> Result<File, ProcessError> {
    File::create(path).map_err(|source| ProcessError::Capture {
        path: path.to_path_buf(),
        source,
    })
}

/// Drain `pipe` into `sink`, mirroring each line through `tracing`.
fn spawn_echo(program: &str, pipe: ChildStderr, mut sink: File) -> io::Result<JoinHandle<io::Result<()>>> {
    let name = Path::new(program)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string());
    thread::Builder::new()
        .name("lartrun-echo".to_string())
        .spawn(move || {
            let mut reader = BufReader::new(pipe);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                if reader.read_until(b'\n', &mut buf)? == 0 {
                    break;
                }
                sink.write_all(&buf)?;
                let line = String::from_utf8_lossy(&buf);
                info!("[{name}] {}", line.trim_end());
            }
            sink.flush()
        })
}

/// A launched program and its scratch directory.
#[derive(Debug)]
pub struct RunHandle {
    program: String,
    child: Child,
    echo: Option<JoinHandle<io::Result<()>>>,
    status: Option<ExitStatus>,
    scratch: Option<TempDir>,
    stdout_path: PathBuf,
    stderr_path: PathBuf,
}

impl RunHandle {
    /// Block until the program exits. Repeated calls return the same status.
    pub fn wait(&mut self) -> Result<ExitStatus, ProcessError> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        let status = self.child.wait().map_err(|source| ProcessError::Wait {
            program: self.program.clone(),
            source,
        })?;
        self.status = Some(status);
        self.join_echo();
        Ok(status)
    }

    fn join_echo(&mut self) {
        if let Some(echo) = self.echo.take() {
            match echo.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("stderr echo of {} failed: {e}", self.program),
                Err(_) => warn!("stderr echo of {} panicked", self.program),
            }
        }
    }

    pub fn read_stdout(&self) -> Result<String, ProcessError> {
        read_capture(&self.stdout_path)
    }

    pub fn read_stderr(&self) -> Result<String, ProcessError> {
        read_capture(&self.stderr_path)
    }

    pub fn stdout_path(&self) -> &Path {
        &self.stdout_path
    }

    pub fn stderr_path(&self) -> &Path {
        &self.stderr_path
    }

    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch.as_ref().map(TempDir::path)
    }

    /// Wait for the program if still running, then remove the scratch
    /// directory, reporting removal errors.
    pub fn close(mut self) -> Result<(), ProcessError> {
        if self.status.is_none() {
            self.wait()?;
        }
        match self.scratch.take() {
            Some(scratch) => {
                let path = scratch.path().to_path_buf();
                scratch
                    .close()
                    .map_err(|source| ProcessError::Cleanup { path, source })
            }
            None => Ok(()),
        }
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        if self.status.is_none() {
            let _ = self.child.kill();
            let _ = self.child.wait();
            self.join_echo();
        }
    }
}

/// Byproducts of a finished run, valid while the scratch directory exists.
#[derive(Debug, Clone, Copy)]
pub struct RunArtifacts<'a> {
    pub status: ExitStatus,
    pub stdout_path: &'a Path,
    pub stderr_path: &'a Path,
}

impl RunArtifacts<'_> {
    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }

    pub fn read_stdout(&self) -> Result<String, ProcessError> {
        read_capture(self.stdout_path)
    }

    pub fn read_stderr(&self) -> Result<String, ProcessError> {
        read_capture(self.stderr_path)
    }
}

fn read_capture(path: &Path) -> Result<String, ProcessError> {
    let bytes = fs::read(path).map_err(|source| ProcessError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> RunSpec {
        RunSpec::new("/bin/sh").arg("-c").arg(script)
    }

    fn entries(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn captures_both_streams_and_exit_status() {
        let runner = ProcessRunner::new();
        let mut handle = runner.spawn(&sh("echo out; echo err >&2; exit 3")).unwrap();
        let status = handle.wait().unwrap();
        assert_eq!(status.code(), Some(3));
        assert_eq!(handle.read_stdout().unwrap(), "out\n");
        assert_eq!(handle.read_stderr().unwrap(), "err\n");
        assert_eq!(handle.wait().unwrap().code(), Some(3));
        handle.close().unwrap();
    }

    #[test]
    fn env_overlay_reaches_only_the_child() {
        let runner = ProcessRunner::new();
        let spec = sh("printf %s \"$LARTRUN_PROCESS_TEST\"").env("LARTRUN_PROCESS_TEST", "1-2-3");
        let out = runner.run_scoped(&spec, |a| a.read_stdout().unwrap()).unwrap();
        assert_eq!(out, "1-2-3");
        assert!(std::env::var_os("LARTRUN_PROCESS_TEST").is_none());
    }

    #[test]
    fn scratch_is_released_after_close_and_drop() {
        let root = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::with_scratch_root(root.path());

        let mut handle = runner.spawn(&sh("true")).unwrap();
        handle.wait().unwrap();
        let scratch = handle.scratch_dir().unwrap().to_path_buf();
        assert!(scratch.join(STDERR_FILE).exists());
        handle.close().unwrap();
        assert!(!scratch.exists());

        let handle = runner.spawn(&sh("sleep 5")).unwrap();
        drop(handle);
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn scratch_is_released_when_launch_fails() {
        let root = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::with_scratch_root(root.path());
        let err = runner
            .spawn(&RunSpec::new(root.path().join("no-such-program")))
            .unwrap_err();
        assert!(matches!(err, ProcessError::Launch { .. }), "got: {err}");
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn run_scoped_cleans_up_after_the_closure() {
        let root = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::with_scratch_root(root.path());
        let (code, seen) = runner
            .run_scoped(&sh("exit 7"), |a| (a.exit_code(), a.stderr_path.to_path_buf()))
            .unwrap();
        assert_eq!(code, Some(7));
        assert!(!seen.exists());
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn echo_mode_still_captures_stderr() {
        let runner = ProcessRunner::new();
        let spec = sh("echo '[lart-choice] 0: 1' >&2; echo '[lart-choice] 1: 0' >&2").echo(true);
        let err = runner.run_scoped(&spec, |a| a.read_stderr().unwrap()).unwrap();
        assert_eq!(err, "[lart-choice] 0: 1\n[lart-choice] 1: 0\n");
    }

    #[test]
    fn working_directory_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new();
        let out = runner
            .run_scoped(&sh("pwd").current_dir(dir.path()), |a| a.read_stdout().unwrap())
            .unwrap();
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(Path::new(out.trim()).canonicalize().unwrap(), expected);
    }
}
