//! Invocation of external platform tools (`otool`, `ldd`, `install_name_tool`, `codesign`, ...).
//!
//! Every resolver in `depbundle` talks to the operating system's linker tooling through the
//! [`ProcessRunner`] trait, so that the parsing and decision logic can be exercised against
//! canned tool output in tests. [`SystemRunner`] is the real implementation: it spawns the tool,
//! captures its output, and kills it if it outlives the configured timeout.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::future::Future;
use std::io;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::trace;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("`{program}` was not found")]
    NotFound { program: String },
    #[error("Failed to run `{program}`")]
    Io {
        program: String,
        #[source]
        err: io::Error,
    },
    #[error("`{program}` timed out after {}s", timeout.as_secs_f32())]
    TimedOut { program: String, timeout: Duration },
    #[error("`{command}` failed with {}{}", exit_code(*code), stderr_suffix(stderr))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl ToolError {
    /// Returns `true` if the tool is not installed, as opposed to installed but failing.
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

fn exit_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// A single invocation of an external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tool {
    program: String,
    args: Vec<OsString>,
}

impl Tool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// The arguments, lossily converted to UTF-8.
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// The captured result of a finished tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// The exit code, or `None` if the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// A successful output with the given standard output.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed output with the given exit code and standard error.
    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external tools on behalf of the inspectors, rewriters and signers.
pub trait ProcessRunner {
    /// Run the tool to completion and capture its output.
    ///
    /// A non-zero exit status is not an error at this level; see [`ProcessRunner::run_checked`].
    fn run(&self, tool: &Tool) -> impl Future<Output = Result<ToolOutput, ToolError>>;

    /// Run the tool, treating a non-zero exit status as [`ToolError::Failed`].
    fn run_checked(&self, tool: &Tool) -> impl Future<Output = Result<ToolOutput, ToolError>> {
        async move {
            let output = self.run(tool).await?;
            if output.is_success() {
                Ok(output)
            } else {
                Err(ToolError::Failed {
                    command: tool.to_string(),
                    code: output.code,
                    stderr: output.stderr.trim().to_string(),
                })
            }
        }
    }
}

impl<T: ProcessRunner> ProcessRunner for &T {
    fn run(&self, tool: &Tool) -> impl Future<Output = Result<ToolOutput, ToolError>> {
        (**self).run(tool)
    }
}

/// A [`ProcessRunner`] that spawns real processes.
#[derive(Debug, Clone, Copy)]
pub struct SystemRunner {
    timeout: Duration,
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT)
    }
}

impl SystemRunner {
    /// Long enough for `codesign` on a large universal binary; short enough that a hung tool
    /// doesn't stall the whole closure.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ProcessRunner for SystemRunner {
    async fn run(&self, tool: &Tool) -> Result<ToolOutput, ToolError> {
        trace!("Running `{tool}`");

        let child = Command::new(tool.program())
            .args(tool.get_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A timed-out invocation is dropped mid-wait; make sure the child goes with it.
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                if err.kind() == io::ErrorKind::NotFound {
                    ToolError::NotFound {
                        program: tool.program().to_string(),
                    }
                } else {
                    ToolError::Io {
                        program: tool.program().to_string(),
                        err,
                    }
                }
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ToolError::TimedOut {
                program: tool.program().to_string(),
                timeout: self.timeout,
            })?
            .map_err(|err| ToolError::Io {
                program: tool.program().to_string(),
                err,
            })?;

        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
