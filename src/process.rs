//! External command execution.
//!
//! Commands are built as discrete argument tokens and spawned directly,
//! never through a shell. Failures carry the tool name and captured stderr.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use crate::error::{PackError, Result};

/// Result of a command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit status of the command.
    pub status: ExitStatus,
    /// Captured stdout as a string.
    pub stdout: String,
    /// Captured stderr as a string.
    pub stderr: String,
}

impl CommandResult {
    /// Returns true if the command exited successfully.
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Get the exit code, or -1 if terminated by signal.
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    pub fn stderr_trimmed(&self) -> &str {
        self.stderr.trim()
    }
}

/// Builder for configuring command execution.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: PathBuf,
    args: Vec<OsString>,
}

impl Cmd {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().into());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().into());
        }
        self
    }

    /// Add a path as an argument, without lossy conversion.
    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.as_os_str().to_os_string());
        self
    }

    /// Add an already-assembled OS string argument.
    pub fn arg_os(mut self, arg: OsString) -> Self {
        self.args.push(arg);
        self
    }

    /// Short tool name used in messages (file name of the program).
    pub fn tool_name(&self) -> String {
        self.program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    /// Program followed by its arguments, for logging.
    pub fn display_line(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|s| s.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Run the command and capture output.
    pub fn run(self) -> Result<CommandResult> {
        let tool = self.tool_name();
        tracing::info!("EXEC CMD: {}", self.display_line());

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        let output = cmd.output().map_err(|e| PackError::ToolInvocation {
            tool: tool.clone(),
            message: format!("failed to execute {}: {}", self.program.display(), e),
        })?;

        let result = CommandResult {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.success() {
            let stderr = result.stderr_trimmed();
            let message = if stderr.is_empty() {
                format!("exit code {}", result.code())
            } else {
                format!("exit code {}:\n{}", result.code(), stderr)
            };
            return Err(PackError::ToolInvocation { tool, message });
        }

        if !result.stdout_trimmed().is_empty() {
            tracing::info!("EXEC stdout: {}", result.stdout_trimmed());
        }
        if !result.stderr_trimmed().is_empty() {
            tracing::warn!("EXEC stderr: {}", result.stderr_trimmed());
        }

        Ok(result)
    }
}
