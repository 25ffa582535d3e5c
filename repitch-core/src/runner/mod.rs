//! External tool invocation.
//!
//! Every decoder, pitch shifter and muxer call goes through [`ToolRunner`], so
//! the derivation logic can be exercised with a fake runner instead of real
//! binaries.

#[cfg(any(test, feature = "test-utils"))]
pub mod fake;
pub mod process;

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

#[cfg(any(test, feature = "test-utils"))]
pub use fake::{FakeBehavior, FakeToolRunner};
pub use process::ProcessRunner;

/// A fully built external tool command line.
///
/// The `output` path is the file the tool is expected to produce. Runners
/// only use it for logging; fakes use it to simulate the tool's write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    /// Binary name or path
    pub program: String,
    /// Arguments in order
    pub args: Vec<OsString>,
    /// File the tool writes
    pub output: PathBuf,
}

impl ToolCommand {
    /// Starts a command for `program` writing to `output`.
    pub fn new(program: impl Into<String>, output: impl AsRef<Path>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            output: output.as_ref().to_path_buf(),
        }
    }

    /// Appends a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    /// Shell-like rendering for logs.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

/// Captured result of a finished tool process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code; `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Checks whether the process exited with status zero.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Abstraction over spawning external tools.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Runs the command to completion and captures its output.
    ///
    /// A non-zero exit is not an error at this level; callers inspect
    /// [`ToolOutput::exit_code`] and the captured stderr.
    ///
    /// # Errors
    ///
    /// - `std::io::Error` - The process could not be spawned or awaited
    async fn run(&self, command: &ToolCommand) -> std::io::Result<ToolOutput>;

    /// Checks whether `program` can be launched.
    async fn probe(&self, program: &str) -> bool;
}
