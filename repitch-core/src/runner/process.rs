//! Production runner spawning real processes through tokio.

use std::process::Stdio;

use async_trait::async_trait;

use super::{ToolCommand, ToolOutput, ToolRunner};

/// Spawns tools as child processes and waits for them to exit.
///
/// No timeout is applied; a request waits for as long as the tool runs.
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Creates a new process runner.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, command: &ToolCommand) -> std::io::Result<ToolOutput> {
        tracing::info!("Running: {}", command.command_line());

        let output = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                tracing::error!("Failed to execute {}: {}", command.program, e);
                e
            })?;

        let result = ToolOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if result.success() {
            if !result.stderr.is_empty() {
                tracing::debug!("{} stderr: {}", command.program, result.stderr);
            }
        } else {
            tracing::warn!(
                "{} exited with {:?} writing {}: {}",
                command.program,
                result.exit_code,
                command.output.display(),
                result.stderr
            );
        }

        Ok(result)
    }

    async fn probe(&self, program: &str) -> bool {
        // ffmpeg understands -version, sox understands --version
        let flag = if program.ends_with("ffmpeg") || program.ends_with("ffmpeg.exe") {
            "-version"
        } else {
            "--version"
        };

        let result = tokio::process::Command::new(program)
            .arg(flag)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        matches!(result, Ok(status) if status.success())
    }
}
