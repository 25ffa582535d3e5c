//! Scriptable tool runner for tests.
//!
//! Records every command and simulates the tool's effect on its output file,
//! so derivation code can be tested without ffmpeg or sox installed.

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ToolCommand, ToolOutput, ToolRunner};

/// What a fake tool does when invoked.
#[derive(Debug, Clone)]
pub enum FakeBehavior {
    /// Writes the bytes to the command output and exits 0
    WriteOutput(Vec<u8>),
    /// Exits 0 without touching the output
    NoOutput,
    /// Exits with the code and stderr without touching the output
    Fail { exit_code: i32, stderr: String },
    /// Writes a truncated output, then exits with the code and stderr
    FailPartial {
        exit_code: i32,
        stderr: String,
        partial: Vec<u8>,
    },
    /// Cannot be spawned at all
    LaunchError,
}

#[derive(Default)]
struct Script {
    queued: HashMap<String, VecDeque<FakeBehavior>>,
    defaults: HashMap<String, FakeBehavior>,
    unavailable: HashSet<String>,
    calls: Vec<ToolCommand>,
}

/// Fake [`ToolRunner`] with per-program scripted behaviour.
///
/// Queued behaviours are consumed first, then the program default, then
/// `WriteOutput(b"fake output")`.
#[derive(Default)]
pub struct FakeToolRunner {
    script: Mutex<Script>,
}

impl FakeToolRunner {
    /// Creates a runner where every tool succeeds and writes output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the behaviour used whenever nothing is queued for `program`.
    pub fn with_default(self, program: &str, behavior: FakeBehavior) -> Self {
        self.script
            .lock()
            .defaults
            .insert(program.to_string(), behavior);
        self
    }

    /// Queues a one-shot behaviour for the next invocation of `program`.
    pub fn push_behavior(&self, program: &str, behavior: FakeBehavior) {
        self.script
            .lock()
            .queued
            .entry(program.to_string())
            .or_default()
            .push_back(behavior);
    }

    /// Makes `probe` report `program` as missing.
    pub fn mark_unavailable(&self, program: &str) {
        self.script.lock().unavailable.insert(program.to_string());
    }

    /// Returns every command run so far, in order.
    pub fn calls(&self) -> Vec<ToolCommand> {
        self.script.lock().calls.clone()
    }

    /// Counts invocations of `program`.
    pub fn call_count(&self, program: &str) -> usize {
        self.script
            .lock()
            .calls
            .iter()
            .filter(|call| call.program == program)
            .count()
    }

    fn next_behavior(&self, command: &ToolCommand) -> FakeBehavior {
        let mut script = self.script.lock();
        script.calls.push(command.clone());

        if let Some(behavior) = script
            .queued
            .get_mut(&command.program)
            .and_then(VecDeque::pop_front)
        {
            return behavior;
        }

        script
            .defaults
            .get(&command.program)
            .cloned()
            .unwrap_or_else(|| FakeBehavior::WriteOutput(b"fake output".to_vec()))
    }
}

fn exited(exit_code: i32, stderr: String) -> ToolOutput {
    ToolOutput {
        exit_code: Some(exit_code),
        stdout: String::new(),
        stderr,
    }
}

#[async_trait]
impl ToolRunner for FakeToolRunner {
    async fn run(&self, command: &ToolCommand) -> std::io::Result<ToolOutput> {
        match self.next_behavior(command) {
            FakeBehavior::WriteOutput(bytes) => {
                tokio::fs::write(&command.output, bytes).await?;
                Ok(exited(0, String::new()))
            }
            FakeBehavior::NoOutput => Ok(exited(0, String::new())),
            FakeBehavior::Fail { exit_code, stderr } => Ok(exited(exit_code, stderr)),
            FakeBehavior::FailPartial {
                exit_code,
                stderr,
                partial,
            } => {
                tokio::fs::write(&command.output, partial).await?;
                Ok(exited(exit_code, stderr))
            }
            FakeBehavior::LaunchError => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", command.program),
            )),
        }
    }

    async fn probe(&self, program: &str) -> bool {
        !self.script.lock().unavailable.contains(program)
    }
}
