use crate::error::{Result, ZoneError};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs an external program to completion within a time bound.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// `Err(ZoneError::Timeout)` when `limit` elapses; a non-zero exit is
    /// still `Ok` and left to the caller to interpret.
    async fn run(&self, program: &Path, args: &[&str], limit: Duration) -> Result<CommandOutput>;
}

#[derive(Debug, Default, Clone)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &Path, args: &[&str], limit: Duration) -> Result<CommandOutput> {
        debug!("Running {} {}", program.display(), args.join(" "));

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ZoneError::Process(format!("Failed to start {}: {}", program.display(), e)))?;

        let output = match timeout(limit, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(ZoneError::Timeout {
                    command: describe(program, args),
                    seconds: limit.as_secs(),
                })
            }
        };

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

pub fn describe(program: &Path, args: &[&str]) -> String {
    let mut line = program.display().to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}
