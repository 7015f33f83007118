//! Running external programs.

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::CommandError;

/// Runs an external program to completion.
///
/// The reactor only depends on this trait so tests can observe invocations
/// without touching the mount table.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, returning its stdout on success.
    async fn run(&self, program: &str, args: &[String]) -> Result<String, CommandError>;
}

/// Spawns real subprocesses.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<String, CommandError> {
        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CommandError::Spawn {
                program: program.to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(CommandError::failed(program, output.status, &output.stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
