// SPDX-License-Identifier: GPL-3.0-only

use std::time::Duration;

use async_trait::async_trait;

use crate::ContractError;

/// Captured result of one command run on the system under test
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    /// Exit code; `None` when the process was killed by a signal
    pub status: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// The text to show when the command failed
    pub fn failure_detail(&self) -> &str {
        if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// Command execution on the system under test.
///
/// A non-zero exit is not an error at this level; callers decide with
/// [`SutShell::exec_checked`]. Transport failures and timeouts are errors.
#[async_trait]
pub trait SutShell: Send + Sync {
    async fn exec(&self, command: &str, timeout: Duration) -> Result<CommandOutput, ContractError>;

    /// Write `contents` to `path` on the system under test
    async fn write_file(
        &self,
        path: &str,
        contents: &str,
        timeout: Duration,
    ) -> Result<(), ContractError>;

    async fn exec_checked(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, ContractError> {
        let output = self.exec(command, timeout).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(ContractError::command_failed(command, output.failure_detail()))
        }
    }
}
