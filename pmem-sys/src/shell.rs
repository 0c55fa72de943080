// SPDX-License-Identifier: GPL-3.0-only

//! Shells that run commands on the system under test

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use pmem_contracts::{CommandOutput, ContractError, SutShell};
use tokio::process::Command;
use tracing::debug;

use crate::{Result, SysError};

/// ssh reports its own connection failures with this exit code
const SSH_CONNECTION_FAILURE: i32 = 255;

async fn run_with_timeout(
    mut command: Command,
    rendered: &str,
    timeout: Duration,
) -> Result<CommandOutput> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::time::timeout(timeout, command.output())
        .await
        .map_err(|_| SysError::Timeout {
            command: rendered.to_string(),
            timeout,
        })??;

    let output = CommandOutput {
        command: rendered.to_string(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        status: output.status.code(),
    };
    debug!(
        command = rendered,
        status = ?output.status,
        stdout = %output.stdout.trim_end(),
        "command finished"
    );
    Ok(output)
}

/// Runs commands on the machine this process runs on.
///
/// Used when the harness is executed directly on the system under test.
#[derive(Debug, Clone)]
pub struct LocalShell {
    program: &'static str,
    flag: &'static str,
}

impl LocalShell {
    pub fn new() -> Self {
        if cfg!(windows) {
            Self {
                program: "cmd",
                flag: "/C",
            }
        } else {
            Self {
                program: "sh",
                flag: "-c",
            }
        }
    }
}

impl Default for LocalShell {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SutShell for LocalShell {
    async fn exec(&self, command: &str, timeout: Duration) -> std::result::Result<CommandOutput, ContractError> {
        let mut process = Command::new(self.program);
        process.arg(self.flag).arg(command);
        Ok(run_with_timeout(process, command, timeout).await?)
    }

    async fn write_file(
        &self,
        path: &str,
        contents: &str,
        timeout: Duration,
    ) -> std::result::Result<(), ContractError> {
        tokio::time::timeout(timeout, tokio::fs::write(path, contents))
            .await
            .map_err(|_| SysError::Timeout {
                command: format!("write {}", path),
                timeout,
            })?
            .map_err(SysError::from)?;
        Ok(())
    }
}

/// Where and as whom to reach the system under test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub user: String,
    pub port: Option<u16>,
    pub identity_file: Option<PathBuf>,
}

impl SshTarget {
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

/// Runs commands on a remote system under test through the `ssh` and `scp` binaries
#[derive(Debug, Clone)]
pub struct SshShell {
    target: SshTarget,
    ssh: PathBuf,
    scp: PathBuf,
}

impl SshShell {
    pub fn new(target: SshTarget) -> Result<Self> {
        let ssh = which::which("ssh").map_err(|_| SysError::ToolMissing("ssh".into()))?;
        let scp = which::which("scp").map_err(|_| SysError::ToolMissing("scp".into()))?;
        Ok(Self { target, ssh, scp })
    }

    pub fn target(&self) -> &SshTarget {
        &self.target
    }

    fn options(&self, port_flag: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
        ];
        if let Some(port) = self.target.port {
            args.push(port_flag.to_string());
            args.push(port.to_string());
        }
        if let Some(identity) = &self.target.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args
    }

    /// True when the remote OS accepts a login and runs a trivial command
    pub async fn is_reachable(&self, timeout: Duration) -> bool {
        matches!(self.exec("echo ready", timeout).await, Ok(output) if output.success())
    }
}

#[async_trait]
impl SutShell for SshShell {
    async fn exec(&self, command: &str, timeout: Duration) -> std::result::Result<CommandOutput, ContractError> {
        let mut process = Command::new(&self.ssh);
        process
            .args(self.options("-p"))
            .arg(self.target.destination())
            .arg(command);

        let output = run_with_timeout(process, command, timeout).await?;
        if output.status == Some(SSH_CONNECTION_FAILURE) {
            return Err(SysError::Unreachable(format!(
                "{}: {}",
                self.target.host,
                output.stderr.trim()
            ))
            .into());
        }
        Ok(output)
    }

    async fn write_file(
        &self,
        path: &str,
        contents: &str,
        timeout: Duration,
    ) -> std::result::Result<(), ContractError> {
        let local = std::env::temp_dir().join(format!("pmem-{}.tmp", uuid::Uuid::new_v4()));
        tokio::fs::write(&local, contents)
            .await
            .map_err(SysError::from)?;

        let mut process = Command::new(&self.scp);
        process
            .args(self.options("-P"))
            .arg(&local)
            .arg(format!("{}:{}", self.target.destination(), path));
        let rendered = format!("scp {} {}", local.display(), path);
        let result = run_with_timeout(process, &rendered, timeout).await;

        if let Err(error) = tokio::fs::remove_file(&local).await {
            debug!("failed to remove {}: {}", local.display(), error);
        }

        let output = result?;
        if !output.success() {
            return Err(SysError::CommandFailed {
                command: rendered,
                detail: output.failure_detail().trim().to_string(),
            }
            .into());
        }
        Ok(())
    }
}
