// SPDX-License-Identifier: GPL-3.0-only

//! Reboot and BIOS knob collaborators built on the shells

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pmem_contracts::{BiosKnobApplier, ContractError, RebootSynchronizer, SutShell};
use pmem_types::Platform;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::shell::SshShell;

const PROBE_TIMEOUT: Duration = Duration::from_secs(15);
const REBOOT_ISSUE_TIMEOUT: Duration = Duration::from_secs(30);

pub fn reboot_command(platform: Platform) -> &'static str {
    match platform {
        Platform::Linux => "systemctl reboot",
        Platform::Windows => "shutdown /r /t 0",
    }
}

/// Reboots over SSH, waits for the SUT to drop off, then polls until it answers again
pub struct SshRebootSynchronizer {
    shell: Arc<SshShell>,
    platform: Platform,
    poll_interval: Duration,
}

impl SshRebootSynchronizer {
    pub fn new(shell: Arc<SshShell>, platform: Platform) -> Self {
        Self {
            shell,
            platform,
            poll_interval: Duration::from_secs(10),
        }
    }

}

/// Poll `reachable` until it answers `wanted`; false once `deadline` would pass
async fn wait_for<F, Fut>(
    reachable: &mut F,
    wanted: bool,
    poll_interval: Duration,
    deadline: Instant,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    loop {
        if reachable().await == wanted {
            return true;
        }
        if Instant::now() + poll_interval > deadline {
            return false;
        }
        sleep(poll_interval).await;
    }
}

/// Wait for `host` to drop off and then answer again before `deadline`
async fn await_return<F, Fut>(
    host: &str,
    mut reachable: F,
    poll_interval: Duration,
    deadline: Instant,
) -> Result<(), ContractError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    if !wait_for(&mut reachable, false, poll_interval, deadline).await {
        return Err(ContractError::unavailable(format!(
            "{} never went down after reboot was issued",
            host
        )));
    }
    if !wait_for(&mut reachable, true, poll_interval, deadline).await {
        return Err(ContractError::timeout(format!(
            "{} did not come back before the reboot deadline",
            host
        )));
    }
    Ok(())
}

#[async_trait]
impl RebootSynchronizer for SshRebootSynchronizer {
    async fn reboot_and_wait(&self, timeout: Duration) -> Result<(), ContractError> {
        let host = &self.shell.target().host;
        info!("rebooting {}", host);
        let deadline = Instant::now() + timeout;

        // The connection usually drops before the command returns.
        if let Err(error) = self
            .shell
            .exec(reboot_command(self.platform), REBOOT_ISSUE_TIMEOUT)
            .await
        {
            debug!("reboot command ended with: {}", error);
        }

        await_return(
            host,
            || self.shell.is_reachable(PROBE_TIMEOUT),
            self.poll_interval,
            deadline,
        )
        .await?;

        info!("{} is back", host);
        Ok(())
    }
}

/// Applies a BIOS knob file with an external command, then reboots.
///
/// Without an apply command the knob file is only logged and the SUT is
/// rebooted so that the caller's ordering still holds.
pub struct CommandKnobApplier {
    shell: Arc<dyn SutShell>,
    reboot: Arc<dyn RebootSynchronizer>,
    apply_command: Option<String>,
    command_timeout: Duration,
    reboot_timeout: Duration,
}

impl CommandKnobApplier {
    pub fn new(
        shell: Arc<dyn SutShell>,
        reboot: Arc<dyn RebootSynchronizer>,
        apply_command: Option<String>,
        command_timeout: Duration,
        reboot_timeout: Duration,
    ) -> Self {
        Self {
            shell,
            reboot,
            apply_command,
            command_timeout,
            reboot_timeout,
        }
    }
}

#[async_trait]
impl BiosKnobApplier for CommandKnobApplier {
    async fn apply_and_reboot(&self, knob_file: &Path) -> Result<(), ContractError> {
        match &self.apply_command {
            Some(command) => {
                let command = format!("{} {}", command, knob_file.display());
                info!("applying BIOS knobs: {}", command);
                self.shell
                    .exec_checked(&command, self.command_timeout)
                    .await?;
            }
            None => warn!(
                "no BIOS apply command configured; {} is not applied",
                knob_file.display()
            ),
        }
        self.reboot.reboot_and_wait(self.reboot_timeout).await
    }
}
