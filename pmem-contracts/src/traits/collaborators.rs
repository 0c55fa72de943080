// SPDX-License-Identifier: GPL-3.0-only

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::ContractError;

/// Reboots the system under test and blocks until its OS answers again
#[async_trait]
pub trait RebootSynchronizer: Send + Sync {
    async fn reboot_and_wait(&self, timeout: Duration) -> Result<(), ContractError>;
}

/// Loads a BIOS knob file, reboots, and returns once the knobs are verified
#[async_trait]
pub trait BiosKnobApplier: Send + Sync {
    async fn apply_and_reboot(&self, knob_file: &Path) -> Result<(), ContractError>;
}

/// Step bracketing hooks; reporting only, never control flow
pub trait StepReporter: Send + Sync {
    fn start_step(&self, number: u32, description: &str);
    fn end_step(&self, number: u32, verdict: bool);
}
