// SPDX-License-Identifier: GPL-3.0-only

//! Reboot ordering tokens.
//!
//! Goal application and platform configuration data deletion only take
//! effect after a reboot, and any capacity, region or namespace state read
//! before that reboot is stale. Those mutations therefore hand back a
//! [`RebootRequired`], and the reads demand a [`Settled`] proof that only
//! [`RebootRequired::settle`] or [`RebootGate::reboot`] can produce. A
//! mutation consumes the proof it was given:
//!
//! ```compile_fail
//! # use pmem_provisioning::goal::GoalController;
//! # use pmem_provisioning::namespace::NamespaceManager;
//! # use pmem_provisioning::reboot::RebootGate;
//! # use pmem_types::ProvisioningGoal;
//! # async fn stale(gate: &mut RebootGate, namespaces: &NamespaceManager, goals: &GoalController)
//! #     -> pmem_provisioning::errors::Result<()> {
//! let settled = gate.reboot().await?;
//! let pending = namespaces.delete_pcd_metadata(settled).await?;
//! // No reboot since the metadata was wiped: `settled` has been consumed.
//! let (applied, _) = goals.apply_goal(&ProvisioningGoal::app_direct(), settled).await?;
//! # let _ = (pending, applied);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use pmem_contracts::RebootSynchronizer;
use tracing::{info, warn};

use crate::errors::{ProvisioningError, Result};

/// Proof that the system under test has rebooted since the last metadata mutation
#[derive(Debug)]
pub struct Settled {
    boot: u64,
}

impl Settled {
    /// Boot count of the reboot that produced this proof
    pub fn boot(&self) -> u64 {
        self.boot
    }
}

/// A metadata mutation that is not committed until the next reboot
#[derive(Debug)]
#[must_use = "the change is not committed until the system under test reboots"]
pub struct RebootRequired {
    reason: String,
    pending: bool,
}

impl RebootRequired {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            pending: true,
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Reboot through the gate and wait for the OS to come back
    pub async fn settle(mut self, gate: &mut RebootGate) -> Result<Settled> {
        info!("reboot required: {}", self.reason);
        let settled = gate.reboot().await;
        self.pending = false;
        settled
    }
}

impl Drop for RebootRequired {
    fn drop(&mut self) {
        if self.pending {
            warn!("'{}' was never followed by a reboot", self.reason);
        }
    }
}

/// Performs reboots for one run and counts them
pub struct RebootGate {
    synchronizer: Arc<dyn RebootSynchronizer>,
    timeout: Duration,
    boots: u64,
}

impl RebootGate {
    pub fn new(synchronizer: Arc<dyn RebootSynchronizer>, timeout: Duration) -> Self {
        Self {
            synchronizer,
            timeout,
            boots: 0,
        }
    }

    /// Reboots performed through this gate so far
    pub fn boots(&self) -> u64 {
        self.boots
    }

    /// Reboot unconditionally. A reboot that does not come back within the
    /// timeout is reported, never retried.
    pub async fn reboot(&mut self) -> Result<Settled> {
        self.synchronizer
            .reboot_and_wait(self.timeout)
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    ProvisioningError::Timeout {
                        operation: format!("reboot: {}", error.message),
                        timeout: self.timeout,
                    }
                } else {
                    ProvisioningError::SutUnavailable {
                        reason: error.to_string(),
                    }
                }
            })?;
        self.boots += 1;
        Ok(Settled { boot: self.boots })
    }
}
