// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use pmem_contracts::PmemToolkit;
use pmem_types::{
    Dimm, Evidence, GoalReport, MemoryKind, MemoryResources, ProvisioningGoal, aggregate_capacity,
    bytes_to_pretty, within_tolerance, within_variance,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::Result;
use crate::reboot::{RebootRequired, Settled};

/// Two-sided band for the memory resource cross-check
pub const MEMORY_RESOURCE_TOLERANCE: f64 = 0.01;

/// A goal accepted by the configuration tool, staged for the next boot
#[derive(Debug, Clone)]
pub struct AppliedGoal {
    pub goal: ProvisioningGoal,
    pub report: GoalReport,
    /// Boot on which the goal was applied
    pub boot: u64,
}

/// One requested mode compared against what was actually configured
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeCheck {
    pub kind: MemoryKind,
    pub observed: u64,
    pub expected: u64,
    pub passed: bool,
}

impl ModeCheck {
    pub fn describe(&self) -> String {
        format!(
            "{}: observed {} expected {} -> {}",
            self.kind,
            bytes_to_pretty(&self.observed, false),
            bytes_to_pretty(&self.expected, false),
            if self.passed { "pass" } else { "fail" }
        )
    }
}

/// Every check passed, and there was at least one
pub fn all_passed(checks: &[ModeCheck]) -> bool {
    !checks.is_empty() && checks.iter().all(|check| check.passed)
}

pub fn evidence(checks: &[ModeCheck]) -> Evidence {
    Evidence::list(checks.iter().map(ModeCheck::describe))
}

pub struct GoalController {
    toolkit: Arc<dyn PmemToolkit>,
}

impl GoalController {
    pub fn new(toolkit: Arc<dyn PmemToolkit>) -> Self {
        Self { toolkit }
    }

    /// Stage `goal`. Requires namespaces and configuration data to have
    /// been cleared and the platform rebooted, which `settled` proves.
    pub async fn apply_goal(
        &self,
        goal: &ProvisioningGoal,
        settled: Settled,
    ) -> Result<(AppliedGoal, RebootRequired)> {
        info!("applying goal {} on boot {}", goal, settled.boot());
        let report = self.toolkit.apply_goal(goal).await?;
        let applied = AppliedGoal {
            goal: *goal,
            report,
            boot: settled.boot(),
        };
        Ok((applied, RebootRequired::new(format!("goal {}", goal))))
    }

    pub async fn memory_resources(&self, _settled: &Settled) -> Result<MemoryResources> {
        Ok(self.toolkit.memory_resources().await?)
    }
}

/// Compare one mode of the staged goal against its share of the healthy DIMM capacity
pub fn verify_mode(applied: &AppliedGoal, dimms: &[Dimm], kind: MemoryKind, variance: f64) -> ModeCheck {
    let expected = applied.goal.expected_bytes(kind, aggregate_capacity(dimms));
    let observed = applied.report.total_for(kind);
    let passed = within_variance(observed, expected, variance);
    if !passed {
        warn!("{} capacity {} outside variance of {}", kind, observed, expected);
    }
    ModeCheck {
        kind,
        observed,
        expected,
        passed,
    }
}

/// One check per requested mode; the goal is verified only if all pass
pub fn verify_goal(applied: &AppliedGoal, dimms: &[Dimm], variance: f64) -> Vec<ModeCheck> {
    applied
        .goal
        .requested_kinds()
        .into_iter()
        .map(|kind| verify_mode(applied, dimms, kind, variance))
        .collect()
}

/// After the goal reboot, each requested mode must be provisioned within
/// one percent of its share of the physical capacity, and neither side
/// may be zero.
pub fn verify_memory_resources(goal: &ProvisioningGoal, resources: &MemoryResources) -> Vec<ModeCheck> {
    goal.requested_kinds()
        .into_iter()
        .map(|kind| {
            let expected = goal.expected_bytes(kind, resources.physical);
            let observed = resources.provisioned(kind);
            ModeCheck {
                kind,
                observed,
                expected,
                passed: observed > 0
                    && expected > 0
                    && within_tolerance(observed, expected, MEMORY_RESOURCE_TOLERANCE),
            }
        })
        .collect()
}
