// SPDX-License-Identifier: GPL-3.0-only

//! Numbered step bookkeeping for one provisioning run

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use pmem_contracts::StepReporter;
use pmem_types::{Evidence, StepResult};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::errors::ProvisioningError;

/// What to do after a step fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep going to collect as much diagnostic evidence as possible
    #[default]
    BestEffort,
    /// Stop at the first failed step; the rest are recorded as skipped
    FailFast,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "best_effort" => Ok(FailurePolicy::BestEffort),
            "fail_fast" => Ok(FailurePolicy::FailFast),
            other => Err(format!("unknown failure policy: {}", other)),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::BestEffort => f.write_str("best_effort"),
            FailurePolicy::FailFast => f.write_str("fail_fast"),
        }
    }
}

/// Step markers as log events
#[derive(Debug, Default)]
pub struct TracingStepReporter;

impl StepReporter for TracingStepReporter {
    fn start_step(&self, number: u32, description: &str) {
        info!("start step {}: {}", number, description);
    }

    fn end_step(&self, number: u32, verdict: bool) {
        info!("end step {} verdict={}", number, verdict);
    }
}

/// Why a run stopped before its last step
#[derive(Debug)]
pub enum Stop {
    /// A step failed under the fail-fast policy
    Halted,
    /// A step failed and nothing after it can run
    Abort(ProvisioningError),
}

impl From<ProvisioningError> for Stop {
    fn from(error: ProvisioningError) -> Self {
        Stop::Abort(error)
    }
}

/// A started step that still needs its verdict
#[derive(Debug)]
#[must_use = "a started step must be finished"]
pub struct StepTicket {
    number: u32,
    description: String,
    boot: Option<u64>,
}

impl StepTicket {
    /// Tag the step with the boot whose state it reads
    pub fn on_boot(mut self, boot: u64) -> Self {
        self.boot = Some(boot);
        self
    }
}

/// Accumulates the results of one run.
///
/// Owned by a single run; the run verdict is the conjunction of every
/// recorded step.
pub struct StepRecorder {
    steps: Vec<StepResult>,
    reporter: Arc<dyn StepReporter>,
    policy: FailurePolicy,
    halted: bool,
}

impl StepRecorder {
    pub fn new(reporter: Arc<dyn StepReporter>, policy: FailurePolicy) -> Self {
        Self {
            steps: Vec::new(),
            reporter,
            policy,
            halted: false,
        }
    }

    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    /// True only if at least one step ran and every step passed
    pub fn verdict(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|step| step.verdict)
    }

    pub fn start(&mut self, description: impl Into<String>) -> Result<StepTicket, Stop> {
        if self.halted {
            return Err(Stop::Halted);
        }
        let number = self.steps.len() as u32 + 1;
        let description = description.into();
        self.reporter.start_step(number, &description);
        Ok(StepTicket {
            number,
            description,
            boot: None,
        })
    }

    fn push(&mut self, ticket: StepTicket, mut result: StepResult) -> Result<(), Stop> {
        result.boot = ticket.boot;
        let verdict = result.verdict;
        if !verdict {
            error!(
                "step {} failed: {} {}",
                ticket.number,
                ticket.description,
                result.error.as_deref().unwrap_or_default()
            );
        }
        self.reporter.end_step(ticket.number, verdict);
        self.steps.push(result);

        if !verdict && self.policy == FailurePolicy::FailFast {
            self.halted = true;
            return Err(Stop::Halted);
        }
        Ok(())
    }

    pub fn pass(&mut self, ticket: StepTicket, evidence: Evidence) -> Result<(), Stop> {
        self.verdict_of(ticket, true, evidence)
    }

    pub fn verdict_of(
        &mut self,
        ticket: StepTicket,
        verdict: bool,
        evidence: Evidence,
    ) -> Result<(), Stop> {
        let result = StepResult::new(ticket.number, ticket.description.clone(), verdict, evidence);
        self.push(ticket, result)
    }

    /// Record a failure that later steps can live with
    pub fn fail(&mut self, ticket: StepTicket, error: impl fmt::Display) -> Result<(), Stop> {
        let result = StepResult::failed(ticket.number, ticket.description.clone(), error);
        self.push(ticket, result)
    }

    /// Record a failure that ends the run
    pub fn abort(&mut self, ticket: StepTicket, error: ProvisioningError) -> Stop {
        self.abort_with(ticket, Evidence::None, error)
    }

    pub fn abort_with(
        &mut self,
        ticket: StepTicket,
        evidence: Evidence,
        error: ProvisioningError,
    ) -> Stop {
        let result = StepResult {
            evidence,
            ..StepResult::failed(ticket.number, ticket.description.clone(), &error)
        };
        let _ = self.push(ticket, result);
        self.halted = true;
        Stop::Abort(error)
    }

    /// Record every planned step after the last recorded one as skipped
    pub fn skip_remaining(&mut self, plan: &[String]) {
        for description in plan.iter().skip(self.steps.len()) {
            let number = self.steps.len() as u32 + 1;
            self.steps.push(StepResult::skipped(number, description.clone()));
        }
    }
}
