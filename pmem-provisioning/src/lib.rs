// SPDX-License-Identifier: GPL-3.0-only

//! Persistent memory provisioning pipeline.
//!
//! A run takes a platform from BIOS knobs to verified, mounted partitions:
//! clear logs, apply knobs, check the DIMM population, wipe the old
//! configuration, apply a goal, create namespaces, then partition, format
//! and mount every resulting disk. [`orchestrator::Orchestrator`] drives
//! the sequence; [`reboot`] makes the reboot ordering a compile-time rule.

pub mod errors;
pub mod goal;
pub mod ledger;
pub mod logging;
pub mod namespace;
pub mod orchestrator;
pub mod partition;
pub mod profile;
pub mod reboot;
pub mod recorder;
pub mod report;

pub use errors::{ProvisioningError, Result};
pub use ledger::Ledger;
pub use orchestrator::{Collaborators, Orchestrator};
pub use profile::Profile;
pub use recorder::{FailurePolicy, TracingStepReporter};
pub use report::RunReport;
