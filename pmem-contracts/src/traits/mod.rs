// SPDX-License-Identifier: GPL-3.0-only

pub mod collaborators;
pub mod partition;
pub mod shell;
pub mod toolkit;

pub use collaborators::{BiosKnobApplier, RebootSynchronizer, StepReporter};
pub use partition::{PartitionRequest, PartitionStrategy};
pub use shell::{CommandOutput, SutShell};
pub use toolkit::PmemToolkit;
