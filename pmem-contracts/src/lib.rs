// SPDX-License-Identifier: GPL-3.0-only

pub mod error;
pub mod traits;

pub use error::{ContractError, ContractErrorKind};
pub use traits::{
    BiosKnobApplier, CommandOutput, PartitionRequest, PartitionStrategy, PmemToolkit,
    RebootSynchronizer, StepReporter, SutShell,
};
