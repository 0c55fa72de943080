// SPDX-License-Identifier: GPL-3.0-only

//! Canonical domain models for persistent memory provisioning
//!
//! These types are shared by every layer of the pipeline:
//!
//! - **pmem-sys**: parses tool output (ipmctl, ndctl, parted, diskpart) into these types
//! - **pmem-contracts**: uses them in the trait seams to the SUT
//! - **pmem-provisioning**: consumes them in the goal, namespace and partition steps
//!
//! ## Lifecycle
//!
//! `Dimm` → `ProvisioningGoal` → `Region` → `Namespace` → `DiskHandle` → `Partition`
//!
//! Every provisioning step reports a `StepResult`; the conjunction of all step
//! verdicts is the verdict of the run.

pub mod capacity;
pub mod common;
pub mod dimm;
pub mod goal;
pub mod partition;
pub mod platform;
pub mod region;
pub mod step;

pub use capacity::{
    aggregate_capacity, region_free_equals_total, within_tolerance, within_variance,
};
pub use common::{GIB, MIB, bytes_to_pretty, gib_to_bytes, parse_size};
pub use dimm::{Dimm, DimmLocation, HealthState};
pub use goal::{GoalReport, GoalRow, MemoryKind, ProvisioningGoal};
pub use partition::{
    AccessMode, DiskHandle, DiskState, FilesystemKind, MountIdentifier, Partition, PartitionSize,
    PartitionTableType,
};
pub use platform::{Platform, Topology};
pub use region::{MemoryResources, Namespace, NamespaceMode, Region};
pub use step::{Evidence, StepResult};
