// SPDX-License-Identifier: GPL-3.0-only

//! System-level command surface for persistent memory provisioning
//!
//! This crate owns everything that knows command syntax:
//! - shells that run commands on the system under test (local or over SSH)
//! - parsers for ipmctl, ndctl, PowerShell, parted, diskpart and mount output
//! - the Linux and Windows implementations of [`PmemToolkit`](pmem_contracts::PmemToolkit)
//! - reboot and BIOS knob collaborators built on those shells

pub mod collaborators;
pub mod error;
pub mod parse;
pub mod shell;
pub mod toolkit;

pub use collaborators::{CommandKnobApplier, SshRebootSynchronizer};
pub use error::{Result, SysError};
pub use shell::{LocalShell, SshShell, SshTarget};
pub use toolkit::{LinuxToolkit, WindowsToolkit, goal_command, toolkit_for};
