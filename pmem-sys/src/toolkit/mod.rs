// SPDX-License-Identifier: GPL-3.0-only

mod ipmctl;
pub mod linux;
pub mod windows;

use std::sync::Arc;
use std::time::Duration;

use pmem_contracts::{PmemToolkit, SutShell};
use pmem_types::Platform;

pub use ipmctl::goal_command;
pub use linux::LinuxToolkit;
pub use windows::WindowsToolkit;

/// Toolkit for the operating system running on the system under test
pub fn toolkit_for(
    platform: Platform,
    shell: Arc<dyn SutShell>,
    timeout: Duration,
) -> Arc<dyn PmemToolkit> {
    match platform {
        Platform::Linux => Arc::new(LinuxToolkit::new(shell, timeout)),
        Platform::Windows => Arc::new(WindowsToolkit::new(shell, timeout)),
    }
}
