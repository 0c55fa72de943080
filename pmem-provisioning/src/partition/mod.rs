// SPDX-License-Identifier: GPL-3.0-only

//! Platform partitioning strategies, resolved once per run

mod linux;
mod windows;

use std::sync::Arc;
use std::time::Duration;

use pmem_contracts::{PartitionStrategy, SutShell};
use pmem_types::Platform;

use crate::ledger::Ledger;

pub use linux::LinuxPartitioner;
pub use windows::{DISKPART_SCRIPT, WindowsPartitioner};

pub fn strategy_for(
    platform: Platform,
    shell: Arc<dyn SutShell>,
    ledger: Ledger,
    timeout: Duration,
) -> Arc<dyn PartitionStrategy> {
    match platform {
        Platform::Linux => Arc::new(LinuxPartitioner::new(shell, ledger, timeout)),
        Platform::Windows => Arc::new(WindowsPartitioner::new(shell, ledger, timeout)),
    }
}
