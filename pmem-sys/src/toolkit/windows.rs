// SPDX-License-Identifier: GPL-3.0-only

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pmem_contracts::{ContractError, PmemToolkit, SutShell};
use pmem_types::{
    Dimm, GoalReport, MemoryResources, Namespace, NamespaceMode, ProvisioningGoal, Region,
};
use tracing::info;

use super::ipmctl::Ipmctl;
use crate::parse::powershell::{parse_pmem_disks, parse_unused_regions};

/// Wrap a PowerShell pipeline so it runs from any remote shell.
///
/// The pipeline must not contain double quotes.
pub fn powershell(pipeline: &str) -> String {
    format!(
        "powershell.exe -NoProfile -NonInteractive -Command \"{}\"",
        pipeline
    )
}

const LIST_DISKS: &str = "Get-PmemDisk | Select-Object DiskNumber,Size,\
@{n='AtomicityType';e={$_.AtomicityType.ToString()}} | ConvertTo-Json";
const LIST_UNUSED_REGIONS: &str =
    "Get-PmemUnusedRegion | Select-Object RegionId,SocketId,Size | ConvertTo-Json";

/// ipmctl for the DIMMs and regions, the PersistentMemory cmdlets for disks
pub struct WindowsToolkit {
    shell: Arc<dyn SutShell>,
    ipmctl: Ipmctl,
    timeout: Duration,
}

impl WindowsToolkit {
    pub fn new(shell: Arc<dyn SutShell>, timeout: Duration) -> Self {
        Self {
            ipmctl: Ipmctl::new(shell.clone(), timeout),
            shell,
            timeout,
        }
    }

    async fn run(&self, command: &str) -> Result<String, ContractError> {
        Ok(self.shell.exec_checked(command, self.timeout).await?.stdout)
    }
}

#[async_trait]
impl PmemToolkit for WindowsToolkit {
    async fn list_dimms(&self) -> Result<Vec<Dimm>, ContractError> {
        self.ipmctl.list_dimms().await
    }

    async fn apply_goal(&self, goal: &ProvisioningGoal) -> Result<GoalReport, ContractError> {
        self.ipmctl.apply_goal(goal).await
    }

    async fn memory_resources(&self) -> Result<MemoryResources, ContractError> {
        self.ipmctl.memory_resources().await
    }

    async fn list_regions(&self) -> Result<Vec<Region>, ContractError> {
        self.ipmctl.list_regions().await
    }

    async fn list_unused_regions(&self) -> Result<Vec<Region>, ContractError> {
        Ok(parse_unused_regions(&self.run(&powershell(LIST_UNUSED_REGIONS)).await?)?)
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, ContractError> {
        Ok(parse_pmem_disks(&self.run(&powershell(LIST_DISKS)).await?)?)
    }

    async fn destroy_namespaces(&self) -> Result<(), ContractError> {
        info!("removing all persistent memory disks");
        self.run(&powershell("Get-PmemDisk | Remove-PmemDisk -Confirm:$false"))
            .await?;
        Ok(())
    }

    /// The cmdlet prints nothing useful, so the new disk is found by
    /// comparing the disk list before and after.
    async fn create_namespace(
        &self,
        region: &Region,
        mode: NamespaceMode,
    ) -> Result<Namespace, ContractError> {
        let before: BTreeSet<String> = self
            .list_namespaces()
            .await?
            .into_iter()
            .map(|namespace| namespace.block_device)
            .collect();

        let atomicity = match mode {
            NamespaceMode::Sector => "BlockTranslationTable",
            NamespaceMode::Dax | NamespaceMode::Block => "None",
        };
        let pipeline = format!(
            "Get-PmemUnusedRegion -RegionId {} | New-PmemDisk -AtomicityType {}",
            region.id, atomicity
        );
        info!("{}", pipeline);
        self.run(&powershell(&pipeline)).await?;

        let created = self
            .list_namespaces()
            .await?
            .into_iter()
            .find(|namespace| !before.contains(&namespace.block_device))
            .ok_or_else(|| {
                ContractError::unexpected_output("New-PmemDisk", format!("no new disk in region {}", region.id))
            })?;

        Ok(Namespace {
            region_id: region.id.clone(),
            mode,
            ..created
        })
    }

    async fn delete_pcd(&self) -> Result<(), ContractError> {
        self.ipmctl.delete_pcd().await
    }

    async fn clear_error_logs(&self) -> Result<(), ContractError> {
        for log in ["System", "Application"] {
            self.run(&format!("wevtutil cl {}", log)).await?;
        }
        Ok(())
    }
}
