// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pmem_contracts::{ContractError, PmemToolkit, SutShell};
use pmem_types::{
    Dimm, GoalReport, MemoryResources, Namespace, NamespaceMode, ProvisioningGoal, Region,
};
use tracing::{info, warn};

use super::ipmctl::Ipmctl;
use crate::parse::ndctl::{parse_created_namespace, parse_namespaces, parse_regions};

/// ipmctl for the DIMMs, ndctl for regions and namespaces
pub struct LinuxToolkit {
    shell: Arc<dyn SutShell>,
    ipmctl: Ipmctl,
    timeout: Duration,
}

impl LinuxToolkit {
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
impl PmemToolkit for LinuxToolkit {
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
        Ok(parse_regions(&self.run("ndctl list --regions").await?)?)
    }

    async fn list_unused_regions(&self) -> Result<Vec<Region>, ContractError> {
        let regions = self.list_regions().await?;
        Ok(regions
            .into_iter()
            .filter(|region| region.free_capacity > 0)
            .collect())
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, ContractError> {
        Ok(parse_namespaces(&self.run("ndctl list --namespaces").await?)?)
    }

    async fn destroy_namespaces(&self) -> Result<(), ContractError> {
        info!("destroying all namespaces");
        self.run("ndctl destroy-namespace all -f").await?;
        Ok(())
    }

    async fn create_namespace(
        &self,
        region: &Region,
        mode: NamespaceMode,
    ) -> Result<Namespace, ContractError> {
        let command = format!(
            "ndctl create-namespace --mode={} --region={}",
            mode.ndctl_name(),
            region.id
        );
        info!("{}", command);
        Ok(parse_created_namespace(&self.run(&command).await?)?)
    }

    async fn delete_pcd(&self) -> Result<(), ContractError> {
        self.ipmctl.delete_pcd().await
    }

    async fn clear_error_logs(&self) -> Result<(), ContractError> {
        self.run("dmesg -C").await?;
        for command in ["journalctl --rotate", "journalctl --vacuum-time=1s"] {
            if let Err(error) = self.run(command).await {
                warn!("{} failed: {}", command, error);
            }
        }
        Ok(())
    }
}
