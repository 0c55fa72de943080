// SPDX-License-Identifier: GPL-3.0-only

//! ipmctl is shipped for both operating systems with the same syntax

use std::sync::Arc;
use std::time::Duration;

use pmem_contracts::{ContractError, SutShell};
use pmem_types::{Dimm, GoalReport, MemoryResources, ProvisioningGoal, Region};
use tracing::info;

use crate::parse::ipmctl::{
    GOAL_CREATED_TOKEN, parse_dimms, parse_goal, parse_memory_resources, parse_regions,
};

/// `ipmctl create -goal` command line for a persistent/volatile split
pub fn goal_command(goal: &ProvisioningGoal) -> String {
    let mut command = String::from("ipmctl create -f -goal");
    if goal.volatile_percent > 0 {
        command.push_str(&format!(" MemoryMode={}", goal.volatile_percent));
    }
    if goal.persistent_percent > 0 {
        command.push_str(" PersistentMemoryType=AppDirect");
    }
    let reserved = goal.reserved_percent();
    if reserved > 0 {
        command.push_str(&format!(" Reserved={}", reserved));
    }
    command
}

pub(crate) struct Ipmctl {
    shell: Arc<dyn SutShell>,
    timeout: Duration,
}

impl Ipmctl {
    pub(crate) fn new(shell: Arc<dyn SutShell>, timeout: Duration) -> Self {
        Self { shell, timeout }
    }

    async fn run(&self, command: &str) -> Result<String, ContractError> {
        Ok(self.shell.exec_checked(command, self.timeout).await?.stdout)
    }

    pub(crate) async fn list_dimms(&self) -> Result<Vec<Dimm>, ContractError> {
        Ok(parse_dimms(&self.run("ipmctl show -dimm").await?)?)
    }

    pub(crate) async fn apply_goal(
        &self,
        goal: &ProvisioningGoal,
    ) -> Result<GoalReport, ContractError> {
        let command = goal_command(goal);
        info!("applying goal: {}", command);
        let output = self.run(&command).await?;
        if !output.contains(GOAL_CREATED_TOKEN) {
            return Err(ContractError::unexpected_output(
                &command,
                "goal was not confirmed",
            ));
        }
        Ok(parse_goal(&output)?)
    }

    pub(crate) async fn memory_resources(&self) -> Result<MemoryResources, ContractError> {
        Ok(parse_memory_resources(
            &self.run("ipmctl show -memoryresources").await?,
        )?)
    }

    pub(crate) async fn list_regions(&self) -> Result<Vec<Region>, ContractError> {
        Ok(parse_regions(&self.run("ipmctl show -region").await?)?)
    }

    pub(crate) async fn delete_pcd(&self) -> Result<(), ContractError> {
        info!("deleting platform configuration data");
        self.run("ipmctl delete -f -dimm -pcd").await?;
        Ok(())
    }
}
