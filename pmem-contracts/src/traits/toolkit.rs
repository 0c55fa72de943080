// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;

use pmem_types::{Dimm, GoalReport, MemoryResources, Namespace, NamespaceMode, ProvisioningGoal, Region};

use crate::ContractError;

/// Persistent memory management surface of one operating system.
///
/// Implementations wrap the vendor tools and return parsed models only;
/// nothing above this trait sees command syntax.
#[async_trait]
pub trait PmemToolkit: Send + Sync {
    async fn list_dimms(&self) -> Result<Vec<Dimm>, ContractError>;

    /// Issue the goal command. Fails unless the tool confirms the goal.
    async fn apply_goal(&self, goal: &ProvisioningGoal) -> Result<GoalReport, ContractError>;

    async fn memory_resources(&self) -> Result<MemoryResources, ContractError>;

    async fn list_regions(&self) -> Result<Vec<Region>, ContractError>;

    /// Regions with free capacity left for a namespace
    async fn list_unused_regions(&self) -> Result<Vec<Region>, ContractError>;

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, ContractError>;

    /// Destroy every namespace; succeeds when there are none
    async fn destroy_namespaces(&self) -> Result<(), ContractError>;

    /// Claim all free capacity of `region` as one namespace
    async fn create_namespace(
        &self,
        region: &Region,
        mode: NamespaceMode,
    ) -> Result<Namespace, ContractError>;

    /// Wipe the platform configuration data on every DIMM
    async fn delete_pcd(&self) -> Result<(), ContractError>;

    async fn clear_error_logs(&self) -> Result<(), ContractError>;
}
