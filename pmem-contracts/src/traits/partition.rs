// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;

use pmem_types::{
    AccessMode, DiskHandle, FilesystemKind, MountIdentifier, Namespace, Partition, PartitionSize,
    PartitionTableType,
};

use crate::ContractError;

/// One partitioning stage applied to every provisioned disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionRequest {
    pub filesystem: FilesystemKind,
    pub access: AccessMode,
    pub size: PartitionSize,
    /// Table a full-size request converts the disk to
    pub table: PartitionTableType,
}

/// OS-specific partitioning, formatting and mounting of provisioned disks
#[async_trait]
pub trait PartitionStrategy: Send + Sync {
    /// Ordered disks backing `namespaces`
    async fn list_provisioned_disks(
        &self,
        namespaces: &[Namespace],
    ) -> Result<Vec<DiskHandle>, ContractError>;

    /// Label every disk GPT; safe on disks that already are
    async fn create_gpt_label(&self, disks: &[DiskHandle]) -> Result<(), ContractError>;

    async fn create_partition(
        &self,
        disks: &[DiskHandle],
        request: &PartitionRequest,
    ) -> Result<Vec<Partition>, ContractError>;

    /// Partition devices on `disks`, in creation order
    async fn list_partition_devices(&self, disks: &[DiskHandle])
    -> Result<Vec<String>, ContractError>;

    async fn create_filesystem(
        &self,
        disks: &[DiskHandle],
        filesystem: FilesystemKind,
    ) -> Result<(), ContractError>;

    async fn create_mount_points(
        &self,
        disks: &[DiskHandle],
        filesystem: FilesystemKind,
        access: AccessMode,
    ) -> Result<Vec<MountIdentifier>, ContractError>;

    /// Remove every partition of every disk; succeeds on empty disks
    async fn delete_partitions(&self, disks: &[DiskHandle]) -> Result<(), ContractError>;

    async fn verify_partitions(
        &self,
        disks: &[DiskHandle],
        expected: Option<&[MountIdentifier]>,
    ) -> Result<bool, ContractError>;

    async fn verify_mount_points(&self, disks: &[DiskHandle]) -> Result<bool, ContractError>;

    /// Partition table of each disk as the OS prints it
    async fn disk_information(&self, disks: &[DiskHandle]) -> Result<Vec<String>, ContractError>;

    /// Undo mounts recorded in the ledger; succeeds when there are none
    async fn release_mounts(&self) -> Result<(), ContractError>;
}
