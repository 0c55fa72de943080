// SPDX-License-Identifier: GPL-3.0-only

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pmem_contracts::{ContractError, ContractErrorKind, PartitionRequest, PartitionStrategy, SutShell};
use pmem_sys::parse::{mounts, parted};
use pmem_types::{
    AccessMode, DiskHandle, FilesystemKind, MIB, MountIdentifier, Namespace, Partition,
};
use tracing::{debug, info, warn};

use crate::ledger::Ledger;

/// parted, mkfs and mount against `/dev/pmemN` block devices
pub struct LinuxPartitioner {
    shell: Arc<dyn SutShell>,
    ledger: Ledger,
    timeout: Duration,
}

impl LinuxPartitioner {
    pub fn new(shell: Arc<dyn SutShell>, ledger: Ledger, timeout: Duration) -> Self {
        Self {
            shell,
            ledger,
            timeout,
        }
    }

    async fn run(&self, command: &str) -> Result<String, ContractError> {
        Ok(self.shell.exec_checked(command, self.timeout).await?.stdout)
    }

    async fn block_devices(&self) -> Result<Vec<mounts::BlockDevice>, ContractError> {
        Ok(mounts::parse_lsblk(&self.run("lsblk -ln -o NAME,TYPE").await?))
    }

    async fn table(&self, disk: &DiskHandle) -> Result<parted::PartedTable, ContractError> {
        let command = format!("parted -s {} unit B print", disk.device_path());
        let output = self.shell.exec(&command, self.timeout).await?;
        // an unlabeled disk makes parted exit non-zero; that is an empty table
        if output.success()
            || parted::unrecognised_label(&output.stderr)
            || parted::unrecognised_label(&output.stdout)
        {
            return Ok(parted::parse_print(&output.stdout));
        }
        Err(ContractError::command_failed(&command, output.failure_detail()))
    }

    /// `mkpart` arguments for a sized partition placed after the last one
    async fn sized_bounds(&self, disk: &DiskHandle, length: u64) -> Result<(u64, u64), ContractError> {
        let table = self.table(disk).await?;
        let start = table
            .last_end()
            .map(|end| (end + 1).div_ceil(MIB))
            .unwrap_or(1);
        let end = start + length;
        if let Some(disk_size) = table.disk_size
            && end * MIB > disk_size
        {
            return Err(ContractError::new(
                ContractErrorKind::InvalidInput,
                format!(
                    "{} has {} bytes, a {}MiB partition at {}MiB does not fit",
                    disk, disk_size, length, start
                ),
            ));
        }
        Ok((start, end))
    }
}

#[async_trait]
impl PartitionStrategy for LinuxPartitioner {
    async fn list_provisioned_disks(
        &self,
        namespaces: &[Namespace],
    ) -> Result<Vec<DiskHandle>, ContractError> {
        let names: BTreeSet<&str> = namespaces
            .iter()
            .map(|namespace| namespace.block_device.trim())
            .filter(|name| !name.is_empty())
            .collect();
        Ok(names.into_iter().map(DiskHandle::block_device).collect())
    }

    async fn create_gpt_label(&self, disks: &[DiskHandle]) -> Result<(), ContractError> {
        for disk in disks {
            self.run(&format!("parted -s {} mklabel gpt", disk.device_path()))
                .await?;
        }
        Ok(())
    }

    async fn create_partition(
        &self,
        disks: &[DiskHandle],
        request: &PartitionRequest,
    ) -> Result<Vec<Partition>, ContractError> {
        let mut created = Vec::with_capacity(disks.len());
        for disk in disks {
            let command = match request.size.mib() {
                None => format!(
                    "parted -s -a optimal {} mkpart primary {} 0% 100%",
                    disk.device_path(),
                    request.filesystem
                ),
                Some(length) => {
                    let (start, end) = self.sized_bounds(disk, length).await?;
                    format!(
                        "parted -s -a optimal {} unit MiB mkpart primary {} {} {}",
                        disk.device_path(),
                        request.filesystem,
                        start,
                        end
                    )
                }
            };
            self.run(&command).await?;

            let devices = self.block_devices().await?;
            let device = mounts::partitions_of(&devices, &disk.name)
                .pop()
                .ok_or_else(|| {
                    ContractError::unexpected_output(
                        "lsblk",
                        format!("no partition listed on {} after mkpart", disk),
                    )
                })?;
            info!("created {} partition {} on {}", request.size, device, disk);
            created.push(Partition {
                owner: disk.clone(),
                device,
                size: request.size,
                filesystem: request.filesystem,
                mount: None,
            });
        }
        Ok(created)
    }

    async fn list_partition_devices(
        &self,
        disks: &[DiskHandle],
    ) -> Result<Vec<String>, ContractError> {
        let devices = self.block_devices().await?;
        Ok(disks
            .iter()
            .flat_map(|disk| mounts::partitions_of(&devices, &disk.name))
            .collect())
    }

    async fn create_filesystem(
        &self,
        disks: &[DiskHandle],
        filesystem: FilesystemKind,
    ) -> Result<(), ContractError> {
        let force = match filesystem {
            FilesystemKind::Xfs => "-f",
            _ => "-F",
        };
        let devices = self.list_partition_devices(disks).await?;
        if devices.is_empty() {
            warn!("no partitions to format");
        }
        for device in devices {
            self.run(&format!("mkfs.{} {} /dev/{}", filesystem, force, device))
                .await?;
        }
        Ok(())
    }

    async fn create_mount_points(
        &self,
        disks: &[DiskHandle],
        filesystem: FilesystemKind,
        access: AccessMode,
    ) -> Result<Vec<MountIdentifier>, ContractError> {
        let devices = self.list_partition_devices(disks).await?;
        let mut paths = Vec::with_capacity(devices.len());
        for (index, device) in devices.iter().enumerate() {
            let path = mounts::mount_path(index);
            self.run(&format!("mkdir -p {}", path)).await?;
            paths.push(path.clone());
            self.ledger.write(&paths)?;

            let options = if access.is_dax() { "-o dax " } else { "" };
            self.run(&format!("mount {}/dev/{} {}", options, device, path))
                .await?;
            let entry = mounts::fstab_entry(device, &path, filesystem, access.is_dax());
            self.run(&format!("echo '{}' >> /etc/fstab", entry)).await?;
            info!("mounted /dev/{} on {}", device, path);
        }
        Ok(paths.into_iter().map(MountIdentifier::MountPath).collect())
    }

    async fn delete_partitions(&self, disks: &[DiskHandle]) -> Result<(), ContractError> {
        for disk in disks {
            let table = self.table(disk).await?;
            for number in table.numbers().into_iter().rev() {
                self.run(&format!("parted -s {} rm {}", disk.device_path(), number))
                    .await?;
            }
            debug!("{} partitions removed from {}", table.partitions.len(), disk);
        }
        self.ledger.delete()?;
        Ok(())
    }

    async fn verify_partitions(
        &self,
        disks: &[DiskHandle],
        _expected: Option<&[MountIdentifier]>,
    ) -> Result<bool, ContractError> {
        let devices = self.block_devices().await?;
        let mut verified = !disks.is_empty();
        for disk in disks {
            if mounts::partitions_of(&devices, &disk.name).is_empty() {
                warn!("no partitions listed for {}", disk);
                verified = false;
            }
        }
        Ok(verified)
    }

    async fn verify_mount_points(&self, disks: &[DiskHandle]) -> Result<bool, ContractError> {
        let devices = self.list_partition_devices(disks).await?;
        let entries = mounts::parse_mount_output(&self.run("mount").await?);
        let paths = self.ledger.read()?;
        if devices.is_empty() || paths.is_empty() {
            warn!("nothing to verify: {} partitions, {} ledger paths", devices.len(), paths.len());
            return Ok(false);
        }

        let mut verified = true;
        for device in &devices {
            let source = format!("/dev/{}", device);
            if !entries.iter().any(|entry| entry.source == source) {
                warn!("{} is not mounted", source);
                verified = false;
            }
        }
        for path in &paths {
            if !entries.iter().any(|entry| &entry.target == path) {
                warn!("nothing is mounted on {}", path);
                verified = false;
            }
        }
        Ok(verified)
    }

    async fn disk_information(&self, disks: &[DiskHandle]) -> Result<Vec<String>, ContractError> {
        let mut information = Vec::with_capacity(disks.len());
        for disk in disks {
            information.push(
                self.run(&format!("parted -s {} unit GB print", disk.device_path()))
                    .await?,
            );
        }
        Ok(information)
    }

    async fn release_mounts(&self) -> Result<(), ContractError> {
        for path in self.ledger.read()? {
            let output = self
                .shell
                .exec(&format!("umount {}", path), self.timeout)
                .await?;
            if !output.success() {
                warn!("umount {}: {}", path, output.failure_detail().trim());
            }
        }
        let cleanup = format!(
            "sed -i '/\\{}\\/{}/d' /etc/fstab",
            mounts::MOUNT_ROOT,
            mounts::MOUNT_PREFIX
        );
        let output = self.shell.exec(&cleanup, self.timeout).await?;
        if !output.success() {
            warn!("fstab cleanup: {}", output.failure_detail().trim());
        }
        Ok(())
    }
}
