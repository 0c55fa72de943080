// SPDX-License-Identifier: GPL-3.0-only

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pmem_contracts::{ContractError, ContractErrorKind, PartitionRequest, PartitionStrategy, SutShell};
use pmem_sys::parse::diskpart;
use pmem_types::{
    AccessMode, DiskHandle, FilesystemKind, MountIdentifier, Namespace, Partition,
    PartitionTableType,
};
use tracing::{info, warn};

use crate::ledger::Ledger;

/// Script file diskpart is pointed at on the system under test
pub const DISKPART_SCRIPT: &str = "pmem-diskpart.txt";

/// diskpart scripts and `format` against numbered pmem disks
pub struct WindowsPartitioner {
    shell: Arc<dyn SutShell>,
    ledger: Ledger,
    timeout: Duration,
}

fn disk_index(disk: &DiskHandle) -> Result<u32, ContractError> {
    disk.index.ok_or_else(|| {
        ContractError::new(
            ContractErrorKind::InvalidInput,
            format!("{} has no disk number", disk.name),
        )
    })
}

impl WindowsPartitioner {
    pub fn new(shell: Arc<dyn SutShell>, ledger: Ledger, timeout: Duration) -> Self {
        Self {
            shell,
            ledger,
            timeout,
        }
    }

    async fn diskpart(&self, lines: &[String]) -> Result<String, ContractError> {
        let mut script = lines.join("\n");
        script.push('\n');
        self.shell
            .write_file(DISKPART_SCRIPT, &script, self.timeout)
            .await?;
        let output = self
            .shell
            .exec_checked(&format!("diskpart /s {}", DISKPART_SCRIPT), self.timeout)
            .await?;
        Ok(output.stdout)
    }

    async fn gpt_disks(&self) -> Result<BTreeSet<u32>, ContractError> {
        let listing = self.diskpart(&["list disk".to_string()]).await?;
        Ok(diskpart::parse_list_disk(&listing)
            .into_iter()
            .filter(|disk| disk.gpt)
            .map(|disk| disk.index)
            .collect())
    }

    fn ledger_letters(&self) -> Result<BTreeSet<char>, ContractError> {
        Ok(self
            .ledger
            .identifiers()?
            .into_iter()
            .filter_map(|identifier| match identifier {
                MountIdentifier::DriveLetter(letter) => Some(letter),
                MountIdentifier::MountPath(_) => None,
            })
            .collect())
    }

    /// A letter in D..Z neither visible on the system nor recorded in the ledger
    async fn free_drive_letter(&self) -> Result<char, ContractError> {
        let volumes = self.diskpart(&["list volume".to_string()]).await?;
        let mut taken = diskpart::volume_letters(&volumes);
        taken.extend(self.ledger_letters()?);
        ('D'..='Z')
            .find(|letter| !taken.contains(letter))
            .ok_or_else(|| {
                ContractError::new(ContractErrorKind::Unavailable, "no free drive letter in D..Z")
            })
    }
}

#[async_trait]
impl PartitionStrategy for WindowsPartitioner {
    async fn list_provisioned_disks(
        &self,
        namespaces: &[Namespace],
    ) -> Result<Vec<DiskHandle>, ContractError> {
        let mut numbers = BTreeSet::new();
        for namespace in namespaces {
            let number = namespace.block_device.trim().parse::<u32>().map_err(|_| {
                ContractError::unexpected_output(
                    "Get-PmemDisk",
                    format!("'{}' is not a disk number", namespace.block_device),
                )
            })?;
            numbers.insert(number);
        }
        Ok(numbers.into_iter().map(DiskHandle::disk_number).collect())
    }

    async fn create_gpt_label(&self, disks: &[DiskHandle]) -> Result<(), ContractError> {
        let gpt = self.gpt_disks().await?;
        for disk in disks {
            let index = disk_index(disk)?;
            if gpt.contains(&index) {
                continue;
            }
            self.diskpart(&[
                format!("select disk {}", index),
                "attributes disk clear readonly".to_string(),
                "convert gpt".to_string(),
            ])
            .await?;
        }
        Ok(())
    }

    async fn create_partition(
        &self,
        disks: &[DiskHandle],
        request: &PartitionRequest,
    ) -> Result<Vec<Partition>, ContractError> {
        let gpt = self.gpt_disks().await?;
        let mut created = Vec::with_capacity(disks.len());
        for disk in disks {
            let index = disk_index(disk)?;
            let letter = self.free_drive_letter().await?;

            let mut script = vec![
                format!("select disk {}", index),
                "attributes disk clear readonly".to_string(),
            ];
            match request.size.mib() {
                None => {
                    let is_gpt = gpt.contains(&index);
                    let wants_gpt = request.table == PartitionTableType::Gpt;
                    if is_gpt != wants_gpt {
                        script.push(format!("convert {}", request.table.name()));
                    }
                    script.push("create partition primary".to_string());
                }
                Some(length) => {
                    script.push(format!("create partition primary size={}", length));
                }
            }
            script.push(format!("assign letter={}", letter));
            self.diskpart(&script).await?;

            let dax = if request.access.is_dax() { " /DAX" } else { "" };
            self.shell
                .exec_checked(
                    &format!(
                        "format {}: /FS:{} /Q /Y{}",
                        letter,
                        request.filesystem.name().to_uppercase(),
                        dax
                    ),
                    self.timeout,
                )
                .await?;
            self.ledger.append(&letter.to_string())?;
            info!("created {} partition {}: on {}", request.size, letter, disk);

            created.push(Partition {
                owner: disk.clone(),
                device: format!("{}:", letter),
                size: request.size,
                filesystem: request.filesystem,
                mount: Some(MountIdentifier::DriveLetter(letter)),
            });
        }
        Ok(created)
    }

    async fn list_partition_devices(
        &self,
        disks: &[DiskHandle],
    ) -> Result<Vec<String>, ContractError> {
        Ok(disks.iter().map(|disk| disk.name.clone()).collect())
    }

    async fn create_filesystem(
        &self,
        _disks: &[DiskHandle],
        _filesystem: FilesystemKind,
    ) -> Result<(), ContractError> {
        info!("partitions are formatted as they are created");
        Ok(())
    }

    async fn create_mount_points(
        &self,
        _disks: &[DiskHandle],
        _filesystem: FilesystemKind,
        _access: AccessMode,
    ) -> Result<Vec<MountIdentifier>, ContractError> {
        info!("partitions are lettered as they are created");
        Ok(self.ledger.identifiers()?)
    }

    async fn delete_partitions(&self, disks: &[DiskHandle]) -> Result<(), ContractError> {
        for disk in disks {
            let index = disk_index(disk)?;
            self.diskpart(&[
                format!("select disk {}", index),
                "attributes disk clear readonly".to_string(),
                "clean".to_string(),
            ])
            .await?;
        }
        self.ledger.delete()?;
        Ok(())
    }

    async fn verify_partitions(
        &self,
        disks: &[DiskHandle],
        expected: Option<&[MountIdentifier]>,
    ) -> Result<bool, ContractError> {
        let expected: BTreeSet<char> = match expected {
            Some(identifiers) => identifiers
                .iter()
                .filter_map(|identifier| match identifier {
                    MountIdentifier::DriveLetter(letter) => Some(*letter),
                    MountIdentifier::MountPath(_) => None,
                })
                .collect(),
            None => self.ledger_letters()?,
        };

        let mut sufficient = !disks.is_empty();
        let mut visible = BTreeSet::new();
        for disk in disks {
            let detail = self
                .diskpart(&[
                    format!("select disk {}", disk_index(disk)?),
                    "detail disk".to_string(),
                ])
                .await?;
            let health = diskpart::volume_health(&detail);
            if !health.is_sufficient() {
                warn!(
                    "{}: {} healthy volumes for {} letters",
                    disk,
                    health.healthy,
                    health.letters.len()
                );
                sufficient = false;
            }
            visible.extend(health.letters);
        }

        let missing: Vec<char> = expected.difference(&visible).copied().collect();
        if !missing.is_empty() {
            warn!("drive letters not visible: {:?}", missing);
        }
        Ok(sufficient && !expected.is_empty() && missing.is_empty())
    }

    async fn verify_mount_points(&self, _disks: &[DiskHandle]) -> Result<bool, ContractError> {
        Ok(true)
    }

    async fn disk_information(&self, disks: &[DiskHandle]) -> Result<Vec<String>, ContractError> {
        let mut information = Vec::with_capacity(disks.len());
        for disk in disks {
            information.push(
                self.diskpart(&[
                    format!("select disk {}", disk_index(disk)?),
                    "list partition".to_string(),
                ])
                .await?,
            );
        }
        Ok(information)
    }

    async fn release_mounts(&self) -> Result<(), ContractError> {
        Ok(())
    }
}
