// SPDX-License-Identifier: GPL-3.0-only

//! Disk, partition and mount models

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::{GIB, MIB, parse_size};

/// A provisioned persistent memory disk as the OS exposes it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiskHandle {
    /// Block device name ("pmem0") or disk number ("3")
    pub name: String,

    /// Numeric disk index, when the platform addresses disks by number
    pub index: Option<u32>,
}

impl DiskHandle {
    pub fn block_device(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: None,
        }
    }

    pub fn disk_number(index: u32) -> Self {
        Self {
            name: index.to_string(),
            index: Some(index),
        }
    }

    pub fn device_path(&self) -> String {
        format!("/dev/{}", self.name)
    }
}

impl fmt::Display for DiskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "disk {}", index),
            None => f.write_str(&self.name),
        }
    }
}

/// Requested partition size; `Full` consumes whatever the disk has left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PartitionSize {
    Full,
    Bytes(u64),
}

impl PartitionSize {
    pub fn parse(value: &str) -> anyhow::Result<Self> {
        if value.trim().eq_ignore_ascii_case("full") {
            return Ok(PartitionSize::Full);
        }
        match parse_size(value)? {
            0 => Err(anyhow::anyhow!("partition size must be non-zero: {}", value)),
            bytes => Ok(PartitionSize::Bytes(bytes)),
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, PartitionSize::Full)
    }

    pub fn bytes(&self) -> Option<u64> {
        match self {
            PartitionSize::Full => None,
            PartitionSize::Bytes(bytes) => Some(*bytes),
        }
    }

    /// Size in MiB, the unit diskpart expects
    pub fn mib(&self) -> Option<u64> {
        self.bytes().map(|bytes| bytes.div_ceil(MIB))
    }
}

impl TryFrom<String> for PartitionSize {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PartitionSize::parse(&value)
    }
}

impl From<PartitionSize> for String {
    fn from(size: PartitionSize) -> Self {
        size.to_string()
    }
}

impl fmt::Display for PartitionSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionSize::Full => f.write_str("full"),
            PartitionSize::Bytes(bytes) if bytes % GIB == 0 => write!(f, "{}GB", bytes / GIB),
            PartitionSize::Bytes(bytes) if bytes % MIB == 0 => write!(f, "{}MB", bytes / MIB),
            PartitionSize::Bytes(bytes) => write!(f, "{}B", bytes),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilesystemKind {
    Ext4,
    Xfs,
    Ntfs,
}

impl FilesystemKind {
    pub fn name(self) -> &'static str {
        match self {
            FilesystemKind::Ext4 => "ext4",
            FilesystemKind::Xfs => "xfs",
            FilesystemKind::Ntfs => "ntfs",
        }
    }
}

impl fmt::Display for FilesystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a filesystem is used with direct access or through the page cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Dax,
    Block,
}

impl AccessMode {
    pub fn is_dax(self) -> bool {
        matches!(self, AccessMode::Dax)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionTableType {
    Gpt,
    Mbr,
}

impl PartitionTableType {
    pub fn name(self) -> &'static str {
        match self {
            PartitionTableType::Gpt => "gpt",
            PartitionTableType::Mbr => "mbr",
        }
    }
}

/// Where a partition ends up: a drive letter or a mount path.
///
/// Both forms are stored as plain strings in the partition ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MountIdentifier {
    DriveLetter(char),
    MountPath(String),
}

impl MountIdentifier {
    pub fn from_ledger_entry(entry: &str) -> Self {
        let entry = entry.trim();
        let mut chars = entry.chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) if letter.is_ascii_alphabetic() => {
                MountIdentifier::DriveLetter(letter.to_ascii_uppercase())
            }
            _ => MountIdentifier::MountPath(entry.to_string()),
        }
    }

    pub fn to_ledger_entry(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MountIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountIdentifier::DriveLetter(letter) => write!(f, "{}", letter),
            MountIdentifier::MountPath(path) => f.write_str(path),
        }
    }
}

/// A partition created on a provisioned disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub owner: DiskHandle,

    /// Partition device ("pmem0p1"), or the partition number on Windows
    pub device: String,

    pub size: PartitionSize,

    pub filesystem: FilesystemKind,

    pub mount: Option<MountIdentifier>,
}

/// Lifecycle of one disk during a provisioning pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskState {
    Unpartitioned,
    GptLabeled,
    Partitioned,
    FilesystemApplied,
    /// Mounted on Linux, lettered on Windows
    Mounted,
    Verified,
}

impl DiskState {
    /// Move forward to `next`. Partitioning again from a later state is
    /// allowed because sized partitions are added in stages.
    pub fn advance(self, next: DiskState) -> Option<DiskState> {
        use DiskState::*;
        let allowed = match (self, next) {
            (_, Unpartitioned) => true,
            (Unpartitioned, GptLabeled) | (GptLabeled, GptLabeled) => true,
            (GptLabeled, Partitioned) => true,
            (Partitioned | FilesystemApplied | Mounted | Verified, Partitioned) => true,
            (Partitioned, FilesystemApplied) => true,
            (Partitioned | FilesystemApplied, Mounted) => true,
            (Mounted, Verified) => true,
            _ => false,
        };
        allowed.then_some(next)
    }
}
