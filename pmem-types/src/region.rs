// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::goal::MemoryKind;

/// An interleaved persistent memory region created by an applied goal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Region identifier ("region0" on Linux, "1" on Windows)
    pub id: String,

    pub socket: Option<u32>,

    /// Total capacity in bytes
    pub total_capacity: u64,

    /// Capacity not yet claimed by a namespace
    pub free_capacity: u64,

    pub interleave_set_id: Option<String>,
}

impl Region {
    pub fn new(id: impl Into<String>, total_capacity: u64) -> Self {
        Self {
            id: id.into(),
            socket: None,
            total_capacity,
            free_capacity: total_capacity,
            interleave_set_id: None,
        }
    }

    pub fn is_untouched(&self) -> bool {
        self.free_capacity == self.total_capacity
    }

    /// Claim `bytes` of free capacity for a namespace and return what is left
    pub fn carve(&mut self, bytes: u64) -> anyhow::Result<u64> {
        if bytes > self.free_capacity {
            return Err(anyhow::anyhow!(
                "region {} has {} bytes free, cannot carve {}",
                self.id,
                self.free_capacity,
                bytes
            ));
        }
        self.free_capacity -= bytes;
        Ok(self.free_capacity)
    }
}

/// Access mode of a namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceMode {
    /// Direct access, page-cache bypassing
    Dax,
    /// Raw block device
    Block,
    /// Block device with atomic sector updates
    Sector,
}

impl NamespaceMode {
    /// Name understood by `ndctl create-namespace --mode`
    pub fn ndctl_name(self) -> &'static str {
        match self {
            NamespaceMode::Dax => "fsdax",
            NamespaceMode::Block => "raw",
            NamespaceMode::Sector => "sector",
        }
    }

    pub fn from_ndctl(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fsdax" | "devdax" | "dax" | "memory" => Some(NamespaceMode::Dax),
            "raw" | "block" => Some(NamespaceMode::Block),
            "sector" => Some(NamespaceMode::Sector),
            _ => None,
        }
    }
}

impl fmt::Display for NamespaceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamespaceMode::Dax => f.write_str("dax"),
            NamespaceMode::Block => f.write_str("block"),
            NamespaceMode::Sector => f.write_str("sector"),
        }
    }
}

/// A namespace carved from a region and exposed as a block device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    /// Tool identifier ("namespace0.0", or the Windows disk number)
    pub id: String,

    /// OS device: "pmem0" on Linux, the disk number on Windows
    pub block_device: String,

    pub region_id: String,

    /// Usable capacity in bytes
    pub capacity: u64,

    pub mode: NamespaceMode,
}

/// Provisioned capacity as reported by the memory resource query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryResources {
    pub physical: u64,
    pub volatile: u64,
    pub app_direct: u64,
    pub reserved: u64,
}

impl MemoryResources {
    pub fn provisioned(&self, kind: MemoryKind) -> u64 {
        match kind {
            MemoryKind::Persistent => self.app_direct,
            MemoryKind::Volatile => self.volatile,
        }
    }
}
