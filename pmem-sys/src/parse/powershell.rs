// SPDX-License-Identifier: GPL-3.0-only

//! PowerShell persistent memory cmdlets, read through `ConvertTo-Json`

use pmem_types::{Namespace, NamespaceMode, Region};
use serde::Deserialize;

use super::one_or_many;
use crate::Result;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PmemDisk {
    disk_number: u32,
    size: u64,
    #[serde(default)]
    atomicity_type: Option<serde_json::Value>,
    #[serde(default)]
    region_id: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UnusedRegion {
    region_id: serde_json::Value,
    #[serde(default)]
    socket_id: Option<u32>,
    size: u64,
}

/// Enum values arrive as either their name or their ordinal
fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn atomicity_mode(value: Option<&serde_json::Value>) -> NamespaceMode {
    match value.map(value_text).as_deref() {
        Some("BlockTranslationTable") | Some("1") => NamespaceMode::Sector,
        _ => NamespaceMode::Dax,
    }
}

/// `Get-PmemDisk | Select-Object ... | ConvertTo-Json`
pub fn parse_pmem_disks(raw: &str) -> Result<Vec<Namespace>> {
    let disks: Vec<PmemDisk> = one_or_many("Get-PmemDisk", raw)?;
    Ok(disks
        .into_iter()
        .map(|disk| Namespace {
            id: disk.disk_number.to_string(),
            block_device: disk.disk_number.to_string(),
            region_id: disk.region_id.as_ref().map(value_text).unwrap_or_default(),
            capacity: disk.size,
            mode: atomicity_mode(disk.atomicity_type.as_ref()),
        })
        .collect())
}

/// `Get-PmemUnusedRegion | Select-Object ... | ConvertTo-Json`
pub fn parse_unused_regions(raw: &str) -> Result<Vec<Region>> {
    let regions: Vec<UnusedRegion> = one_or_many("Get-PmemUnusedRegion", raw)?;
    Ok(regions
        .into_iter()
        .map(|region| Region {
            socket: region.socket_id,
            ..Region::new(value_text(&region.region_id), region.size)
        })
        .collect())
}
