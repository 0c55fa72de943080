// SPDX-License-Identifier: GPL-3.0-only

//! ipmctl table output
//!
//! ipmctl prints `|`-separated tables with a header row followed by a row of
//! `=`. Anything outside the table (banners, reboot notices) is ignored.

use std::collections::BTreeMap;

use pmem_types::{
    Dimm, DimmLocation, GoalReport, GoalRow, HealthState, MemoryResources, Region, parse_size,
};

use crate::{Result, SysError};

/// Printed by `ipmctl create -goal` when the goal was accepted
pub const GOAL_CREATED_TOKEN: &str = "Created following region configuration goal";

type Row = BTreeMap<String, String>;

fn split_cells(line: &str) -> Vec<String> {
    line.split('|').map(|cell| cell.trim().to_string()).collect()
}

fn parse_table(output: &str) -> Vec<Row> {
    let mut header: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for line in output.lines() {
        let trimmed = line.trim();
        if !trimmed.contains('|') {
            if header.is_some() && !trimmed.is_empty() && !trimmed.starts_with('=') {
                header = None;
            }
            continue;
        }

        match &header {
            None => header = Some(split_cells(trimmed)),
            Some(names) => {
                let cells = split_cells(trimmed);
                if cells.len() != names.len() {
                    continue;
                }
                rows.push(names.iter().cloned().zip(cells).collect());
            }
        }
    }
    rows
}

/// "126.742 GiB" -> bytes; "-" and "N/A" read as zero
fn capacity(value: &str) -> u64 {
    parse_size(value).unwrap_or(0)
}

fn hex_or_decimal(value: &str) -> Option<u32> {
    let value = value.trim();
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

fn field<'a>(row: &'a Row, name: &str) -> Result<&'a str> {
    row.get(name)
        .map(String::as_str)
        .ok_or_else(|| SysError::parse("ipmctl", format!("missing column {}", name)))
}

/// `ipmctl show -dimm`
pub fn parse_dimms(output: &str) -> Result<Vec<Dimm>> {
    parse_table(output)
        .iter()
        .map(|row| {
            let id = field(row, "DimmID")?;
            let handle = hex_or_decimal(id)
                .ok_or_else(|| SysError::parse("ipmctl", format!("bad DimmID {}", id)))?;
            Ok(Dimm {
                id: id.to_string(),
                location: DimmLocation::from_handle(handle as u16),
                capacity_bytes: capacity(field(row, "Capacity")?),
                health: HealthState::parse(field(row, "HealthState")?),
            })
        })
        .collect()
}

/// `ipmctl create -goal` output
pub fn parse_goal(output: &str) -> Result<GoalReport> {
    let rows = parse_table(output)
        .iter()
        .map(|row| {
            let app_direct = capacity(field(row, "AppDirect1Size")?)
                + row.get("AppDirect2Size").map(|v| capacity(v)).unwrap_or(0);
            Ok(GoalRow {
                socket: hex_or_decimal(field(row, "SocketID")?).unwrap_or(0),
                dimm_id: field(row, "DimmID")?.to_string(),
                memory_size_bytes: capacity(field(row, "MemorySize")?),
                app_direct_size_bytes: app_direct,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(GoalReport {
        raw: output.to_string(),
        rows,
    })
}

/// `ipmctl show -memoryresources`, reading the persistent memory module column
pub fn parse_memory_resources(output: &str) -> Result<MemoryResources> {
    let rows = parse_table(output);
    let column = rows
        .first()
        .and_then(|row| {
            row.keys()
                .find(|name| name.contains("PMem") || name.contains("DCPMM"))
                .cloned()
        })
        .ok_or_else(|| SysError::parse("ipmctl", "no persistent memory column"))?;

    let mut resources = MemoryResources::default();
    for row in &rows {
        let value = capacity(row.get(&column).map(String::as_str).unwrap_or("-"));
        match row.get("MemoryType").map(String::as_str) {
            Some("Volatile") => resources.volatile = value,
            Some("AppDirect") => resources.app_direct = value,
            Some("Inaccessible") => resources.reserved = value,
            Some("Physical") => resources.physical = value,
            _ => {}
        }
    }
    Ok(resources)
}

/// `ipmctl show -region`
pub fn parse_regions(output: &str) -> Result<Vec<Region>> {
    parse_table(output)
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let id = row
                .get("RegionID")
                .cloned()
                .unwrap_or_else(|| index.to_string());
            let iset = row
                .get("ISetID")
                .filter(|value| !value.is_empty() && value.as_str() != "N/A")
                .cloned();
            Ok(Region {
                id,
                socket: row.get("SocketID").and_then(|value| hex_or_decimal(value)),
                total_capacity: capacity(field(row, "Capacity")?),
                free_capacity: capacity(field(row, "FreeCapacity")?),
                interleave_set_id: iset,
            })
        })
        .collect()
}
