// SPDX-License-Identifier: GPL-3.0-only

//! ndctl JSON output

use pmem_types::{Namespace, NamespaceMode, Region};
use serde::Deserialize;

use super::one_or_many;
use crate::{Result, SysError};

#[derive(Debug, Deserialize)]
struct NdctlRegion {
    dev: String,
    size: u64,
    #[serde(default)]
    available_size: Option<u64>,
    #[serde(default)]
    iset_id: Option<serde_json::Value>,
    #[serde(default)]
    numa_node: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct NdctlNamespace {
    dev: String,
    #[serde(default)]
    mode: Option<String>,
    size: u64,
    #[serde(default)]
    blockdev: Option<String>,
}

/// "namespace1.0" belongs to "region1"
fn region_of(namespace: &str) -> Option<String> {
    let index = namespace.strip_prefix("namespace")?.split('.').next()?;
    Some(format!("region{}", index))
}

fn namespace_from(raw: NdctlNamespace) -> Result<Namespace> {
    let mode = raw.mode.as_deref().unwrap_or("raw");
    let mode = NamespaceMode::from_ndctl(mode)
        .ok_or_else(|| SysError::parse("ndctl", format!("unknown namespace mode {}", mode)))?;
    let region_id = region_of(&raw.dev)
        .ok_or_else(|| SysError::parse("ndctl", format!("unexpected namespace {}", raw.dev)))?;

    Ok(Namespace {
        block_device: raw.blockdev.unwrap_or_default(),
        id: raw.dev,
        region_id,
        capacity: raw.size,
        mode,
    })
}

/// `ndctl list --regions`
pub fn parse_regions(raw: &str) -> Result<Vec<Region>> {
    let regions: Vec<NdctlRegion> = one_or_many("ndctl", raw)?;
    Ok(regions
        .into_iter()
        .map(|region| Region {
            free_capacity: region.available_size.unwrap_or(region.size),
            total_capacity: region.size,
            socket: region.numa_node,
            interleave_set_id: region.iset_id.map(|id| match id {
                serde_json::Value::String(id) => id,
                other => other.to_string(),
            }),
            id: region.dev,
        })
        .collect())
}

/// `ndctl list --namespaces`
pub fn parse_namespaces(raw: &str) -> Result<Vec<Namespace>> {
    let namespaces: Vec<NdctlNamespace> = one_or_many("ndctl", raw)?;
    namespaces.into_iter().map(namespace_from).collect()
}

/// `ndctl create-namespace` prints the namespace it created
pub fn parse_created_namespace(raw: &str) -> Result<Namespace> {
    parse_namespaces(raw)?
        .into_iter()
        .next()
        .ok_or_else(|| SysError::parse("ndctl", "create-namespace printed no namespace"))
}
