// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use pmem_contracts::PmemToolkit;
use pmem_types::{Namespace, NamespaceMode, Region, within_variance};
use tracing::{info, warn};

use crate::errors::{ProvisioningError, Result};
use crate::reboot::{RebootRequired, Settled};

/// Namespace and region lifecycle on top of the platform toolkit
pub struct NamespaceManager {
    toolkit: Arc<dyn PmemToolkit>,
}

impl NamespaceManager {
    pub fn new(toolkit: Arc<dyn PmemToolkit>) -> Self {
        Self { toolkit }
    }

    pub async fn list_namespaces(&self) -> Result<Vec<Namespace>> {
        Ok(self.toolkit.list_namespaces().await?)
    }

    /// Destroy every namespace. Returns how many existed; none is not an error.
    pub async fn clear_if_present(&self) -> Result<usize> {
        let existing = self.toolkit.list_namespaces().await?;
        if existing.is_empty() {
            info!("no namespaces to clear");
            return Ok(0);
        }
        info!("destroying {} namespaces", existing.len());
        self.toolkit.destroy_namespaces().await?;
        Ok(existing.len())
    }

    /// Wipe the platform configuration data. Nothing about the DIMMs can be
    /// trusted until the returned token has been settled.
    pub async fn delete_pcd_metadata(&self, settled: Settled) -> Result<RebootRequired> {
        info!("deleting platform configuration data (boot {})", settled.boot());
        self.toolkit.delete_pcd().await?;
        Ok(RebootRequired::new("platform configuration data deleted"))
    }

    pub async fn list_regions(&self, _settled: &Settled) -> Result<Vec<Region>> {
        Ok(self.toolkit.list_regions().await?)
    }

    pub async fn list_unused_regions(&self, _settled: &Settled) -> Result<Vec<Region>> {
        Ok(self.toolkit.list_unused_regions().await?)
    }

    pub async fn create_namespace(
        &self,
        _settled: &Settled,
        region: &Region,
        mode: NamespaceMode,
    ) -> Result<Namespace> {
        info!("creating {:?} namespace on {}", mode, region.id);
        Ok(self.toolkit.create_namespace(region, mode).await?)
    }

    /// One namespace per region. The regions are carved by the capacity
    /// each namespace claimed, so the caller sees the remaining free space.
    pub async fn create_per_region(
        &self,
        settled: &Settled,
        regions: &mut [Region],
        mode: NamespaceMode,
    ) -> Result<Vec<Namespace>> {
        let mut created = Vec::with_capacity(regions.len());
        for region in regions.iter_mut() {
            let namespace = self.create_namespace(settled, region, mode).await?;
            region
                .carve(namespace.capacity)
                .map_err(|error| ProvisioningError::StepVerification {
                    step: format!("create namespace on {}", region.id),
                    reason: error.to_string(),
                })?;
            created.push(namespace);
        }
        Ok(created)
    }
}

/// Regions missing an interleave set id
pub fn regions_without_interleave_set(regions: &[Region]) -> Vec<String> {
    regions
        .iter()
        .filter(|region| {
            region
                .interleave_set_id
                .as_deref()
                .is_none_or(|id| id.trim().is_empty())
        })
        .map(|region| region.id.clone())
        .collect()
}

pub fn verify_presence(namespaces: &[Namespace], expected: usize) -> bool {
    if namespaces.len() != expected {
        warn!("expected {} namespaces, found {}", expected, namespaces.len());
        return false;
    }
    true
}

/// Total namespace capacity against the persistent share of the configured capacity
pub fn verify_capacity(namespaces: &[Namespace], expected: u64, variance: f64) -> (u64, bool) {
    let total: u64 = namespaces.iter().map(|namespace| namespace.capacity).sum();
    (total, within_variance(total, expected, variance))
}
