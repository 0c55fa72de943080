// SPDX-License-Identifier: GPL-3.0-only

//! Capacity arithmetic used by every verification step.
//!
//! All functions here are pure: they take parsed snapshots and return a
//! verdict, so each can be checked without a system under test.

use crate::dimm::Dimm;
use crate::region::Region;

/// Sum of the raw capacity of every healthy DIMM in the snapshot.
pub fn aggregate_capacity(dimms: &[Dimm]) -> u64 {
    dimms
        .iter()
        .filter(|dimm| dimm.is_healthy())
        .map(|dimm| dimm.capacity_bytes)
        .sum()
}

/// One-sided variance band capped at the configured value.
///
/// Passes when `configured * (1 - variance) <= observed <= configured`.
/// Firmware reserve and rounding only ever shrink a reading, so a reading
/// above the configured value is a failure, not noise.
pub fn within_variance(observed: u64, configured: u64, variance: f64) -> bool {
    if observed > configured {
        return false;
    }
    let floor = configured as f64 * (1. - variance);
    observed as f64 >= floor
}

/// Symmetric tolerance band: `|observed - expected| <= expected * tolerance`.
pub fn within_tolerance(observed: u64, expected: u64, tolerance: f64) -> bool {
    let delta = observed.abs_diff(expected) as f64;
    delta <= expected as f64 * tolerance
}

/// True only if there is at least one region and none has been carved yet.
pub fn region_free_equals_total(regions: &[Region]) -> bool {
    !regions.is_empty() && regions.iter().all(Region::is_untouched)
}
