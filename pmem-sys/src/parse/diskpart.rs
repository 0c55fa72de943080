// SPDX-License-Identifier: GPL-3.0-only

//! diskpart transcripts

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

static VOLUME_LETTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*Volume\s+\d+\s+([A-BD-Z])\s").expect("valid regex")
});
static HEALTHY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)healthy").expect("valid regex"));
static DISK_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\*?\s*Disk\s+(\d+)\s").expect("valid regex"));

/// One row of `list disk`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskpartDisk {
    pub index: u32,
    pub gpt: bool,
}

/// `list disk`; the Gpt column is located from the header
pub fn parse_list_disk(output: &str) -> Vec<DiskpartDisk> {
    let mut gpt_column = None;
    let mut disks = Vec::new();

    for line in output.lines() {
        if let Some(column) = line.find("Gpt") {
            gpt_column = Some(column);
            continue;
        }
        let Some(captures) = DISK_ROW.captures(line) else {
            continue;
        };
        let Ok(index) = captures[1].parse() else {
            continue;
        };
        let gpt = gpt_column
            .and_then(|column| line.get(column..))
            .map(|rest| rest.trim_start().starts_with('*'))
            .unwrap_or(false);
        disks.push(DiskpartDisk { index, gpt });
    }
    disks
}

/// Drive letters assigned to volumes in a `list volume` or `detail disk` transcript
pub fn volume_letters(output: &str) -> BTreeSet<char> {
    VOLUME_LETTER
        .captures_iter(output)
        .filter_map(|captures| captures[1].chars().next())
        .collect()
}

/// Health summary of a `detail disk` transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeHealth {
    pub has_partition: bool,
    pub healthy: usize,
    pub letters: BTreeSet<char>,
}

impl VolumeHealth {
    /// At least as many "Healthy" markers as lettered volumes.
    ///
    /// Counts are compared, not individual letters.
    pub fn is_sufficient(&self) -> bool {
        self.has_partition && self.healthy >= self.letters.len()
    }
}

pub fn volume_health(output: &str) -> VolumeHealth {
    VolumeHealth {
        has_partition: output.contains("Partition"),
        healthy: HEALTHY.find_iter(output).count(),
        letters: volume_letters(output),
    }
}
