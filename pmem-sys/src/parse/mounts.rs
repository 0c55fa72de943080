// SPDX-License-Identifier: GPL-3.0-only

//! Block device listings, the mount table and fstab entries

use pmem_types::FilesystemKind;

/// Fixed root under which provisioned partitions are mounted
pub const MOUNT_ROOT: &str = "/mnt";

/// Prefix of every provisioned mount directory
pub const MOUNT_PREFIX: &str = "QM-";

pub fn mount_path(index: usize) -> String {
    format!("{}/{}{}", MOUNT_ROOT, MOUNT_PREFIX, index)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDevice {
    pub name: String,
    pub kind: String,
}

/// `lsblk -ln -o NAME,TYPE`
pub fn parse_lsblk(output: &str) -> Vec<BlockDevice> {
    output
        .lines()
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let name = cols.next()?;
            let kind = cols.next()?;
            Some(BlockDevice {
                name: name.to_string(),
                kind: kind.to_string(),
            })
        })
        .collect()
}

fn partition_number(disk: &str, name: &str) -> Option<u32> {
    let rest = name.strip_prefix(disk)?;
    let rest = rest.strip_prefix('p').unwrap_or(rest);
    rest.parse().ok()
}

/// Partition devices of `disk` ("pmem0p1", "pmem0p2", ...) in numeric order
pub fn partitions_of(devices: &[BlockDevice], disk: &str) -> Vec<String> {
    let mut partitions: Vec<(u32, String)> = devices
        .iter()
        .filter(|device| device.kind == "part")
        .filter_map(|device| {
            partition_number(disk, &device.name).map(|number| (number, device.name.clone()))
        })
        .collect();
    partitions.sort();
    partitions.into_iter().map(|(_, name)| name).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub source: String,
    pub target: String,
    pub fstype: String,
    pub options: Vec<String>,
}

impl MountEntry {
    pub fn is_dax(&self) -> bool {
        self.options
            .iter()
            .any(|option| option == "dax" || option.starts_with("dax="))
    }
}

/// Output of `mount`: `<source> on <target> type <fstype> (<options>)`
pub fn parse_mount_output(output: &str) -> Vec<MountEntry> {
    output
        .lines()
        .filter_map(|line| {
            let (source, rest) = line.split_once(" on ")?;
            let (target, rest) = rest.split_once(" type ")?;
            let (fstype, options) = rest.split_once(' ').unwrap_or((rest, ""));
            let options = options
                .trim()
                .trim_start_matches('(')
                .trim_end_matches(')')
                .split(',')
                .filter(|option| !option.is_empty())
                .map(str::to_string)
                .collect();
            Some(MountEntry {
                source: source.trim().to_string(),
                target: target.trim().to_string(),
                fstype: fstype.to_string(),
                options,
            })
        })
        .collect()
}

/// Persistent mount table line for a provisioned partition
pub fn fstab_entry(device: &str, path: &str, filesystem: FilesystemKind, dax: bool) -> String {
    let options = if dax { "defaults,dax,nofail" } else { "defaults,nofail" };
    format!("/dev/{} {} {} {} 0 1", device, path, filesystem, options)
}
