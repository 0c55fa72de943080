// SPDX-License-Identifier: GPL-3.0-only

//! `parted -s <disk> unit B print`

use pmem_types::parse_size;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartedPartition {
    pub number: u32,
    pub start: u64,
    pub end: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartedTable {
    pub disk_size: Option<u64>,
    pub label: Option<String>,
    pub partitions: Vec<PartedPartition>,
}

impl PartedTable {
    /// Last byte used by any partition
    pub fn last_end(&self) -> Option<u64> {
        self.partitions.iter().map(|partition| partition.end).max()
    }

    pub fn numbers(&self) -> Vec<u32> {
        self.partitions.iter().map(|partition| partition.number).collect()
    }
}

/// parted refuses to print a disk without a label; such a disk has no partitions
pub fn unrecognised_label(output: &str) -> bool {
    let output = output.to_lowercase();
    output.contains("unrecognised disk label") || output.contains("unrecognized disk label")
}

pub fn parse_print(output: &str) -> PartedTable {
    let mut table = PartedTable::default();
    let mut in_rows = false;

    for line in output.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("Disk /dev/") {
            table.disk_size = rest
                .rsplit(':')
                .next()
                .and_then(|size| parse_size(size).ok());
        } else if let Some(label) = trimmed.strip_prefix("Partition Table:") {
            let label = label.trim();
            if label != "unknown" {
                table.label = Some(label.to_string());
            }
        } else if trimmed.starts_with("Number") {
            in_rows = true;
        } else if in_rows {
            let cols: Vec<&str> = trimmed.split_whitespace().collect();
            if cols.len() < 4 {
                continue;
            }
            let parsed = (
                cols[0].parse::<u32>(),
                parse_size(cols[1]),
                parse_size(cols[2]),
                parse_size(cols[3]),
            );
            if let (Ok(number), Ok(start), Ok(end), Ok(size)) = parsed {
                table.partitions.push(PartedPartition {
                    number,
                    start,
                    end,
                    size,
                });
            }
        }
    }
    table
}
