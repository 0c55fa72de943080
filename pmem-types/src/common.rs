// SPDX-License-Identifier: GPL-3.0-only

//! Byte and unit helpers shared across models

use anyhow::Result;
use num_format::{Locale, ToFormattedString};

/// One mebibyte
pub const MIB: u64 = 1024 * 1024;

/// One gibibyte, the unit ipmctl reports capacities in
pub const GIB: u64 = 1024 * MIB;

/// Convert a (possibly fractional) GiB reading into bytes
pub fn gib_to_bytes(gib: f64) -> u64 {
    if gib <= 0. {
        return 0;
    }
    (gib * GIB as f64).round() as u64
}

/// Convert bytes to human-readable format (e.g., "1.50 GB")
pub fn bytes_to_pretty(bytes: &u64, add_bytes: bool) -> String {
    let mut steps = 0;
    let mut val: f64 = *bytes as f64;

    while val > 1024. && steps <= 5 {
        val /= 1024.;
        steps += 1;
    }

    let unit = match steps {
        0 => "B",
        1 => "KB",
        2 => "MB",
        3 => "GB",
        4 => "TB",
        5 => "PB",
        _ => "EB",
    };

    if add_bytes {
        let bytes_str = bytes.to_formatted_string(&Locale::en);
        format!("{:.2} {} ({} bytes)", val, unit, bytes_str)
    } else {
        format!("{:.2} {}", val, unit)
    }
}

/// Parse a compact size such as `16GB`, `512MiB` or `2 GiB`.
///
/// The `GB`/`GiB` suffixes are both treated as binary units because the
/// partitioning tools on both platforms interpret sizes that way.
pub fn parse_size(value: &str) -> Result<u64> {
    let value = value.trim();
    let split_at = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split_at);
    if number.is_empty() {
        return Err(anyhow::anyhow!("Invalid size: {}", value));
    }

    let number: f64 = number.parse()?;
    let unit = unit.trim();
    let unit = if unit.is_empty() { "B" } else { unit };

    Ok((number * unit_multiplier(unit)? as f64) as u64)
}

fn unit_multiplier(unit: &str) -> Result<u64> {
    let steps = match unit.to_ascii_uppercase().as_str() {
        "B" => 0,
        "KB" | "KIB" | "K" => 1,
        "MB" | "MIB" | "M" => 2,
        "GB" | "GIB" | "G" => 3,
        "TB" | "TIB" | "T" => 4,
        _ => return Err(anyhow::anyhow!("Invalid unit: {}", unit)),
    };

    Ok(1024_u64.pow(steps))
}
