// SPDX-License-Identifier: GPL-3.0-only

//! Persistent memory DIMM inventory models

use std::fmt;

use serde::{Deserialize, Serialize};

/// Physical position of a DIMM on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DimmLocation {
    pub socket: u8,
    pub controller: u8,
    pub channel: u8,
    pub slot: u8,
}

impl DimmLocation {
    /// Decode an ipmctl DIMM handle (`0xSMCD`: socket, memory controller,
    /// channel, slot nibbles).
    pub fn from_handle(handle: u16) -> Self {
        Self {
            socket: ((handle >> 12) & 0xF) as u8,
            controller: ((handle >> 8) & 0xF) as u8,
            channel: ((handle >> 4) & 0xF) as u8,
            slot: (handle & 0xF) as u8,
        }
    }
}

impl fmt::Display for DimmLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CPU{}_IMC{}_CH{}_DIMM{}",
            self.socket, self.controller, self.channel, self.slot
        )
    }
}

/// Health reported by the DIMM firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthState {
    Healthy,
    Degraded,
    Failed,
    Unknown,
}

impl HealthState {
    pub fn parse(value: &str) -> Self {
        let value = value.trim().to_ascii_lowercase();
        if value.starts_with("healthy") {
            HealthState::Healthy
        } else if value.contains("noncritical") || value.contains("degraded") {
            HealthState::Degraded
        } else if value.contains("critical") || value.contains("fatal") || value.contains("fail")
        {
            HealthState::Failed
        } else {
            HealthState::Unknown
        }
    }
}

/// One non-volatile DIMM as seen by a single inventory snapshot.
///
/// Snapshots are immutable and re-queried after every reboot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimm {
    /// Tool-specific DIMM identifier (e.g. "0x0001")
    pub id: String,

    pub location: DimmLocation,

    /// Raw capacity in bytes
    pub capacity_bytes: u64,

    pub health: HealthState,
}

impl Dimm {
    pub fn is_healthy(&self) -> bool {
        self.health == HealthState::Healthy
    }
}
