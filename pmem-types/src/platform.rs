// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Operating system running on the system under test.
///
/// Resolved once when a provisioning run is constructed; every
/// OS-specific behaviour hangs off this closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Windows,
}

impl Platform {
    pub fn name(self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Windows => "windows",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Platform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linux" => Ok(Platform::Linux),
            "windows" => Ok(Platform::Windows),
            other => Err(anyhow::anyhow!("unsupported platform: {}", other)),
        }
    }
}

/// Memory topology the BIOS is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topology {
    /// DDR is system memory, persistent memory is AppDirect only
    #[serde(rename = "1lm")]
    OneLevel,
    /// DDR acts as a cache in front of persistent memory used as volatile memory
    #[serde(rename = "2lm")]
    TwoLevel,
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topology::OneLevel => f.write_str("1LM"),
            Topology::TwoLevel => f.write_str("2LM"),
        }
    }
}
