// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;

use serde::{Deserialize, Serialize};

/// The two ways persistent memory capacity can be exposed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    /// AppDirect: byte-addressable persistent storage
    Persistent,
    /// Memory Mode: volatile system memory with DDR as cache
    Volatile,
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryKind::Persistent => f.write_str("AppDirect"),
            MemoryKind::Volatile => f.write_str("MemoryMode"),
        }
    }
}

/// Requested persistent/volatile split of the DIMM population.
///
/// Any remainder below 100 percent is left reserved. A goal is applied once
/// per provisioning cycle and is invalidated whenever namespaces or the
/// platform configuration data are cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningGoal {
    pub persistent_percent: u8,
    pub volatile_percent: u8,
}

impl ProvisioningGoal {
    pub fn new(persistent_percent: u8, volatile_percent: u8) -> anyhow::Result<Self> {
        let goal = Self {
            persistent_percent,
            volatile_percent,
        };
        goal.validate()?;
        Ok(goal)
    }

    /// 100 percent AppDirect
    pub fn app_direct() -> Self {
        Self {
            persistent_percent: 100,
            volatile_percent: 0,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let total = self.persistent_percent as u16 + self.volatile_percent as u16;
        if total > 100 {
            return Err(anyhow::anyhow!(
                "goal split exceeds 100 percent: {} persistent + {} volatile",
                self.persistent_percent,
                self.volatile_percent
            ));
        }
        if total == 0 {
            return Err(anyhow::anyhow!("goal requests no capacity"));
        }
        Ok(())
    }

    pub fn percent(&self, kind: MemoryKind) -> u8 {
        match kind {
            MemoryKind::Persistent => self.persistent_percent,
            MemoryKind::Volatile => self.volatile_percent,
        }
    }

    pub fn reserved_percent(&self) -> u8 {
        100u8.saturating_sub(self.persistent_percent.saturating_add(self.volatile_percent))
    }

    /// Modes this goal asks for; each one is verified separately.
    pub fn requested_kinds(&self) -> Vec<MemoryKind> {
        [MemoryKind::Persistent, MemoryKind::Volatile]
            .into_iter()
            .filter(|kind| self.percent(*kind) > 0)
            .collect()
    }

    /// Share of `total` bytes the goal assigns to `kind`
    pub fn expected_bytes(&self, kind: MemoryKind, total: u64) -> u64 {
        (total as u128 * self.percent(kind) as u128 / 100) as u64
    }
}

impl fmt::Display for ProvisioningGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}% AppDirect / {}% MemoryMode",
            self.persistent_percent, self.volatile_percent
        )
    }
}

/// Per-DIMM row of a goal as reported back by the configuration tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalRow {
    pub socket: u32,
    pub dimm_id: String,

    /// Capacity assigned to Memory Mode, in bytes
    pub memory_size_bytes: u64,

    /// Capacity assigned to AppDirect, in bytes
    pub app_direct_size_bytes: u64,
}

impl GoalRow {
    pub fn bytes_for(&self, kind: MemoryKind) -> u64 {
        match kind {
            MemoryKind::Persistent => self.app_direct_size_bytes,
            MemoryKind::Volatile => self.memory_size_bytes,
        }
    }
}

/// Output of a goal application: the raw transcript plus the parsed rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalReport {
    pub raw: String,
    pub rows: Vec<GoalRow>,
}

impl GoalReport {
    pub fn total_for(&self, kind: MemoryKind) -> u64 {
        self.rows.iter().map(|row| row.bytes_for(kind)).sum()
    }
}
