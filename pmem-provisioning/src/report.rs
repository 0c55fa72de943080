// SPDX-License-Identifier: GPL-3.0-only

//! Run artifacts: `target/pmem-provisioning/artifacts/<label>-<ts>/`

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use pmem_types::{DiskState, Platform, StepResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ProvisioningError, Result};
use crate::profile::workspace_root;

pub const SUMMARY_FILE: &str = "run-summary.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunIndex {
    pub run_label: String,
    pub run_id: String,
}

/// Everything a post-mortem needs: every step with its evidence, not just the verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub profile: String,
    pub platform: Platform,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub verdict: bool,
    /// Reboots performed during the run
    pub boots: u64,
    pub steps: Vec<StepResult>,
    /// Last lifecycle state of every provisioned disk
    pub disks: BTreeMap<String, DiskState>,
    /// The error that ended the run early, if any
    pub error: Option<String>,
}

impl RunReport {
    pub fn failed_steps(&self) -> impl Iterator<Item = &StepResult> {
        self.steps.iter().filter(|step| !step.verdict)
    }
}

fn io_error(path: &Path, error: impl ToString) -> ProvisioningError {
    ProvisioningError::LedgerIo {
        path: path.to_path_buf(),
        reason: error.to_string(),
    }
}

pub fn artifacts_root() -> PathBuf {
    workspace_root().join("target/pmem-provisioning/artifacts")
}

pub fn run_dir(run_label: &str) -> Result<PathBuf> {
    run_dir_in(&artifacts_root(), run_label)
}

/// Create a fresh run directory under `root` and write its index
pub fn run_dir_in(root: &Path, run_label: &str) -> Result<PathBuf> {
    let run_id = Utc::now().format("%Y%m%dT%H%M%S%3f").to_string();
    let dir = root.join(format!("{}-{}", run_label, run_id));
    fs::create_dir_all(&dir).map_err(|error| io_error(&dir, error))?;

    let index = RunIndex {
        run_label: run_label.to_string(),
        run_id,
    };
    let index_path = dir.join("index.json");
    let content = serde_json::to_string_pretty(&index).map_err(|error| io_error(&index_path, error))?;
    fs::write(&index_path, content).map_err(|error| io_error(&index_path, error))?;

    Ok(dir)
}

pub fn write_summary(dir: &Path, report: &RunReport) -> Result<PathBuf> {
    let summary_path = dir.join(SUMMARY_FILE);
    let content =
        serde_json::to_string_pretty(report).map_err(|error| io_error(&summary_path, error))?;
    fs::write(&summary_path, content).map_err(|error| io_error(&summary_path, error))?;
    Ok(summary_path)
}
