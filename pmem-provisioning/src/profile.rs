// SPDX-License-Identifier: GPL-3.0-only

//! Provisioning profiles: TOML documents under `resources/profiles`

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pmem_types::{
    AccessMode, FilesystemKind, GIB, NamespaceMode, PartitionSize, PartitionTableType, Platform,
    ProvisioningGoal, Topology,
};
use serde::{Deserialize, Serialize};

use crate::errors::{ProvisioningError, Result};
use crate::ledger::Ledger;
use crate::recorder::FailurePolicy;

const PROFILES_DIR: &str = "resources/profiles";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub platform: Platform,
    pub topology: Topology,
    pub capacity: CapacitySettings,
    pub goal: ProvisioningGoal,
    pub namespace: NamespaceSettings,
    pub partition: PartitionSettings,
    #[serde(default)]
    pub timeouts: TimeoutSettings,
    pub bios: BiosSettings,
    #[serde(default)]
    pub sut: Option<SutSettings>,
    #[serde(default)]
    pub run: RunSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacitySettings {
    /// Expected raw persistent memory capacity across all DIMMs, in GiB
    pub dcpmm_capacity_gib: f64,
    /// Allowed shortfall as a fraction (0.05 = 5%)
    pub variance_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceSettings {
    pub mode: NamespaceMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionSettings {
    pub filesystem: FilesystemKind,
    #[serde(default = "default_convert_type")]
    pub convert_type: PartitionTableType,
    pub access: AccessMode,
    /// Stages applied in order; "full" consumes the whole disk
    pub sizes: Vec<PartitionSize>,
}

fn default_convert_type() -> PartitionTableType {
    PartitionTableType::Gpt
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSettings {
    pub command_secs: u64,
    pub reboot_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            command_secs: 600,
            reboot_secs: 1800,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiosSettings {
    pub knob_file: PathBuf,
    #[serde(default)]
    pub apply_command: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SutSettings {
    pub host: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub identity_file: Option<PathBuf>,
}

fn default_user() -> String {
    "root".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSettings {
    #[serde(default)]
    pub policy: FailurePolicy,
    #[serde(default)]
    pub teardown: bool,
    #[serde(default)]
    pub ledger_path: Option<PathBuf>,
}

impl Profile {
    pub fn configured_capacity(&self) -> u64 {
        pmem_types::gib_to_bytes(self.capacity.dcpmm_capacity_gib)
    }

    pub fn variance(&self) -> f64 {
        self.capacity.variance_percent
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.command_secs)
    }

    pub fn reboot_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.reboot_secs)
    }

    pub fn ledger(&self) -> Ledger {
        match &self.run.ledger_path {
            Some(path) => Ledger::new(path),
            None => Ledger::in_working_dir(),
        }
    }

    /// Apply overrides from a variable lookup (the environment, in practice)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(host) = lookup("PMEM_PROVISION_SUT_HOST") {
            match &mut self.sut {
                Some(sut) => sut.host = host,
                None => {
                    self.sut = Some(SutSettings {
                        host,
                        user: default_user(),
                        port: None,
                        identity_file: None,
                    })
                }
            }
        }
        if let Some(value) = lookup("PMEM_PROVISION_REBOOT_TIMEOUT_SECS") {
            self.timeouts.reboot_secs = self.parse_override("PMEM_PROVISION_REBOOT_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = lookup("PMEM_PROVISION_COMMAND_TIMEOUT_SECS") {
            self.timeouts.command_secs =
                self.parse_override("PMEM_PROVISION_COMMAND_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = lookup("PMEM_PROVISION_POLICY") {
            self.run.policy = value.parse().map_err(|reason: String| self.invalid(reason))?;
        }
        validate(self)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn parse_override(&self, name: &str, value: &str) -> Result<u64> {
        value
            .trim()
            .parse()
            .map_err(|_| self.invalid(format!("{} must be a number of seconds", name)))
    }

    fn invalid(&self, reason: impl Into<String>) -> ProvisioningError {
        ProvisioningError::ProfileInvalid {
            profile: self.name.clone(),
            reason: reason.into(),
        }
    }
}

pub fn workspace_root() -> PathBuf {
    if let Ok(value) = std::env::var("PMEM_PROVISION_WORKSPACE_ROOT") {
        return PathBuf::from(value);
    }

    if let Ok(current_dir) = std::env::current_dir()
        && current_dir.join(PROFILES_DIR).exists()
    {
        return current_dir;
    }

    let manifest_root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    if manifest_root.join(PROFILES_DIR).exists() {
        return manifest_root;
    }

    PathBuf::from(".")
}

pub fn profiles_root() -> PathBuf {
    workspace_root().join(PROFILES_DIR)
}

pub fn profile_path_for_name(name: &str) -> PathBuf {
    profiles_root().join(format!("{}.toml", name))
}

/// Names of every profile shipped under `resources/profiles`, sorted
pub fn list_profiles() -> Result<Vec<String>> {
    let root = profiles_root();
    let entries = fs::read_dir(&root).map_err(|error| ProvisioningError::ProfileInvalid {
        profile: root.display().to_string(),
        reason: error.to_string(),
    })?;

    let mut names: Vec<String> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
        .filter_map(|path| path.file_stem().map(|stem| stem.to_string_lossy().to_string()))
        .collect();
    names.sort();
    Ok(names)
}

pub fn load_by_name(name: &str) -> Result<Profile> {
    let path = profile_path_for_name(name);
    if !path.exists() {
        return Err(ProvisioningError::ProfileNotFound {
            profile: name.to_string(),
        });
    }
    load_from_path(&path)
}

pub fn load_from_path(path: &Path) -> Result<Profile> {
    let label = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let raw = fs::read_to_string(path).map_err(|error| ProvisioningError::ProfileInvalid {
        profile: label.clone(),
        reason: error.to_string(),
    })?;
    parse(&label, &raw)
}

pub fn parse(label: &str, raw: &str) -> Result<Profile> {
    let profile: Profile = toml::from_str(raw).map_err(|error| ProvisioningError::ProfileInvalid {
        profile: label.to_string(),
        reason: error.to_string(),
    })?;

    validate(&profile)?;
    Ok(profile)
}

pub fn validate(profile: &Profile) -> Result<()> {
    let invalid = |reason: &str| ProvisioningError::ProfileInvalid {
        profile: if profile.name.is_empty() {
            "<unknown>".to_string()
        } else {
            profile.name.clone()
        },
        reason: reason.to_string(),
    };

    if profile.name.trim().is_empty() {
        return Err(invalid("name must not be empty"));
    }

    profile
        .goal
        .validate()
        .map_err(|error| invalid(&error.to_string()))?;

    let variance = profile.capacity.variance_percent;
    if !(0.0..1.0).contains(&variance) {
        return Err(invalid("variance_percent must be a fraction in [0, 1)"));
    }

    if profile.configured_capacity() < GIB {
        return Err(invalid("dcpmm_capacity_gib must be at least 1"));
    }

    if profile.timeouts.command_secs == 0 || profile.timeouts.reboot_secs == 0 {
        return Err(invalid("timeouts must be greater than zero"));
    }

    if profile.partition.sizes.is_empty() {
        return Err(invalid("partition sizes must not be empty"));
    }

    if profile.platform == Platform::Windows && profile.partition.filesystem != FilesystemKind::Ntfs
    {
        return Err(invalid("windows partitions are formatted ntfs"));
    }

    if profile.platform == Platform::Linux && profile.partition.filesystem == FilesystemKind::Ntfs {
        return Err(invalid("linux partitions must use ext4 or xfs"));
    }

    if let Some(sut) = &profile.sut
        && sut.host.trim().is_empty()
    {
        return Err(invalid("sut host must not be empty"));
    }

    Ok(())
}
