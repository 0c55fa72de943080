// SPDX-License-Identifier: GPL-3.0-only

//! Partition ledger: the drive letters or mount paths a partitioning pass
//! produced, kept on disk so a later process can find them after a reboot.
//!
//! The file holds one identifier per line. Every write replaces the whole
//! list; a missing file reads as an empty list.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use pmem_types::MountIdentifier;

use crate::errors::{ProvisioningError, Result};

pub const DEFAULT_LEDGER_FILE: &str = "pmem-partition-ledger.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ledger in the current working directory
    pub fn in_working_dir() -> Self {
        Self::new(DEFAULT_LEDGER_FILE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, error: impl ToString) -> ProvisioningError {
        ProvisioningError::LedgerIo {
            path: self.path.clone(),
            reason: error.to_string(),
        }
    }

    pub fn read(&self) -> Result<Vec<String>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(self.io_error(error)),
        };

        Ok(raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub fn identifiers(&self) -> Result<Vec<MountIdentifier>> {
        Ok(self
            .read()?
            .iter()
            .map(|entry| MountIdentifier::from_ledger_entry(entry))
            .collect())
    }

    /// Replace the ledger with `entries`
    pub fn write<S: AsRef<str>>(&self, entries: &[S]) -> Result<()> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir).map_err(|error| self.io_error(error))?;
        }

        let mut content = String::new();
        for entry in entries {
            content.push_str(entry.as_ref());
            content.push('\n');
        }

        let staging = self.path.with_extension("tmp");
        fs::write(&staging, content).map_err(|error| self.io_error(error))?;
        fs::rename(&staging, &self.path).map_err(|error| self.io_error(error))
    }

    /// Add one entry and persist the whole list
    pub fn append(&self, entry: &str) -> Result<Vec<String>> {
        let mut entries = self.read()?;
        entries.push(entry.to_string());
        self.write(&entries)?;
        Ok(entries)
    }

    /// Remove the ledger file; succeeds when it is already gone
    pub fn delete(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(self.io_error(error)),
        }
    }
}
