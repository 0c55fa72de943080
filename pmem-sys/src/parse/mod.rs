// SPDX-License-Identifier: GPL-3.0-only

//! Parsers for the text and JSON the provisioning tools print

pub mod diskpart;
pub mod ipmctl;
pub mod mounts;
pub mod ndctl;
pub mod parted;
pub mod powershell;

use serde::de::DeserializeOwned;

use crate::{Result, SysError};

/// Decode JSON that is either a single object or an array of them.
///
/// ndctl and `ConvertTo-Json` both collapse one-element lists into a bare
/// object, and print nothing at all for an empty list.
pub(crate) fn one_or_many<T: DeserializeOwned>(tool: &str, raw: &str) -> Result<Vec<T>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|error| SysError::parse(tool, error.to_string()))?;
    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Null => Vec::new(),
        other => vec![other],
    };

    items
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(|error| SysError::parse(tool, error.to_string())))
        .collect()
}
