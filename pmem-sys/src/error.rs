// SPDX-License-Identifier: GPL-3.0-only

use std::time::Duration;

use pmem_contracts::{ContractError, ContractErrorKind};
use thiserror::Error;

/// Error types for system-level operations
#[derive(Error, Debug)]
pub enum SysError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("required tool not found: {0}")]
    ToolMissing(String),

    #[error("command timed out after {timeout:?}: {command}")]
    Timeout { command: String, timeout: Duration },

    #[error("command failed: {command}: {detail}")]
    CommandFailed { command: String, detail: String },

    #[error("system under test unreachable: {0}")]
    Unreachable(String),

    #[error("could not parse {tool} output: {reason}")]
    Parse { tool: String, reason: String },
}

impl SysError {
    pub fn parse(tool: &str, reason: impl Into<String>) -> Self {
        SysError::Parse {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<SysError> for ContractError {
    fn from(error: SysError) -> Self {
        let kind = match &error {
            SysError::Io(_) => ContractErrorKind::Internal,
            SysError::ToolMissing(_) => ContractErrorKind::NotFound,
            SysError::Timeout { .. } => ContractErrorKind::Timeout,
            SysError::CommandFailed { .. } => ContractErrorKind::CommandFailed,
            SysError::Unreachable(_) => ContractErrorKind::Unavailable,
            SysError::Parse { .. } => ContractErrorKind::UnexpectedOutput,
        };
        ContractError::new(kind, error.to_string())
    }
}

/// Result type alias for system operations
pub type Result<T> = std::result::Result<T, SysError>;
