// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractErrorKind {
    InvalidInput,
    NotFound,
    Unsupported,
    CommandFailed,
    UnexpectedOutput,
    Timeout,
    Unavailable,
    Internal,
}

/// Error returned across every seam to the system under test
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct ContractError {
    pub kind: ContractErrorKind,
    pub message: String,
}

impl ContractError {
    pub fn new(kind: ContractErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ContractErrorKind::Timeout, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ContractErrorKind::Unavailable, message)
    }

    pub fn command_failed(command: &str, detail: impl AsRef<str>) -> Self {
        Self::new(
            ContractErrorKind::CommandFailed,
            format!("{}: {}", command, detail.as_ref().trim()),
        )
    }

    pub fn unexpected_output(tool: &str, detail: impl AsRef<str>) -> Self {
        Self::new(
            ContractErrorKind::UnexpectedOutput,
            format!("{}: {}", tool, detail.as_ref()),
        )
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ContractErrorKind::Timeout
    }
}
