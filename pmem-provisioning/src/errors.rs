// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;
use std::time::Duration;

use pmem_contracts::{ContractError, ContractErrorKind};
use pmem_sys::SysError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// The platform does not match what the profile expects; rerunning cannot help
    #[error("configuration mismatch: {reason}")]
    FatalConfiguration { reason: String },
    #[error("step {step} failed verification: {reason}")]
    StepVerification { step: String, reason: String },
    #[error("precondition not met for '{step}': {reason}")]
    PreconditionUnsatisfied { step: String, reason: String },
    #[error("timed out after {timeout:?}: {operation}")]
    Timeout { operation: String, timeout: Duration },
    #[error("system under test unavailable: {reason}")]
    SutUnavailable { reason: String },
    #[error("command failed: {command}; detail: {detail}")]
    CommandFailed { command: String, detail: String },
    #[error("ledger io error for {path:?}: {reason}")]
    LedgerIo { path: PathBuf, reason: String },
    #[error("profile not found for '{profile}' in resources/profiles")]
    ProfileNotFound { profile: String },
    #[error("invalid profile '{profile}': {reason}")]
    ProfileInvalid { profile: String, reason: String },
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error(transparent)]
    Sys(#[from] SysError),
}

impl ProvisioningError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ProvisioningError::FatalConfiguration { .. }
            | ProvisioningError::ProfileNotFound { .. }
            | ProvisioningError::ProfileInvalid { .. }
            | ProvisioningError::PreconditionUnsatisfied { .. } => false,
            ProvisioningError::Contract(error) => !matches!(
                error.kind,
                ContractErrorKind::InvalidInput | ContractErrorKind::Unsupported
            ),
            _ => true,
        }
    }

    pub fn is_fatal_configuration(&self) -> bool {
        matches!(self, ProvisioningError::FatalConfiguration { .. })
    }
}

impl From<ProvisioningError> for ContractError {
    fn from(error: ProvisioningError) -> Self {
        match error {
            ProvisioningError::Contract(error) => error,
            other => ContractError::new(ContractErrorKind::Internal, other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProvisioningError>;
