// SPDX-License-Identifier: GPL-3.0-only

//! Typed outcomes normalized at the adapter boundary
//!
//! The backend signals some results in more than one shape. Adapters turn the
//! raw envelope into one of these types so call sites never inspect messages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{ResponseEnvelope, ResponseStatus, StorageError};

/// Structured flag the backend sets when no server-held key can open a container
pub const PASSWORD_REQUIRED_FLAG: &str = "requires_password";

/// Detail key naming the step a format call failed in
pub const FAILED_STAGE_DETAIL: &str = "stage";

/// Stage value for a failure to close an open LUKS container before formatting
pub const CLOSE_CONTAINER_STAGE: &str = "close_luks";

const PASSWORD_REQUIRED_PATTERNS: &[&str] = &[
    "password required",
    "requires password",
    "manual password",
    "no stored key",
    "key file not found",
];

const ALREADY_UNLOCKED_PATTERNS: &[&str] = &["already unlocked", "already open"];

fn matches_any(message: &str, patterns: &[&str]) -> bool {
    let message = message.to_ascii_lowercase();
    patterns.iter().any(|pattern| message.contains(pattern))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum UnlockOutcome {
    Unlocked { mapper_name: Option<String> },
    AlreadyUnlocked,
    /// The operator has to type the container password
    PasswordRequired,
}

impl UnlockOutcome {
    /// Collapse the structured flag and the message pattern into one outcome
    pub fn from_envelope(envelope: ResponseEnvelope) -> Result<Self, StorageError> {
        if envelope.detail_flag(PASSWORD_REQUIRED_FLAG) {
            return Ok(Self::PasswordRequired);
        }
        if matches_any(&envelope.message, ALREADY_UNLOCKED_PATTERNS) {
            return Ok(Self::AlreadyUnlocked);
        }
        match envelope.status {
            ResponseStatus::Success => Ok(Self::Unlocked {
                mapper_name: envelope.detail_str("mapper_name").map(str::to_string),
            }),
            ResponseStatus::Error if matches_any(&envelope.message, PASSWORD_REQUIRED_PATTERNS) => {
                Ok(Self::PasswordRequired)
            }
            ResponseStatus::Error => Err(StorageError::rejected(envelope.message)),
        }
    }

    /// Both a fresh unlock and an already-open container count as success
    pub fn is_unlocked(&self) -> bool {
        matches!(self, Self::Unlocked { .. } | Self::AlreadyUnlocked)
    }
}

/// Format failures, split by the step that failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("could not close the open encrypted container: {0}")]
    CloseContainer(StorageError),

    #[error("format failed: {0}")]
    Format(StorageError),
}

impl FormatError {
    pub fn from_envelope(envelope: ResponseEnvelope) -> Result<(), Self> {
        let close_failed = envelope.detail_str(FAILED_STAGE_DETAIL) == Some(CLOSE_CONTAINER_STAGE);
        match envelope.into_result() {
            Ok(_) => Ok(()),
            Err(err) if close_failed => Err(Self::CloseContainer(err)),
            Err(err) => Err(Self::Format(err)),
        }
    }

    pub fn storage_error(&self) -> &StorageError {
        match self {
            Self::CloseContainer(err) | Self::Format(err) => err,
        }
    }
}

impl From<StorageError> for FormatError {
    fn from(err: StorageError) -> Self {
        Self::Format(err)
    }
}

/// Per-device result inside a batched key operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceKeyResult {
    pub device: String,
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl DeviceKeyResult {
    /// Backend message, or a generic one when it sent none
    pub fn reason(&self) -> &str {
        match self.message.as_deref() {
            Some(message) if !message.is_empty() => message,
            _ if self.success => "succeeded",
            _ => "failed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyOperationReport {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub results: Vec<DeviceKeyResult>,
}

impl KeyOperationReport {
    pub fn failures(&self) -> impl Iterator<Item = &DeviceKeyResult> {
        self.results.iter().filter(|result| !result.success)
    }

    pub fn is_full_success(&self) -> bool {
        self.results.iter().all(|result| result.success)
    }

    /// Every device failed; an empty result list is not a total failure
    pub fn is_total_failure(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(|result| !result.success)
    }
}

/// A service that keeps files open under a shared mount point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependentService {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub running: bool,
}

impl DependentService {
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFailure {
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceActionReport {
    #[serde(default)]
    pub succeeded: Vec<String>,
    #[serde(default)]
    pub failed: Vec<ServiceFailure>,
}

impl ServiceActionReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}
