// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::{FormatError, OperationKind, StorageError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    /// Preconditions not met; nothing was sent to the backend
    #[error("{0}")]
    Validation(String),

    /// A previous success has not been reflected by a newer snapshot yet
    #[error("waiting for the device list to catch up with the last change")]
    Stale,

    #[error("{operation} is already in progress")]
    Busy { operation: &'static str },

    /// Backend answered with an error; message is shown verbatim
    #[error("{}", .0.message)]
    Backend(StorageError),

    #[error("storage backend unreachable: {}", .0.message)]
    Transport(StorageError),

    #[error("PIN verification failed")]
    PinRejected,

    /// Secure transmission could not encrypt a payload
    #[error("could not secure the {0} for transmission")]
    SecurePayload(&'static str),

    #[error("current password required for {device}")]
    MissingPassword { device: String },

    /// Format aborted before touching the disk
    #[error("could not close the encrypted container: {}", .0.message)]
    CloseContainer(StorageError),
}

impl OrchestratorError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn busy(kind: OperationKind) -> Self {
        Self::Busy {
            operation: kind.label(),
        }
    }

    /// Nothing reached the backend
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::Stale
                | Self::Busy { .. }
                | Self::SecurePayload(_)
                | Self::MissingPassword { .. }
        )
    }
}

impl From<StorageError> for OrchestratorError {
    fn from(err: StorageError) -> Self {
        if err.is_transport() {
            Self::Transport(err)
        } else {
            Self::Backend(err)
        }
    }
}

impl From<FormatError> for OrchestratorError {
    fn from(err: FormatError) -> Self {
        match err {
            FormatError::CloseContainer(e) => Self::CloseContainer(e),
            FormatError::Format(e) => e.into(),
        }
    }
}

pub type Result<T, E = OrchestratorError> = std::result::Result<T, E>;

/// How an operation ended when it did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion<T = ()> {
    Done(T),
    /// Operator declined or dismissed a confirmation; nothing was sent
    Declined,
}

impl<T> Completion<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    pub fn is_declined(&self) -> bool {
        matches!(self, Self::Declined)
    }

    pub fn into_done(self) -> Option<T> {
        match self {
            Self::Done(value) => Some(value),
            Self::Declined => None,
        }
    }
}
