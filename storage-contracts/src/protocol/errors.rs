// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageErrorKind {
    InvalidInput,
    NotFound,
    PermissionDenied,
    Conflict,
    /// Operation does not apply to the device (e.g. not an encrypted container)
    Unsupported,
    Busy,
    Timeout,
    Unavailable,
    /// Backend answered with `status: error`
    Rejected,
    Internal,
}

impl StorageErrorKind {
    pub fn code(self) -> u16 {
        match self {
            Self::InvalidInput => 400,
            Self::NotFound => 404,
            Self::PermissionDenied => 403,
            Self::Conflict => 409,
            Self::Unsupported => 501,
            Self::Busy => 423,
            Self::Timeout => 504,
            Self::Unavailable => 503,
            Self::Rejected => 422,
            Self::Internal => 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct StorageError {
    pub kind: StorageErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn new(kind: StorageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Backend-reported failure, message kept verbatim
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Rejected, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Unavailable, message)
    }

    pub fn not_encrypted(device: &str) -> Self {
        Self::new(
            StorageErrorKind::Unsupported,
            format!("{device} is not an encrypted container"),
        )
    }

    /// The request never got an answer from the backend
    pub fn is_transport(&self) -> bool {
        matches!(
            self.kind,
            StorageErrorKind::Unavailable | StorageErrorKind::Timeout
        )
    }

    pub fn is_not_encrypted(&self) -> bool {
        self.kind == StorageErrorKind::Unsupported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_roundtrips() {
        let error = StorageError::new(StorageErrorKind::Conflict, "already exists");
        let json = serde_json::to_string(&error).expect("serialize error");
        let parsed: StorageError = serde_json::from_str(&json).expect("deserialize error");
        assert_eq!(parsed, error);
    }

    #[test]
    fn transport_kinds_are_distinguished_from_rejections() {
        assert!(StorageError::unavailable("connection refused").is_transport());
        assert!(StorageError::new(StorageErrorKind::Timeout, "slow").is_transport());
        assert!(!StorageError::rejected("device busy").is_transport());
    }

    #[test]
    fn not_encrypted_maps_to_unsupported() {
        let error = StorageError::not_encrypted("/dev/sdc");
        assert!(error.is_not_encrypted());
        assert_eq!(error.kind.code(), 501);
    }
}
