// SPDX-License-Identifier: GPL-3.0-only

//! `{status, message, details?}` envelope returned by every backend call

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub status: ResponseStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ResponseEnvelope {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Success,
            message: message.into(),
            details: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    /// `status: error` becomes a `Rejected` error carrying the message verbatim
    pub fn into_result(self) -> Result<Self, StorageError> {
        match self.status {
            ResponseStatus::Success => Ok(self),
            ResponseStatus::Error => Err(StorageError::rejected(self.message)),
        }
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.as_ref().and_then(|details| details.get(key))
    }

    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.detail(key).and_then(Value::as_str)
    }

    /// Missing or non-boolean details read as false
    pub fn detail_flag(&self, key: &str) -> bool {
        self.detail(key).and_then(Value::as_bool).unwrap_or(false)
    }
}
