// SPDX-License-Identifier: GPL-3.0-only

//! Background job status delivered on the `sync_status` and
//! `hard_drive_test_status` feed keys

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncJobState {
    Queued,
    Running,
    Completed,
    Failed,
}

impl SyncJobState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: String,
    pub state: SyncJobState,
    #[serde(default)]
    pub percent: Option<u8>,
    #[serde(default)]
    pub message: Option<String>,
}

impl SyncJob {
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }
}

/// Hard drive self-test progress for one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveTestStatus {
    pub device: String,
    pub running: bool,
    #[serde(default)]
    pub percent: Option<u8>,
    #[serde(default)]
    pub result: Option<String>,
}
