// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;

use storage_types::{DriveTestStatus, SyncJob};

use crate::{FormatError, StorageError, UnlockOutcome};

/// Device lifecycle calls on the backend's pull surface
///
/// Implementations normalize the raw envelope before returning, so a
/// `status: error` reply arrives as `StorageErrorKind::Rejected` and transport
/// failures as `Unavailable`/`Timeout`.
#[async_trait]
pub trait DeviceOpsAdapter: Send + Sync {
    async fn mount(&self, device: &str, mount_point: &str) -> Result<(), StorageError>;

    async fn unmount(&self, device: &str, mount_point: &str) -> Result<(), StorageError>;

    /// Returns `false` when the PIN does not match
    async fn verify_pin(&self, encrypted_pin: &str) -> Result<bool, StorageError>;

    /// Formats the device, closing any open container on it first
    async fn format(&self, device: &str) -> Result<(), FormatError>;

    /// Creates a LUKS container and returns the mapper name
    async fn encrypt(&self, device: &str) -> Result<String, StorageError>;

    /// Unlock with the server-held key
    async fn unlock(&self, device: &str) -> Result<UnlockOutcome, StorageError>;

    async fn unlock_with_password(
        &self,
        device: &str,
        encrypted_password: &str,
    ) -> Result<UnlockOutcome, StorageError>;

    async fn apply_permissions(&self) -> Result<(), StorageError>;

    /// Active or last sync job, if the backend knows of one
    async fn sync_status(&self) -> Result<Option<SyncJob>, StorageError>;

    async fn start_sync(&self) -> Result<SyncJob, StorageError>;

    async fn set_auto_sync(&self, enabled: bool) -> Result<(), StorageError>;

    async fn drive_test_status(&self) -> Result<Vec<DriveTestStatus>, StorageError>;
}
