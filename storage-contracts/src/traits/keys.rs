// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;

use storage_types::{KeyOperationRequest, KeySlotInfo, KeyUpdateRequest, SlotKind};

use crate::{KeyOperationReport, StorageError};

#[async_trait]
pub trait KeyOpsAdapter: Send + Sync {
    /// `{device_path}` of the device backing the vault
    async fn vault_device_path(&self) -> Result<String, StorageError>;

    /// Errors with `StorageErrorKind::Unsupported` when the device is not an
    /// encrypted container
    async fn key_slot_info(
        &self,
        device_path: &str,
        kind: SlotKind,
    ) -> Result<KeySlotInfo, StorageError>;

    /// One batched request for every device; per-device results in the report
    async fn create_keys(
        &self,
        request: &KeyOperationRequest,
    ) -> Result<KeyOperationReport, StorageError>;

    async fn update_key(&self, request: &KeyUpdateRequest) -> Result<(), StorageError>;
}
