use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use storage_contracts::{DeviceKeyResult, KeyOperationReport, KeyOpsAdapter, StorageError};
use storage_types::{KeyOperationRequest, KeySlotInfo, KeyUpdateRequest, SlotKind};

use super::lock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyCall {
    VaultDevicePath,
    KeySlotInfo { device_path: String, kind: SlotKind },
    CreateKeys(KeyOperationRequest),
    UpdateKey(KeyUpdateRequest),
}

/// Key-management backend
pub struct FakeKeys {
    vault_path: Mutex<Result<String, StorageError>>,
    slot_info: Mutex<HashMap<String, Result<KeySlotInfo, StorageError>>>,
    create_report: Mutex<Option<Result<KeyOperationReport, StorageError>>>,
    update_result: Mutex<Option<StorageError>>,
    calls: Mutex<Vec<KeyCall>>,
}

impl Default for FakeKeys {
    fn default() -> Self {
        Self {
            vault_path: Mutex::new(Ok("/dev/vault0".to_string())),
            slot_info: Mutex::default(),
            create_report: Mutex::default(),
            update_result: Mutex::default(),
            calls: Mutex::default(),
        }
    }
}

impl FakeKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<KeyCall> {
        lock(&self.calls).clone()
    }

    pub fn slot_info_calls(&self, device_path: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| {
                matches!(call, KeyCall::KeySlotInfo { device_path: path, .. } if path == device_path)
            })
            .count()
    }

    pub fn vault_lookups(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, KeyCall::VaultDevicePath))
            .count()
    }

    pub fn create_requests(&self) -> Vec<KeyOperationRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                KeyCall::CreateKeys(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn update_requests(&self) -> Vec<KeyUpdateRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                KeyCall::UpdateKey(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn set_vault_path(&self, result: Result<String, StorageError>) {
        *lock(&self.vault_path) = result;
    }

    pub fn set_slot_info(&self, device_path: &str, result: Result<KeySlotInfo, StorageError>) {
        lock(&self.slot_info).insert(device_path.to_string(), result);
    }

    /// Report for `create_keys`; defaults to success on every requested device
    pub fn set_create_report(&self, result: Result<KeyOperationReport, StorageError>) {
        *lock(&self.create_report) = Some(result);
    }

    pub fn fail_update(&self, err: StorageError) {
        *lock(&self.update_result) = Some(err);
    }

    fn record(&self, call: KeyCall) {
        lock(&self.calls).push(call);
    }
}

/// Shorthand for a slot record
pub fn slots(total: u8, used: u8) -> KeySlotInfo {
    KeySlotInfo {
        total,
        used,
        available: total.saturating_sub(used),
    }
}

#[async_trait]
impl KeyOpsAdapter for FakeKeys {
    async fn vault_device_path(&self) -> Result<String, StorageError> {
        self.record(KeyCall::VaultDevicePath);
        lock(&self.vault_path).clone()
    }

    async fn key_slot_info(
        &self,
        device_path: &str,
        kind: SlotKind,
    ) -> Result<KeySlotInfo, StorageError> {
        self.record(KeyCall::KeySlotInfo {
            device_path: device_path.to_string(),
            kind,
        });
        lock(&self.slot_info)
            .get(device_path)
            .cloned()
            .unwrap_or_else(|| Ok(slots(32, 1)))
    }

    async fn create_keys(
        &self,
        request: &KeyOperationRequest,
    ) -> Result<KeyOperationReport, StorageError> {
        self.record(KeyCall::CreateKeys(request.clone()));
        lock(&self.create_report).clone().unwrap_or_else(|| {
            Ok(KeyOperationReport {
                message: String::new(),
                results: request
                    .devices
                    .iter()
                    .map(|device| DeviceKeyResult {
                        device: device.clone(),
                        success: true,
                        message: None,
                    })
                    .collect(),
            })
        })
    }

    async fn update_key(&self, request: &KeyUpdateRequest) -> Result<(), StorageError> {
        self.record(KeyCall::UpdateKey(request.clone()));
        lock(&self.update_result).clone().map_or(Ok(()), Err)
    }
}
