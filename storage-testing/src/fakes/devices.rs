use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use storage_contracts::{DeviceOpsAdapter, FormatError, StorageError, UnlockOutcome};
use storage_types::{DriveTestStatus, SyncJob, SyncJobState};

use super::lock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Mount { device: String, mount_point: String },
    Unmount { device: String, mount_point: String },
    VerifyPin { encrypted_pin: String },
    Format { device: String },
    Encrypt { device: String },
    Unlock { device: String },
    UnlockWithPassword { device: String, encrypted_password: String },
    ApplyPermissions,
    SyncStatus,
    StartSync,
    SetAutoSync { enabled: bool },
    DriveTestStatus,
}

impl DeviceCall {
    /// Calls that change something on the backend
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Self::VerifyPin { .. } | Self::SyncStatus | Self::DriveTestStatus
        )
    }
}

#[derive(Default)]
struct Script {
    mount: Option<StorageError>,
    unmount: Option<StorageError>,
    pin_valid: Option<bool>,
    verify_pin: Option<StorageError>,
    format: Option<FormatError>,
    encrypt: Option<Result<String, StorageError>>,
    unlock: VecDeque<Result<UnlockOutcome, StorageError>>,
    unlock_with_password: VecDeque<Result<UnlockOutcome, StorageError>>,
    sync_status: Option<SyncJob>,
    drive_tests: Vec<DriveTestStatus>,
}

/// Device lifecycle backend
#[derive(Default)]
pub struct FakeDevices {
    calls: Mutex<Vec<DeviceCall>>,
    script: Mutex<Script>,
}

impl FakeDevices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        lock(&self.calls).clone()
    }

    pub fn mutating_calls(&self) -> Vec<DeviceCall> {
        self.calls().into_iter().filter(DeviceCall::is_mutating).collect()
    }

    pub fn fail_mount(&self, err: StorageError) {
        lock(&self.script).mount = Some(err);
    }

    pub fn fail_unmount(&self, err: StorageError) {
        lock(&self.script).unmount = Some(err);
    }

    pub fn set_pin_valid(&self, valid: bool) {
        lock(&self.script).pin_valid = Some(valid);
    }

    pub fn fail_verify_pin(&self, err: StorageError) {
        lock(&self.script).verify_pin = Some(err);
    }

    pub fn fail_format(&self, err: FormatError) {
        lock(&self.script).format = Some(err);
    }

    pub fn answer_encrypt(&self, result: Result<String, StorageError>) {
        lock(&self.script).encrypt = Some(result);
    }

    /// Queue answers for `unlock`; defaults to a fresh mapper once drained
    pub fn push_unlock(&self, result: Result<UnlockOutcome, StorageError>) {
        lock(&self.script).unlock.push_back(result);
    }

    pub fn push_unlock_with_password(&self, result: Result<UnlockOutcome, StorageError>) {
        lock(&self.script).unlock_with_password.push_back(result);
    }

    pub fn set_sync_status(&self, job: Option<SyncJob>) {
        lock(&self.script).sync_status = job;
    }

    pub fn set_drive_tests(&self, tests: Vec<DriveTestStatus>) {
        lock(&self.script).drive_tests = tests;
    }

    fn record(&self, call: DeviceCall) {
        lock(&self.calls).push(call);
    }
}

fn default_mapper(device: &str) -> String {
    format!("luks-{}", storage_types::device_name(device))
}

#[async_trait]
impl DeviceOpsAdapter for FakeDevices {
    async fn mount(&self, device: &str, mount_point: &str) -> Result<(), StorageError> {
        self.record(DeviceCall::Mount {
            device: device.to_string(),
            mount_point: mount_point.to_string(),
        });
        lock(&self.script).mount.clone().map_or(Ok(()), Err)
    }

    async fn unmount(&self, device: &str, mount_point: &str) -> Result<(), StorageError> {
        self.record(DeviceCall::Unmount {
            device: device.to_string(),
            mount_point: mount_point.to_string(),
        });
        lock(&self.script).unmount.clone().map_or(Ok(()), Err)
    }

    async fn verify_pin(&self, encrypted_pin: &str) -> Result<bool, StorageError> {
        self.record(DeviceCall::VerifyPin {
            encrypted_pin: encrypted_pin.to_string(),
        });
        let script = lock(&self.script);
        if let Some(err) = script.verify_pin.clone() {
            return Err(err);
        }
        Ok(script.pin_valid.unwrap_or(true))
    }

    async fn format(&self, device: &str) -> Result<(), FormatError> {
        self.record(DeviceCall::Format {
            device: device.to_string(),
        });
        lock(&self.script).format.clone().map_or(Ok(()), Err)
    }

    async fn encrypt(&self, device: &str) -> Result<String, StorageError> {
        self.record(DeviceCall::Encrypt {
            device: device.to_string(),
        });
        lock(&self.script)
            .encrypt
            .clone()
            .unwrap_or_else(|| Ok(default_mapper(device)))
    }

    async fn unlock(&self, device: &str) -> Result<UnlockOutcome, StorageError> {
        self.record(DeviceCall::Unlock {
            device: device.to_string(),
        });
        lock(&self.script).unlock.pop_front().unwrap_or_else(|| {
            Ok(UnlockOutcome::Unlocked {
                mapper_name: Some(default_mapper(device)),
            })
        })
    }

    async fn unlock_with_password(
        &self,
        device: &str,
        encrypted_password: &str,
    ) -> Result<UnlockOutcome, StorageError> {
        self.record(DeviceCall::UnlockWithPassword {
            device: device.to_string(),
            encrypted_password: encrypted_password.to_string(),
        });
        lock(&self.script)
            .unlock_with_password
            .pop_front()
            .unwrap_or_else(|| {
                Ok(UnlockOutcome::Unlocked {
                    mapper_name: Some(default_mapper(device)),
                })
            })
    }

    async fn apply_permissions(&self) -> Result<(), StorageError> {
        self.record(DeviceCall::ApplyPermissions);
        Ok(())
    }

    async fn sync_status(&self) -> Result<Option<SyncJob>, StorageError> {
        self.record(DeviceCall::SyncStatus);
        Ok(lock(&self.script).sync_status.clone())
    }

    async fn start_sync(&self) -> Result<SyncJob, StorageError> {
        self.record(DeviceCall::StartSync);
        let job = SyncJob {
            id: "sync-1".to_string(),
            state: SyncJobState::Queued,
            percent: Some(0),
            message: None,
        };
        lock(&self.script).sync_status = Some(job.clone());
        Ok(job)
    }

    async fn set_auto_sync(&self, enabled: bool) -> Result<(), StorageError> {
        self.record(DeviceCall::SetAutoSync { enabled });
        Ok(())
    }

    async fn drive_test_status(&self) -> Result<Vec<DriveTestStatus>, StorageError> {
        self.record(DeviceCall::DriveTestStatus);
        Ok(lock(&self.script).drive_tests.clone())
    }
}
