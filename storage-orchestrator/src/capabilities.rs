// SPDX-License-Identifier: GPL-3.0-only

//! Which operations are currently legal

use serde::Serialize;
use storage_contracts::OperationKind;
use storage_types::{DeviceSnapshot, SyncJob};

use crate::config::OrchestratorConfig;
use crate::latch::PendingConfirmation;
use crate::selection::SelectionState;
use crate::snapshot;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub can_mount: bool,
    pub can_unmount: bool,
    pub can_format: bool,
    pub can_encrypt: bool,
    pub can_unlock: bool,
    pub can_apply_permissions: bool,
    pub can_sync: bool,
    pub can_auto_sync: bool,
    /// Everything mutating is disabled until the next snapshot
    pub pending_confirmation: bool,
    /// Selected device is mounted outside every known destination
    pub destination_locked: bool,
}

impl Capabilities {
    pub fn evaluate(
        snapshot: &DeviceSnapshot,
        selection: &SelectionState,
        config: &OrchestratorConfig,
        latch: PendingConfirmation,
        sync_job: Option<&SyncJob>,
        busy: &[OperationKind],
    ) -> Self {
        let pending = latch.is_pending();
        let is_busy = |kind: OperationKind| busy.contains(&kind);
        let lifecycle_idle = !pending && !busy.iter().any(|kind| kind.changes_lifecycle());

        let mut caps = Self {
            pending_confirmation: pending,
            can_apply_permissions: !pending && !is_busy(OperationKind::Permissions),
            ..Self::default()
        };

        let sync_ready = sync_ready(snapshot, config);
        let job_active = sync_job.is_some_and(SyncJob::is_active);
        caps.can_sync = !pending && sync_ready && !job_active && !is_busy(OperationKind::Sync);
        caps.can_auto_sync = !pending && sync_ready && !is_busy(OperationKind::AutoSync);

        let Some(device) = selection.device.as_deref() else {
            return caps;
        };
        let state = snapshot::derive(snapshot, device);

        caps.destination_locked = state
            .mount_point
            .as_deref()
            .is_some_and(|mp| config.destination_for_mount_point(mp).is_none());

        if !lifecycle_idle {
            return caps;
        }

        let destination_free = selection
            .destination
            .as_deref()
            .and_then(|id| config.destination(id))
            .is_some_and(|dest| match snapshot::device_at(snapshot, &dest.mount_point) {
                Some(occupant) => occupant == device,
                None => true,
            });

        caps.can_mount = !state.mounted
            && !state.locked
            && (state.unlocked || state.nas_compatible)
            && destination_free;
        caps.can_unmount = state.mounted;
        caps.can_format = !state.mounted && snapshot::is_known(snapshot, device);
        caps.can_encrypt = caps.can_format && !state.encrypted;
        caps.can_unlock = state.locked;
        caps
    }
}

/// Primary and secondary destinations mounted, secondary at least as large
pub fn sync_ready(snapshot: &DeviceSnapshot, config: &OrchestratorConfig) -> bool {
    let (Some(primary), Some(secondary)) = (config.primary(), config.secondary()) else {
        return false;
    };
    let (Some(primary_dev), Some(secondary_dev)) = (
        snapshot::device_at(snapshot, &primary.mount_point),
        snapshot::device_at(snapshot, &secondary.mount_point),
    ) else {
        return false;
    };
    snapshot::capacity_of(snapshot, &secondary_dev) >= snapshot::capacity_of(snapshot, &primary_dev)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage_types::{BlockDevice, EncryptionEntry, NasDevice, SyncJobState};

    fn disk(name: &str, size: u64, mountpoint: Option<&str>) -> BlockDevice {
        BlockDevice {
            name: name.to_string(),
            size,
            mountpoint: mountpoint.map(str::to_string),
            ..Default::default()
        }
    }

    fn nas(name: &str) -> NasDevice {
        NasDevice {
            device: format!("/dev/{name}"),
            ..Default::default()
        }
    }

    fn selected(device: &str, destination: Option<&str>) -> SelectionState {
        SelectionState {
            device: Some(device.to_string()),
            destination: destination.map(str::to_string),
        }
    }

    fn evaluate(snapshot: &DeviceSnapshot, selection: &SelectionState) -> Capabilities {
        Capabilities::evaluate(
            snapshot,
            selection,
            &OrchestratorConfig::default(),
            PendingConfirmation::Idle,
            None,
            &[],
        )
    }

    #[test]
    fn nas_compatible_device_with_free_destination_can_mount() {
        let snapshot = DeviceSnapshot {
            blockdevices: vec![disk("sdb", 100, None)],
            nas_compatible: vec![nas("sdb")],
            ..Default::default()
        };
        let caps = evaluate(&snapshot, &selected("sdb", Some("nas")));
        assert!(caps.can_mount);
        assert!(caps.can_format);
        assert!(caps.can_encrypt);
        assert!(!caps.can_unmount);
        assert!(!caps.can_unlock);
    }

    #[test]
    fn mount_needs_a_destination() {
        let snapshot = DeviceSnapshot {
            blockdevices: vec![disk("sdb", 100, None)],
            nas_compatible: vec![nas("sdb")],
            ..Default::default()
        };
        assert!(!evaluate(&snapshot, &selected("sdb", None)).can_mount);
    }

    #[test]
    fn locked_device_can_only_unlock() {
        let snapshot = DeviceSnapshot {
            blockdevices: vec![disk("sdb", 100, None)],
            encryption: vec![EncryptionEntry {
                device: "/dev/sdb".to_string(),
                is_open: false,
                mapper_name: None,
            }],
            nas_compatible: vec![nas("sdb")],
            ..Default::default()
        };
        let caps = evaluate(&snapshot, &selected("sdb", Some("nas")));
        assert!(caps.can_unlock);
        assert!(!caps.can_mount);
        assert!(!caps.can_encrypt);
    }

    #[test]
    fn pending_latch_disables_everything_mutating() {
        let snapshot = DeviceSnapshot {
            blockdevices: vec![disk("sdb", 100, None)],
            nas_compatible: vec![nas("sdb")],
            ..Default::default()
        };
        let caps = Capabilities::evaluate(
            &snapshot,
            &selected("sdb", Some("nas")),
            &OrchestratorConfig::default(),
            PendingConfirmation::AwaitingPulse {
                since: storage_types::PulseTimestamp(4),
            },
            None,
            &[],
        );
        assert!(caps.pending_confirmation);
        assert!(!caps.can_mount && !caps.can_format && !caps.can_apply_permissions);
    }

    #[test]
    fn running_lifecycle_operation_blocks_others() {
        let snapshot = DeviceSnapshot {
            blockdevices: vec![disk("sdb", 100, None)],
            nas_compatible: vec![nas("sdb")],
            ..Default::default()
        };
        let caps = Capabilities::evaluate(
            &snapshot,
            &selected("sdb", Some("nas")),
            &OrchestratorConfig::default(),
            PendingConfirmation::Idle,
            None,
            &[OperationKind::Format],
        );
        assert!(!caps.can_mount);
        assert!(caps.can_apply_permissions);
    }

    #[test]
    fn non_standard_mount_locks_destination() {
        let snapshot = DeviceSnapshot {
            blockdevices: vec![disk("sdc", 100, Some("/media/usb"))],
            ..Default::default()
        };
        let caps = evaluate(&snapshot, &selected("sdc", None));
        assert!(caps.destination_locked);
        assert!(caps.can_unmount);
        assert!(!caps.can_format);
    }

    #[test]
    fn sync_requires_both_mounts_and_capacity() {
        let mut snapshot = DeviceSnapshot {
            blockdevices: vec![
                disk("sda", 500, Some("/mnt/nas")),
                disk("sdb", 1_000, Some("/mnt/nas_backup")),
            ],
            ..Default::default()
        };
        let caps = evaluate(&snapshot, &SelectionState::default());
        assert!(caps.can_sync && caps.can_auto_sync);

        snapshot.blockdevices[1].size = 100;
        assert!(!evaluate(&snapshot, &SelectionState::default()).can_sync);

        snapshot.blockdevices.pop();
        assert!(!evaluate(&snapshot, &SelectionState::default()).can_auto_sync);
    }

    #[test]
    fn active_sync_job_blocks_new_sync() {
        let snapshot = DeviceSnapshot {
            blockdevices: vec![
                disk("sda", 500, Some("/mnt/nas")),
                disk("sdb", 500, Some("/mnt/nas_backup")),
            ],
            ..Default::default()
        };
        let job = SyncJob {
            id: "job-7".to_string(),
            state: SyncJobState::Queued,
            percent: None,
            message: None,
        };
        let caps = Capabilities::evaluate(
            &snapshot,
            &SelectionState::default(),
            &OrchestratorConfig::default(),
            PendingConfirmation::Idle,
            Some(&job),
            &[],
        );
        assert!(!caps.can_sync);
        assert!(caps.can_auto_sync);
    }
}
