//! Snapshot fixtures
//!
//! Builders produce the shapes the backend actually broadcasts: a disk with
//! one partition, optionally a LUKS container with a mapper child, plus the
//! matching encryption, NAS and disk-usage rows.

use std::path::Path;

use storage_orchestrator::FeedEvent;
use storage_types::{
    BlockDevice, DeviceSnapshot, DiskUsageEntry, EncryptionEntry, NasDevice, Pulse,
};

use crate::errors::{Result, TestingError};

pub const GIB: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, Default)]
pub struct SnapshotBuilder {
    snapshot: DeviceSnapshot,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unencrypted disk with one partition, listed as NAS-compatible
    pub fn nas_disk(mut self, name: &str, size: u64, mount_point: Option<&str>) -> Self {
        let partition = format!("{name}1");
        self.snapshot.blockdevices.push(BlockDevice {
            name: name.to_string(),
            size,
            kind: Some("disk".to_string()),
            children: vec![BlockDevice {
                name: partition.clone(),
                size,
                kind: Some("part".to_string()),
                fstype: Some("ext4".to_string()),
                mountpoints: vec![mount_point.map(str::to_string)],
                ..Default::default()
            }],
            ..Default::default()
        });
        self.snapshot.nas_compatible.push(NasDevice {
            device: format!("/dev/{name}"),
            mountpoint: mount_point.map(str::to_string),
            is_mounted: mount_point.is_some(),
            is_ready: true,
            size,
            used: size / 4,
            available: size - size / 4,
        });
        if let Some(mount_point) = mount_point {
            self.push_usage(&format!("/dev/{partition}"), mount_point, size);
        }
        self
    }

    /// Disk whose only partition is a closed LUKS container
    pub fn locked_disk(mut self, name: &str, size: u64) -> Self {
        let partition = format!("{name}1");
        self.snapshot.blockdevices.push(luks_disk(name, &partition, size, None));
        self.snapshot.encryption.push(EncryptionEntry {
            device: format!("/dev/{partition}"),
            is_open: false,
            mapper_name: None,
        });
        self
    }

    /// Disk with an open LUKS container, optionally mounted through its mapper
    pub fn unlocked_disk(mut self, name: &str, size: u64, mount_point: Option<&str>) -> Self {
        let partition = format!("{name}1");
        let mapper = format!("luks-{partition}");
        self.snapshot.blockdevices.push(luks_disk(
            name,
            &partition,
            size,
            Some(BlockDevice {
                name: mapper.clone(),
                size,
                kind: Some("crypt".to_string()),
                fstype: Some("ext4".to_string()),
                mountpoint: mount_point.map(str::to_string),
                ..Default::default()
            }),
        ));
        self.snapshot.encryption.push(EncryptionEntry {
            device: format!("/dev/{partition}"),
            is_open: true,
            mapper_name: Some(mapper.clone()),
        });
        if let Some(mount_point) = mount_point {
            self.push_usage(&format!("/dev/mapper/{mapper}"), mount_point, size);
        }
        self
    }

    /// Plain disk outside the NAS list, e.g. a USB stick
    pub fn plain_disk(mut self, name: &str, size: u64, mount_point: Option<&str>) -> Self {
        self.snapshot.blockdevices.push(BlockDevice {
            name: name.to_string(),
            size,
            kind: Some("disk".to_string()),
            children: vec![BlockDevice {
                name: format!("{name}1"),
                size,
                kind: Some("part".to_string()),
                mountpoint: mount_point.map(str::to_string),
                ..Default::default()
            }],
            ..Default::default()
        });
        self
    }

    fn push_usage(&mut self, filesystem: &str, mount_point: &str, size: u64) {
        self.snapshot.disk_usage.push(DiskUsageEntry {
            filesystem: filesystem.to_string(),
            mountpoint: mount_point.to_string(),
            size,
            used: size / 4,
            available: size - size / 4,
        });
    }

    pub fn build(self) -> DeviceSnapshot {
        self.snapshot
    }

    pub fn pulse(self, timestamp: u64) -> FeedEvent {
        FeedEvent::DiskInfo(Pulse::new(timestamp, self.snapshot))
    }
}

fn luks_disk(name: &str, partition: &str, size: u64, mapper: Option<BlockDevice>) -> BlockDevice {
    BlockDevice {
        name: name.to_string(),
        size,
        kind: Some("disk".to_string()),
        children: vec![BlockDevice {
            name: partition.to_string(),
            size,
            kind: Some("part".to_string()),
            fstype: Some("crypto_LUKS".to_string()),
            children: mapper.into_iter().collect(),
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Load a recorded `admin_disk_info` payload
pub fn load_snapshot(path: &Path) -> Result<DeviceSnapshot> {
    let contents = std::fs::read_to_string(path).map_err(|e| TestingError::FixtureIo {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&contents).map_err(|e| TestingError::FixtureInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage_orchestrator::snapshot;

    #[test]
    fn builders_produce_expected_lifecycle_states() {
        let snap = SnapshotBuilder::new()
            .nas_disk("sdb", 4 * GIB, None)
            .locked_disk("sdc", 2 * GIB)
            .unlocked_disk("sdd", 2 * GIB, Some("/mnt/nas_backup"))
            .build();

        let sdb = snapshot::derive(&snap, "sdb");
        assert!(sdb.nas_compatible && !sdb.mounted && !sdb.encrypted);

        let sdc = snapshot::derive(&snap, "sdc");
        assert!(sdc.locked && !sdc.mounted);

        let sdd = snapshot::derive(&snap, "sdd");
        assert!(sdd.unlocked && sdd.mounted);
        assert_eq!(sdd.mapper_name.as_deref(), Some("luks-sdd1"));
    }

    #[test]
    fn missing_fixture_file_is_reported() {
        let err = load_snapshot(Path::new("/nonexistent/disk_info.json")).unwrap_err();
        assert!(matches!(err, TestingError::FixtureIo { .. }));
    }
}
