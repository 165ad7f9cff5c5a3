// SPDX-License-Identifier: GPL-3.0-only

//! Raw device snapshot as broadcast by the backend
//!
//! A snapshot is a block-device tree plus three sibling collections that may
//! disagree with each other for a pulse or two. Nothing in here decides which
//! source wins; that reconciliation lives in the orchestrator's snapshot model.

use serde::{Deserialize, Serialize};

use crate::common::device_name;

/// Block device kind for a LUKS mapper child as reported by the tree
pub const CRYPT_KIND: &str = "crypt";

/// Filesystem type of a LUKS container partition
pub const LUKS_FSTYPE: &str = "crypto_LUKS";

/// One node of the block-device tree (disk, partition or crypt mapper)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockDevice {
    /// Kernel name without `/dev/` (e.g. "sdb", "sdb1", "luks-sdb1")
    pub name: String,

    /// Size in bytes
    pub size: u64,

    /// Single mount point field, as older backends report it
    pub mountpoint: Option<String>,

    /// Mount point list; entries may be null
    pub mountpoints: Vec<Option<String>>,

    /// Filesystem type (e.g. "ext4", "crypto_LUKS")
    pub fstype: Option<String>,

    /// Device kind ("disk", "part", "crypt")
    #[serde(rename = "type")]
    pub kind: Option<String>,

    pub children: Vec<BlockDevice>,
}

impl BlockDevice {
    /// Raw mount points from both the scalar and the list field, non-empty only
    pub fn raw_mount_points(&self) -> impl Iterator<Item = &str> {
        self.mountpoint
            .as_deref()
            .into_iter()
            .chain(self.mountpoints.iter().filter_map(|mp| mp.as_deref()))
            .filter(|mp| !mp.trim().is_empty())
    }

    /// First non-empty raw mount point
    pub fn first_mount_point(&self) -> Option<&str> {
        self.raw_mount_points().next()
    }

    pub fn is_crypt_mapper(&self) -> bool {
        self.kind.as_deref() == Some(CRYPT_KIND)
    }

    pub fn is_luks_container(&self) -> bool {
        self.fstype.as_deref() == Some(LUKS_FSTYPE)
    }

    /// Depth-first search of this node and all descendants
    pub fn find(&self, name: &str) -> Option<&BlockDevice> {
        let name = device_name(name);
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }

    /// This node and every descendant, depth first
    pub fn walk(&self) -> Vec<&BlockDevice> {
        let mut nodes = vec![self];
        for child in &self.children {
            nodes.extend(child.walk());
        }
        nodes
    }
}

/// One `df`-style disk usage row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskUsageEntry {
    /// Filesystem source path (e.g. "/dev/mapper/luks-sdb1")
    pub filesystem: String,

    pub mountpoint: String,

    pub size: u64,
    pub used: u64,
    pub available: u64,
}

/// Encryption state of one LUKS container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionEntry {
    /// Raw container device path (e.g. "/dev/sdb1")
    pub device: String,

    /// Whether the backend reports the container as open
    pub is_open: bool,

    /// Mapper name when open (e.g. "luks-sdb1")
    pub mapper_name: Option<String>,
}

/// Flattened entry from the NAS-compatible device list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NasDevice {
    pub device: String,
    pub mountpoint: Option<String>,
    pub is_mounted: bool,
    pub is_ready: bool,
    pub size: u64,
    pub used: u64,
    pub available: u64,
}

/// Full snapshot carried by one `admin_disk_info` pulse
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSnapshot {
    pub blockdevices: Vec<BlockDevice>,
    pub disk_usage: Vec<DiskUsageEntry>,
    pub encryption: Vec<EncryptionEntry>,
    pub nas_compatible: Vec<NasDevice>,
}

impl DeviceSnapshot {
    /// Top-level device by name or path
    pub fn device(&self, name: &str) -> Option<&BlockDevice> {
        let name = device_name(name);
        self.blockdevices.iter().find(|dev| dev.name == name)
    }

    /// Any node in the tree by name or path
    pub fn find_node(&self, name: &str) -> Option<&BlockDevice> {
        self.blockdevices.iter().find_map(|dev| dev.find(name))
    }

    pub fn nas_entry(&self, name: &str) -> Option<&NasDevice> {
        let name = device_name(name);
        self.nas_compatible
            .iter()
            .find(|entry| device_name(&entry.device) == name)
    }

    /// Names of all top-level devices, in tree order
    pub fn device_names(&self) -> Vec<&str> {
        self.blockdevices.iter().map(|dev| dev.name.as_str()).collect()
    }
}

/// Space statistics for a mounted filesystem
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceUsage {
    pub total: u64,
    pub used: u64,
    pub available: u64,
}

impl SpaceUsage {
    /// Used percentage (0-100); zero for an empty filesystem
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.used.saturating_mul(100)) / self.total).min(100) as u8
    }
}

/// Facts derived from a snapshot for one device
///
/// Recomputed on every pulse, never mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedDeviceState {
    pub mounted: bool,
    pub mount_point: Option<String>,
    pub encrypted: bool,
    pub locked: bool,
    pub unlocked: bool,
    pub mapper_name: Option<String>,
    pub nas_compatible: bool,
    pub space_usage: Option<SpaceUsage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_parses_sparse_json() {
        let json = r#"{
            "blockdevices": [
                {"name": "sdb", "size": 1000, "type": "disk", "children": [
                    {"name": "sdb1", "fstype": "crypto_LUKS", "mountpoints": [null]}
                ]}
            ],
            "encryption": [{"device": "/dev/sdb1", "is_open": false}]
        }"#;

        let snapshot: DeviceSnapshot = serde_json::from_str(json).unwrap();
        let sdb = snapshot.device("/dev/sdb").unwrap();
        assert_eq!(sdb.children.len(), 1);
        assert!(sdb.children[0].is_luks_container());
        assert_eq!(sdb.children[0].first_mount_point(), None);
        assert!(snapshot.disk_usage.is_empty());
        assert!(snapshot.nas_compatible.is_empty());
    }

    #[test]
    fn raw_mount_points_skip_blank_entries() {
        let dev = BlockDevice {
            name: "sdc".to_string(),
            mountpoint: Some(" ".to_string()),
            mountpoints: vec![None, Some("/mnt/nas".to_string())],
            ..Default::default()
        };
        assert_eq!(dev.first_mount_point(), Some("/mnt/nas"));
    }

    #[test]
    fn find_node_descends_into_children() {
        let snapshot = DeviceSnapshot {
            blockdevices: vec![BlockDevice {
                name: "sdb".to_string(),
                children: vec![BlockDevice {
                    name: "sdb1".to_string(),
                    children: vec![BlockDevice {
                        name: "luks-sdb1".to_string(),
                        kind: Some(CRYPT_KIND.to_string()),
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        };

        let mapper = snapshot.find_node("/dev/mapper/luks-sdb1").unwrap();
        assert!(mapper.is_crypt_mapper());
        assert!(snapshot.device("sdb1").is_none());
    }

    #[test]
    fn space_usage_percent_handles_zero_total() {
        assert_eq!(SpaceUsage::default().percent(), 0);
        let usage = SpaceUsage {
            total: 200,
            used: 50,
            available: 150,
        };
        assert_eq!(usage.percent(), 25);
    }
}
