// SPDX-License-Identifier: GPL-3.0-only

//! Pure predicates over one device snapshot
//!
//! The four collections of a [`DeviceSnapshot`] can disagree for a pulse or
//! two. Mount detection resolves them in a fixed order:
//!
//! 1. NAS-compatible entry with `is_mounted` and a mount point
//! 2. the device's own mount point fields
//! 3. a direct partition's mount point fields
//! 4. a crypt mapper descendant's mount point fields
//! 5. a disk-usage row whose filesystem is the mapper of an open container
//!
//! Lock state comes from encryption entries only. An open entry counts as
//! unlocked when its mapper exists in the tree; a dangling open flag is
//! neither locked nor unlocked. A locked device never reports a mount point.
//!
//! Every function is total: missing data yields `false`/`None`.

use storage_types::{
    DerivedDeviceState, DeviceSnapshot, EncryptionEntry, SpaceUsage, device_name,
};

/// Encryption entries for `device` itself or any of its partitions
fn encryption_entries<'a>(
    snapshot: &'a DeviceSnapshot,
    device: &str,
) -> impl Iterator<Item = &'a EncryptionEntry> {
    let device = device_name(device).to_string();
    let tree_names: Vec<String> = snapshot
        .device(&device)
        .map(|dev| dev.walk().into_iter().map(|node| node.name.clone()).collect())
        .unwrap_or_default();

    snapshot.encryption.iter().filter(move |entry| {
        let name = device_name(&entry.device);
        tree_names.iter().any(|node| node == name) || is_partition_of(&device, name)
    })
}

/// `sdb1` belongs to `sdb`, `nvme0n1p2` to `nvme0n1`
///
/// Names ending in a digit take a `p` before the partition number, so
/// `loop10` is not a partition of `loop1`.
fn is_partition_of(device: &str, candidate: &str) -> bool {
    if device.is_empty() {
        return false;
    }
    if candidate == device {
        return true;
    }
    let Some(rest) = candidate.strip_prefix(device) else {
        return false;
    };
    let digits = if device.ends_with(|c: char| c.is_ascii_digit()) {
        match rest.strip_prefix('p') {
            Some(digits) => digits,
            None => return false,
        }
    } else {
        rest
    };
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn mapper_resolves(snapshot: &DeviceSnapshot, mapper: &str) -> bool {
    !mapper.is_empty() && snapshot.find_node(mapper).is_some()
}

fn is_resolvable_open(snapshot: &DeviceSnapshot, entry: &EncryptionEntry) -> bool {
    entry.is_open
        && entry
            .mapper_name
            .as_deref()
            .is_some_and(|mapper| mapper_resolves(snapshot, mapper))
}

pub fn has_locked_partition(snapshot: &DeviceSnapshot, device: &str) -> bool {
    encryption_entries(snapshot, device).any(|entry| !entry.is_open)
}

pub fn has_unlocked_partition(snapshot: &DeviceSnapshot, device: &str) -> bool {
    encryption_entries(snapshot, device).any(|entry| is_resolvable_open(snapshot, entry))
}

pub fn is_encrypted(snapshot: &DeviceSnapshot, device: &str) -> bool {
    if encryption_entries(snapshot, device).next().is_some() {
        return true;
    }
    snapshot
        .device(device)
        .is_some_and(|dev| dev.walk().iter().any(|node| node.is_luks_container()))
}

/// Mapper of the first open container that actually exists in the tree
pub fn mapper_name_of(snapshot: &DeviceSnapshot, device: &str) -> Option<String> {
    if let Some(mapper) = encryption_entries(snapshot, device)
        .filter(|entry| is_resolvable_open(snapshot, entry))
        .find_map(|entry| entry.mapper_name.clone())
    {
        return Some(mapper);
    }
    snapshot.device(device).and_then(|dev| {
        dev.walk()
            .into_iter()
            .find(|node| node.is_crypt_mapper())
            .map(|node| node.name.clone())
    })
}

pub fn is_nas_compatible(snapshot: &DeviceSnapshot, device: &str) -> bool {
    snapshot.nas_entry(device).is_some()
}

/// Effective mount point; `None` while any partition is locked
pub fn mount_point_of(snapshot: &DeviceSnapshot, device: &str) -> Option<String> {
    if has_locked_partition(snapshot, device) {
        return None;
    }
    resolve_mount_point(snapshot, device)
}

pub fn is_mounted(snapshot: &DeviceSnapshot, device: &str) -> bool {
    mount_point_of(snapshot, device).is_some()
}

fn resolve_mount_point(snapshot: &DeviceSnapshot, device: &str) -> Option<String> {
    if let Some(nas) = snapshot.nas_entry(device)
        && nas.is_mounted
        && let Some(mp) = nas.mountpoint.as_deref().filter(|mp| !mp.trim().is_empty())
    {
        return Some(mp.to_string());
    }

    if let Some(dev) = snapshot.device(device) {
        if let Some(mp) = dev.first_mount_point() {
            return Some(mp.to_string());
        }

        if let Some(mp) = dev
            .children
            .iter()
            .filter(|child| !child.is_crypt_mapper())
            .find_map(|child| child.first_mount_point())
        {
            return Some(mp.to_string());
        }

        if let Some(mp) = dev
            .walk()
            .into_iter()
            .filter(|node| node.is_crypt_mapper())
            .find_map(|node| node.first_mount_point())
        {
            return Some(mp.to_string());
        }
    }

    encryption_entries(snapshot, device)
        .filter(|entry| entry.is_open)
        .filter_map(|entry| entry.mapper_name.as_deref())
        .find_map(|mapper| {
            snapshot
                .disk_usage
                .iter()
                .find(|usage| {
                    device_name(&usage.filesystem) == mapper && !usage.mountpoint.trim().is_empty()
                })
                .map(|usage| usage.mountpoint.clone())
        })
}

/// NAS list statistics first, then the disk-usage row for the mount point
pub fn space_usage_of(snapshot: &DeviceSnapshot, device: &str) -> Option<SpaceUsage> {
    if let Some(nas) = snapshot.nas_entry(device)
        && nas.size > 0
    {
        return Some(SpaceUsage {
            total: nas.size,
            used: nas.used,
            available: nas.available,
        });
    }

    let mount_point = mount_point_of(snapshot, device)?;
    snapshot
        .disk_usage
        .iter()
        .find(|usage| crate::config::same_mount_point(&usage.mountpoint, &mount_point))
        .map(|usage| SpaceUsage {
            total: usage.size,
            used: usage.used,
            available: usage.available,
        })
}

/// Filesystem capacity when known, raw device size otherwise
pub fn capacity_of(snapshot: &DeviceSnapshot, device: &str) -> u64 {
    space_usage_of(snapshot, device)
        .map(|usage| usage.total)
        .filter(|total| *total > 0)
        .or_else(|| snapshot.device(device).map(|dev| dev.size))
        .unwrap_or(0)
}

pub fn derive(snapshot: &DeviceSnapshot, device: &str) -> DerivedDeviceState {
    let locked = has_locked_partition(snapshot, device);
    let mount_point = mount_point_of(snapshot, device);
    DerivedDeviceState {
        mounted: mount_point.is_some(),
        mount_point,
        encrypted: is_encrypted(snapshot, device),
        locked,
        unlocked: has_unlocked_partition(snapshot, device),
        mapper_name: mapper_name_of(snapshot, device),
        nas_compatible: is_nas_compatible(snapshot, device),
        space_usage: space_usage_of(snapshot, device),
    }
}

/// Whether the device appears anywhere in the snapshot
pub fn is_known(snapshot: &DeviceSnapshot, device: &str) -> bool {
    snapshot.device(device).is_some() || snapshot.nas_entry(device).is_some()
}

/// Top-level and NAS-listed device names, tree order first, no duplicates
pub fn known_devices(snapshot: &DeviceSnapshot) -> Vec<String> {
    let mut names: Vec<String> = snapshot
        .device_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    for entry in &snapshot.nas_compatible {
        let name = device_name(&entry.device);
        if !name.is_empty() && !names.iter().any(|known| known == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Device currently mounted at `mount_point`
pub fn device_at(snapshot: &DeviceSnapshot, mount_point: &str) -> Option<String> {
    known_devices(snapshot).into_iter().find(|device| {
        mount_point_of(snapshot, device)
            .is_some_and(|mp| crate::config::same_mount_point(&mp, mount_point))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage_types::{BlockDevice, DiskUsageEntry, NasDevice};

    fn disk(name: &str, children: Vec<BlockDevice>) -> BlockDevice {
        BlockDevice {
            name: name.to_string(),
            size: 1_000,
            kind: Some("disk".to_string()),
            children,
            ..Default::default()
        }
    }

    fn part(name: &str, mountpoint: Option<&str>) -> BlockDevice {
        BlockDevice {
            name: name.to_string(),
            kind: Some("part".to_string()),
            mountpoints: vec![mountpoint.map(str::to_string)],
            ..Default::default()
        }
    }

    fn luks_part(name: &str, mapper: Option<BlockDevice>) -> BlockDevice {
        BlockDevice {
            name: name.to_string(),
            kind: Some("part".to_string()),
            fstype: Some("crypto_LUKS".to_string()),
            children: mapper.into_iter().collect(),
            ..Default::default()
        }
    }

    fn mapper(name: &str, mountpoint: Option<&str>) -> BlockDevice {
        BlockDevice {
            name: name.to_string(),
            kind: Some("crypt".to_string()),
            mountpoint: mountpoint.map(str::to_string),
            ..Default::default()
        }
    }

    fn encryption(device: &str, is_open: bool, mapper: Option<&str>) -> EncryptionEntry {
        EncryptionEntry {
            device: device.to_string(),
            is_open,
            mapper_name: mapper.map(str::to_string),
        }
    }

    #[test]
    fn missing_device_is_neutral() {
        let snapshot = DeviceSnapshot::default();
        assert_eq!(derive(&snapshot, "sdz"), DerivedDeviceState::default());
        assert_eq!(capacity_of(&snapshot, "sdz"), 0);
    }

    #[test]
    fn nas_entry_mount_wins() {
        let snapshot = DeviceSnapshot {
            blockdevices: vec![disk("sdb", vec![part("sdb1", Some("/media/stale"))])],
            nas_compatible: vec![NasDevice {
                device: "/dev/sdb".to_string(),
                mountpoint: Some("/mnt/nas".to_string()),
                is_mounted: true,
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(mount_point_of(&snapshot, "sdb").as_deref(), Some("/mnt/nas"));
    }

    #[test]
    fn nas_entry_without_mount_falls_back_to_partitions() {
        let snapshot = DeviceSnapshot {
            blockdevices: vec![disk("sdb", vec![part("sdb1", Some("/mnt/nas_backup"))])],
            nas_compatible: vec![NasDevice {
                device: "/dev/sdb".to_string(),
                is_mounted: false,
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(
            mount_point_of(&snapshot, "/dev/sdb").as_deref(),
            Some("/mnt/nas_backup")
        );
    }

    #[test]
    fn crypt_mapper_mount_is_found() {
        let snapshot = DeviceSnapshot {
            blockdevices: vec![disk(
                "sdc",
                vec![luks_part("sdc1", Some(mapper("luks-sdc1", Some("/mnt/nas"))))],
            )],
            encryption: vec![encryption("/dev/sdc1", true, Some("luks-sdc1"))],
            ..Default::default()
        };
        let state = derive(&snapshot, "sdc");
        assert!(state.mounted);
        assert!(state.unlocked);
        assert!(!state.locked);
        assert!(state.encrypted);
        assert_eq!(state.mapper_name.as_deref(), Some("luks-sdc1"));
        assert_eq!(state.mount_point.as_deref(), Some("/mnt/nas"));
    }

    #[test]
    fn disk_usage_covers_stale_mapper_mountpoints() {
        let snapshot = DeviceSnapshot {
            blockdevices: vec![disk(
                "sdc",
                vec![luks_part("sdc1", Some(mapper("luks-sdc1", None)))],
            )],
            encryption: vec![encryption("/dev/sdc1", true, Some("luks-sdc1"))],
            disk_usage: vec![DiskUsageEntry {
                filesystem: "/dev/mapper/luks-sdc1".to_string(),
                mountpoint: "/mnt/nas_backup".to_string(),
                size: 500,
                used: 100,
                available: 400,
            }],
            ..Default::default()
        };
        assert_eq!(
            mount_point_of(&snapshot, "sdc").as_deref(),
            Some("/mnt/nas_backup")
        );
        let usage = space_usage_of(&snapshot, "sdc").unwrap();
        assert_eq!(usage.total, 500);
        assert_eq!(capacity_of(&snapshot, "sdc"), 500);
    }

    #[test]
    fn open_without_mount_is_unlocked_not_mounted() {
        let snapshot = DeviceSnapshot {
            blockdevices: vec![disk(
                "sdc",
                vec![luks_part("sdc1", Some(mapper("luks-sdc1", None)))],
            )],
            encryption: vec![encryption("/dev/sdc1", true, Some("luks-sdc1"))],
            ..Default::default()
        };
        assert!(has_unlocked_partition(&snapshot, "sdc"));
        assert!(!is_mounted(&snapshot, "sdc"));
    }

    #[test]
    fn dangling_open_flag_is_neither_locked_nor_unlocked() {
        let snapshot = DeviceSnapshot {
            blockdevices: vec![disk("sdc", vec![luks_part("sdc1", None)])],
            encryption: vec![encryption("/dev/sdc1", true, Some("luks-sdc1"))],
            ..Default::default()
        };
        assert!(!has_unlocked_partition(&snapshot, "sdc"));
        assert!(!has_locked_partition(&snapshot, "sdc"));
        assert!(is_encrypted(&snapshot, "sdc"));
    }

    #[test]
    fn locked_device_never_reports_mount_point() {
        let snapshot = DeviceSnapshot {
            blockdevices: vec![disk(
                "sdc",
                vec![luks_part("sdc1", None), part("sdc2", Some("/boot/efi"))],
            )],
            encryption: vec![encryption("/dev/sdc1", false, None)],
            ..Default::default()
        };
        assert!(has_locked_partition(&snapshot, "sdc"));
        assert!(!is_mounted(&snapshot, "sdc"));
        assert_eq!(mount_point_of(&snapshot, "sdc"), None);
    }

    #[test]
    fn partition_names_match_without_tree() {
        assert!(is_partition_of("sdb", "sdb1"));
        assert!(is_partition_of("nvme0n1", "nvme0n1p2"));
        assert!(!is_partition_of("sdb", "sdba"));
        assert!(!is_partition_of("sdb", "sdc1"));
        assert!(!is_partition_of("", "sdb1"));
        assert!(is_partition_of("loop1", "loop1p1"));
        assert!(!is_partition_of("loop1", "loop10"));
        assert!(!is_partition_of("md1", "md10"));
        assert!(!is_partition_of("nvme0n1", "nvme0n12"));
    }

    #[test]
    fn sibling_loop_container_does_not_lock_mounted_device() {
        let loop_device = |name: &str, mountpoint: Option<&str>| BlockDevice {
            name: name.to_string(),
            kind: Some("loop".to_string()),
            mountpoint: mountpoint.map(str::to_string),
            ..Default::default()
        };
        let snapshot = DeviceSnapshot {
            blockdevices: vec![
                loop_device("loop1", Some("/mnt/nas")),
                loop_device("loop10", None),
            ],
            encryption: vec![encryption("/dev/loop10", false, None)],
            ..Default::default()
        };
        assert!(!has_locked_partition(&snapshot, "loop1"));
        assert!(!is_encrypted(&snapshot, "loop1"));
        assert_eq!(mount_point_of(&snapshot, "loop1").as_deref(), Some("/mnt/nas"));
        assert!(has_locked_partition(&snapshot, "loop10"));
    }

    #[test]
    fn luks_fstype_marks_encrypted_before_entries_arrive() {
        let snapshot = DeviceSnapshot {
            blockdevices: vec![disk("sdd", vec![luks_part("sdd1", None)])],
            ..Default::default()
        };
        assert!(is_encrypted(&snapshot, "sdd"));
        assert!(!has_locked_partition(&snapshot, "sdd"));
    }

    #[test]
    fn device_at_finds_occupant() {
        let snapshot = DeviceSnapshot {
            blockdevices: vec![
                disk("sdb", vec![part("sdb1", Some("/mnt/nas/"))]),
                disk("sdc", vec![part("sdc1", None)]),
            ],
            ..Default::default()
        };
        assert_eq!(device_at(&snapshot, "/mnt/nas").as_deref(), Some("sdb"));
        assert_eq!(device_at(&snapshot, "/mnt/nas_backup"), None);
    }

    #[test]
    fn known_devices_merges_nas_list() {
        let snapshot = DeviceSnapshot {
            blockdevices: vec![disk("sdb", vec![])],
            nas_compatible: vec![
                NasDevice {
                    device: "/dev/sdb".to_string(),
                    ..Default::default()
                },
                NasDevice {
                    device: "/dev/sde".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(known_devices(&snapshot), vec!["sdb", "sde"]);
    }
}
