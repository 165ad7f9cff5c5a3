// SPDX-License-Identifier: GPL-3.0-only

//! Device / destination selection state machine
//!
//! Phases: nothing selected, device only, destination only, a mounted device
//! bound to its destination, or an unmounted candidate paired with a free
//! destination. Every operator action maps to exactly one transition below.

use serde::Serialize;
use storage_contracts::NotificationLevel;
use storage_types::{DeviceSnapshot, device_name};

use crate::config::{Destination, same_mount_point};
use crate::snapshot;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionState {
    pub device: Option<String>,
    pub destination: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPhase {
    Empty,
    DeviceOnly,
    DestinationOnly,
    /// Mounted device and the destination it is mounted at
    BoundMounted,
    /// Unmounted device paired with a destination it could be mounted at
    BoundCandidate,
}

/// Operator-facing explanation of a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionNotice {
    MountedAtDestination { device: String, destination: String },
    /// Blocks destination changes until unmounted
    MountedElsewhere { device: String, mount_point: String },
    UnlockRequired { device: String },
    DestinationOccupied { destination: String, occupant: String },
    /// A mounted device stays paired with its own destination
    PairedWithOwnMount { device: String, destination: String },
    UnknownDestination { destination: String },
    /// Selection is frozen until the next snapshot
    AwaitingSnapshot,
}

impl SelectionNotice {
    pub fn level(&self) -> NotificationLevel {
        match self {
            Self::MountedAtDestination { .. } | Self::AwaitingSnapshot => NotificationLevel::Info,
            Self::MountedElsewhere { .. } | Self::UnlockRequired { .. } => {
                NotificationLevel::Warning
            }
            Self::DestinationOccupied { .. }
            | Self::PairedWithOwnMount { .. }
            | Self::UnknownDestination { .. } => NotificationLevel::Error,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::MountedAtDestination {
                device,
                destination,
            } => format!("{device} is mounted at {destination}"),
            Self::MountedElsewhere {
                device,
                mount_point,
            } => format!(
                "{device} is mounted at non-standard path {mount_point}; unmount it to choose a destination"
            ),
            Self::UnlockRequired { device } => {
                format!("{device} is locked; unlock it before choosing a destination")
            }
            Self::DestinationOccupied {
                destination,
                occupant,
            } => format!("{destination} is already in use by {occupant}"),
            Self::PairedWithOwnMount {
                device,
                destination,
            } => format!("{device} is mounted at {destination}; unmount it first"),
            Self::UnknownDestination { destination } => {
                format!("unknown destination '{destination}'")
            }
            Self::AwaitingSnapshot => {
                "waiting for the device list to catch up with the last change".to_string()
            }
        }
    }
}

/// Applies selection transitions against one snapshot
pub struct Selector<'a> {
    snapshot: &'a DeviceSnapshot,
    destinations: &'a [Destination],
}

impl<'a> Selector<'a> {
    pub fn new(snapshot: &'a DeviceSnapshot, destinations: &'a [Destination]) -> Self {
        Self {
            snapshot,
            destinations,
        }
    }

    fn destination(&self, id: &str) -> Option<&'a Destination> {
        self.destinations.iter().find(|d| d.id == id)
    }

    fn destination_at(&self, mount_point: &str) -> Option<&'a Destination> {
        self.destinations
            .iter()
            .find(|d| same_mount_point(&d.mount_point, mount_point))
    }

    fn occupant(&self, destination: &Destination) -> Option<String> {
        snapshot::device_at(self.snapshot, &destination.mount_point)
    }

    pub fn phase(&self, state: &SelectionState) -> SelectionPhase {
        match (&state.device, &state.destination) {
            (None, None) => SelectionPhase::Empty,
            (Some(_), None) => SelectionPhase::DeviceOnly,
            (None, Some(_)) => SelectionPhase::DestinationOnly,
            (Some(device), Some(destination)) => {
                let mounted_here = snapshot::mount_point_of(self.snapshot, device)
                    .zip(self.destination(destination))
                    .is_some_and(|(mp, dest)| dest.matches_mount_point(&mp));
                if mounted_here {
                    SelectionPhase::BoundMounted
                } else {
                    SelectionPhase::BoundCandidate
                }
            }
        }
    }

    pub fn select_device(
        &self,
        state: &mut SelectionState,
        device: Option<&str>,
    ) -> Option<SelectionNotice> {
        let Some(device) = device.map(device_name).filter(|d| !d.is_empty()) else {
            *state = SelectionState::default();
            return None;
        };
        let derived = snapshot::derive(self.snapshot, device);

        if state.device.as_deref() == Some(device) {
            if let Some(mount_point) = derived.mount_point.as_deref() {
                let paired = self.destination_at(mount_point).map(|d| d.id.as_str());
                if state.destination.is_some() && state.destination.as_deref() == paired {
                    state.destination = None;
                }
                state.device = None;
            } else {
                *state = SelectionState::default();
            }
            return None;
        }

        state.device = Some(device.to_string());

        if let Some(mount_point) = derived.mount_point {
            return match self.destination_at(&mount_point) {
                Some(destination) => {
                    state.destination = Some(destination.id.clone());
                    Some(SelectionNotice::MountedAtDestination {
                        device: device.to_string(),
                        destination: destination.label().to_string(),
                    })
                }
                None => {
                    state.destination = None;
                    Some(SelectionNotice::MountedElsewhere {
                        device: device.to_string(),
                        mount_point,
                    })
                }
            };
        }

        if derived.locked {
            state.destination = None;
            return Some(SelectionNotice::UnlockRequired {
                device: device.to_string(),
            });
        }

        if derived.unlocked {
            state.destination = None;
            return None;
        }

        // keep a previously chosen destination only while it is still free
        let keep = state
            .destination
            .take()
            .filter(|id| self.destination(id).is_some_and(|d| self.occupant(d).is_none()));
        state.destination = keep;
        None
    }

    pub fn select_destination(
        &self,
        state: &mut SelectionState,
        destination: Option<&str>,
    ) -> Option<SelectionNotice> {
        let Some(id) = destination else {
            let bound = self.phase(state) == SelectionPhase::BoundMounted;
            if bound {
                *state = SelectionState::default();
            } else {
                state.destination = None;
            }
            return None;
        };
        let Some(destination) = self.destination(id) else {
            return Some(SelectionNotice::UnknownDestination {
                destination: id.to_string(),
            });
        };
        let occupant = self.occupant(destination);

        let Some(device) = state.device.clone() else {
            if let Some(occupant) = occupant {
                state.device = Some(occupant.clone());
                state.destination = Some(destination.id.clone());
                return Some(SelectionNotice::MountedAtDestination {
                    device: occupant,
                    destination: destination.label().to_string(),
                });
            }
            toggle(&mut state.destination, &destination.id);
            return None;
        };

        let derived = snapshot::derive(self.snapshot, &device);
        if derived.locked {
            return Some(SelectionNotice::UnlockRequired { device });
        }

        if let Some(mount_point) = derived.mount_point {
            return match self.destination_at(&mount_point) {
                None => Some(SelectionNotice::MountedElsewhere {
                    device,
                    mount_point,
                }),
                Some(own) if own.id == destination.id => {
                    if state.destination.as_deref() == Some(own.id.as_str()) {
                        *state = SelectionState::default();
                    } else {
                        state.destination = Some(own.id.clone());
                    }
                    None
                }
                Some(own) => Some(SelectionNotice::PairedWithOwnMount {
                    device,
                    destination: own.label().to_string(),
                }),
            };
        }

        if let Some(occupant) = occupant {
            return Some(SelectionNotice::DestinationOccupied {
                destination: destination.label().to_string(),
                occupant,
            });
        }

        toggle(&mut state.destination, &destination.id);
        None
    }

    /// Re-establish invariants after a new snapshot; returns true on change
    pub fn reconcile(&self, state: &mut SelectionState) -> bool {
        let before = state.clone();

        match state.device.clone() {
            Some(device) if !snapshot::is_known(self.snapshot, &device) => {
                *state = SelectionState::default();
            }
            Some(device) => {
                let derived = snapshot::derive(self.snapshot, &device);
                if let Some(mount_point) = derived.mount_point {
                    state.destination = self.destination_at(&mount_point).map(|d| d.id.clone());
                } else if derived.locked {
                    state.destination = None;
                } else if let Some(id) = state.destination.clone() {
                    let free = self
                        .destination(&id)
                        .is_some_and(|d| self.occupant(d).is_none());
                    if !free {
                        state.destination = None;
                    }
                }
            }
            None => {
                if let Some(id) = state.destination.clone()
                    && self.destination(&id).is_none()
                {
                    state.destination = None;
                }
            }
        }

        *state != before
    }
}

fn toggle(slot: &mut Option<String>, id: &str) {
    if slot.as_deref() == Some(id) {
        *slot = None;
    } else {
        *slot = Some(id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage_types::{BlockDevice, EncryptionEntry, NasDevice};

    fn destinations() -> Vec<Destination> {
        vec![
            Destination::new("nas", "/mnt/nas"),
            Destination::new("nas_backup", "/mnt/nas_backup"),
        ]
    }

    fn disk(name: &str, mountpoint: Option<&str>) -> BlockDevice {
        BlockDevice {
            name: name.to_string(),
            kind: Some("disk".to_string()),
            children: vec![BlockDevice {
                name: format!("{name}1"),
                kind: Some("part".to_string()),
                mountpoint: mountpoint.map(str::to_string),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn snapshot() -> DeviceSnapshot {
        DeviceSnapshot {
            blockdevices: vec![
                disk("sda", Some("/mnt/nas")),
                disk("sdb", None),
                disk("sdc", Some("/media/usb")),
                BlockDevice {
                    name: "sdd".to_string(),
                    children: vec![BlockDevice {
                        name: "sdd1".to_string(),
                        fstype: Some("crypto_LUKS".to_string()),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
            ],
            encryption: vec![EncryptionEntry {
                device: "/dev/sdd1".to_string(),
                is_open: false,
                mapper_name: None,
            }],
            nas_compatible: vec![NasDevice {
                device: "/dev/sdb".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn state(device: Option<&str>, destination: Option<&str>) -> SelectionState {
        SelectionState {
            device: device.map(str::to_string),
            destination: destination.map(str::to_string),
        }
    }

    #[test]
    fn mounted_device_auto_selects_its_destination() {
        let snapshot = snapshot();
        let dests = destinations();
        let selector = Selector::new(&snapshot, &dests);
        let mut selection = SelectionState::default();

        let notice = selector.select_device(&mut selection, Some("/dev/sda"));
        assert_eq!(selection, state(Some("sda"), Some("nas")));
        assert!(matches!(
            notice,
            Some(SelectionNotice::MountedAtDestination { .. })
        ));
        assert_eq!(selector.phase(&selection), SelectionPhase::BoundMounted);
    }

    #[test]
    fn non_standard_mount_blocks_destination_changes() {
        let snapshot = snapshot();
        let dests = destinations();
        let selector = Selector::new(&snapshot, &dests);
        let mut selection = SelectionState::default();

        let notice = selector.select_device(&mut selection, Some("sdc"));
        assert!(matches!(notice, Some(SelectionNotice::MountedElsewhere { .. })));
        assert_eq!(selection, state(Some("sdc"), None));

        let notice = selector.select_destination(&mut selection, Some("nas_backup"));
        assert!(matches!(notice, Some(SelectionNotice::MountedElsewhere { .. })));
        assert_eq!(selection, state(Some("sdc"), None));
    }

    #[test]
    fn locked_device_clears_destination_and_ignores_destination_clicks() {
        let snapshot = snapshot();
        let dests = destinations();
        let selector = Selector::new(&snapshot, &dests);
        let mut selection = state(None, Some("nas_backup"));

        let notice = selector.select_device(&mut selection, Some("sdd"));
        assert!(matches!(notice, Some(SelectionNotice::UnlockRequired { .. })));
        assert_eq!(selection, state(Some("sdd"), None));

        selector.select_destination(&mut selection, Some("nas_backup"));
        assert_eq!(selection, state(Some("sdd"), None));
    }

    #[test]
    fn reselecting_unmounted_device_clears_everything() {
        let snapshot = snapshot();
        let dests = destinations();
        let selector = Selector::new(&snapshot, &dests);
        let mut selection = state(Some("sdb"), Some("nas_backup"));

        selector.select_device(&mut selection, Some("sdb"));
        assert_eq!(selection, SelectionState::default());
    }

    #[test]
    fn reselecting_mounted_device_clears_its_pair() {
        let snapshot = snapshot();
        let dests = destinations();
        let selector = Selector::new(&snapshot, &dests);
        let mut selection = state(Some("sda"), Some("nas"));

        selector.select_device(&mut selection, Some("sda"));
        assert_eq!(selection, SelectionState::default());
    }

    #[test]
    fn occupied_destination_is_rejected_for_other_device() {
        let snapshot = snapshot();
        let dests = destinations();
        let selector = Selector::new(&snapshot, &dests);
        let mut selection = state(Some("sdb"), None);

        let notice = selector.select_destination(&mut selection, Some("nas"));
        assert_eq!(
            notice,
            Some(SelectionNotice::DestinationOccupied {
                destination: "nas".to_string(),
                occupant: "sda".to_string(),
            })
        );
        assert_eq!(selection, state(Some("sdb"), None));
    }

    #[test]
    fn occupant_toggles_its_own_destination_off() {
        let snapshot = snapshot();
        let dests = destinations();
        let selector = Selector::new(&snapshot, &dests);
        let mut selection = state(Some("sda"), Some("nas"));

        selector.select_destination(&mut selection, Some("nas"));
        assert_eq!(selection, SelectionState::default());
    }

    #[test]
    fn mounted_device_cannot_switch_destination() {
        let snapshot = snapshot();
        let dests = destinations();
        let selector = Selector::new(&snapshot, &dests);
        let mut selection = state(Some("sda"), Some("nas"));

        let notice = selector.select_destination(&mut selection, Some("nas_backup"));
        assert!(matches!(
            notice,
            Some(SelectionNotice::PairedWithOwnMount { .. })
        ));
        assert_eq!(selection, state(Some("sda"), Some("nas")));
    }

    #[test]
    fn occupied_destination_without_device_selects_occupant() {
        let snapshot = snapshot();
        let dests = destinations();
        let selector = Selector::new(&snapshot, &dests);
        let mut selection = SelectionState::default();

        selector.select_destination(&mut selection, Some("nas"));
        assert_eq!(selection, state(Some("sda"), Some("nas")));
    }

    #[test]
    fn free_destination_pairs_and_toggles() {
        let snapshot = snapshot();
        let dests = destinations();
        let selector = Selector::new(&snapshot, &dests);
        let mut selection = state(Some("sdb"), None);

        selector.select_destination(&mut selection, Some("nas_backup"));
        assert_eq!(selection, state(Some("sdb"), Some("nas_backup")));
        assert_eq!(selector.phase(&selection), SelectionPhase::BoundCandidate);

        selector.select_destination(&mut selection, Some("nas_backup"));
        assert_eq!(selection, state(Some("sdb"), None));
    }

    #[test]
    fn destination_alone_toggles() {
        let snapshot = snapshot();
        let dests = destinations();
        let selector = Selector::new(&snapshot, &dests);
        let mut selection = SelectionState::default();

        selector.select_destination(&mut selection, Some("nas_backup"));
        assert_eq!(selector.phase(&selection), SelectionPhase::DestinationOnly);
        selector.select_destination(&mut selection, Some("nas_backup"));
        assert_eq!(selector.phase(&selection), SelectionPhase::Empty);
    }

    #[test]
    fn switching_to_plain_device_keeps_free_destination() {
        let snapshot = snapshot();
        let dests = destinations();
        let selector = Selector::new(&snapshot, &dests);
        let mut selection = state(None, Some("nas_backup"));

        selector.select_device(&mut selection, Some("sdb"));
        assert_eq!(selection, state(Some("sdb"), Some("nas_backup")));
    }

    #[test]
    fn unknown_destination_is_reported() {
        let snapshot = snapshot();
        let dests = destinations();
        let selector = Selector::new(&snapshot, &dests);
        let mut selection = state(Some("sdb"), None);

        let notice = selector.select_destination(&mut selection, Some("archive"));
        assert!(matches!(
            notice,
            Some(SelectionNotice::UnknownDestination { .. })
        ));
        assert_eq!(selection, state(Some("sdb"), None));
    }

    #[test]
    fn clearing_destination_of_bound_pair_clears_both() {
        let snapshot = snapshot();
        let dests = destinations();
        let selector = Selector::new(&snapshot, &dests);

        let mut bound = state(Some("sda"), Some("nas"));
        selector.select_destination(&mut bound, None);
        assert_eq!(bound, SelectionState::default());

        let mut candidate = state(Some("sdb"), Some("nas_backup"));
        selector.select_destination(&mut candidate, None);
        assert_eq!(candidate, state(Some("sdb"), None));
    }

    #[test]
    fn reconcile_follows_new_mount() {
        let mut snapshot = snapshot();
        snapshot.blockdevices[1] = disk("sdb", Some("/mnt/nas_backup"));
        let dests = destinations();
        let selector = Selector::new(&snapshot, &dests);

        let mut selection = state(Some("sdb"), None);
        assert!(selector.reconcile(&mut selection));
        assert_eq!(selection, state(Some("sdb"), Some("nas_backup")));
        assert!(!selector.reconcile(&mut selection));
    }

    #[test]
    fn reconcile_drops_vanished_device() {
        let snapshot = snapshot();
        let dests = destinations();
        let selector = Selector::new(&snapshot, &dests);

        let mut selection = state(Some("sdx"), Some("nas_backup"));
        assert!(selector.reconcile(&mut selection));
        assert_eq!(selection, SelectionState::default());
    }
}
