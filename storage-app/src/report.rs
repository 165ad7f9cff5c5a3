// SPDX-License-Identifier: GPL-3.0-only

//! Offline views over a recorded snapshot

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use storage_orchestrator::{
    Capabilities, FeedEvent, OrchestratorConfig, SelectionState, Session, snapshot,
};
use storage_types::{DerivedDeviceState, DeviceSnapshot, Pulse, bytes_to_pretty};

/// Either a bare `admin_disk_info` payload or a full pulse with its timestamp
#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotDump {
    Pulse(Pulse<DeviceSnapshot>),
    Bare(DeviceSnapshot),
}

pub fn load_snapshot(path: &Path) -> Result<Pulse<DeviceSnapshot>> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_snapshot(&contents).with_context(|| format!("parsing {}", path.display()))
}

fn parse_snapshot(contents: &str) -> Result<Pulse<DeviceSnapshot>> {
    Ok(match serde_json::from_str(contents)? {
        SnapshotDump::Pulse(pulse) => pulse,
        SnapshotDump::Bare(snapshot) => Pulse::new(1, snapshot),
    })
}

#[derive(Debug, Serialize)]
pub struct DeviceRow {
    pub device: String,
    pub capacity: u64,
    pub destination: Option<String>,
    #[serde(flatten)]
    pub state: DerivedDeviceState,
}

impl DeviceRow {
    fn status(&self) -> &'static str {
        if self.state.locked {
            "locked"
        } else if self.state.unlocked {
            "unlocked"
        } else if self.state.encrypted {
            "encrypted"
        } else {
            "plain"
        }
    }
}

pub fn device_rows(snapshot: &DeviceSnapshot, config: &OrchestratorConfig) -> Vec<DeviceRow> {
    snapshot::known_devices(snapshot)
        .into_iter()
        .map(|device| {
            let state = snapshot::derive(snapshot, &device);
            let destination = state
                .mount_point
                .as_deref()
                .and_then(|mp| config.destination_for_mount_point(mp))
                .map(|dest| dest.id.clone());
            DeviceRow {
                capacity: snapshot::capacity_of(snapshot, &device),
                device,
                destination,
                state,
            }
        })
        .collect()
}

pub fn print_rows(rows: &[DeviceRow]) {
    println!(
        "{:<10} {:<10} {:<4} {:<24} {:>12} {:>6}",
        "DEVICE", "STATUS", "NAS", "MOUNT", "SIZE", "USED"
    );
    println!("{}", "-".repeat(71));
    for row in rows {
        let mount = match (&row.state.mount_point, &row.destination) {
            (Some(mp), Some(dest)) => format!("{mp} ({dest})"),
            (Some(mp), None) => mp.clone(),
            (None, _) => "-".to_string(),
        };
        let used = row
            .state
            .space_usage
            .map(|usage| format!("{}%", usage.percent()))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<10} {:<10} {:<4} {:<24} {:>12} {:>6}",
            row.device,
            row.status(),
            if row.state.nas_compatible { "yes" } else { "no" },
            mount,
            bytes_to_pretty(&row.capacity, false),
            used
        );
    }
}

#[derive(Debug, Serialize)]
pub struct CapabilityReport {
    pub selection: SelectionState,
    pub notices: Vec<String>,
    pub capabilities: Capabilities,
}

/// Replay the selection against a fresh session and read the flags back
pub fn capabilities(
    pulse: Pulse<DeviceSnapshot>,
    config: OrchestratorConfig,
    device: Option<&str>,
    destination: Option<&str>,
) -> Result<CapabilityReport> {
    if let Some(device) = device
        && !snapshot::is_known(&pulse.data, device)
    {
        bail!("device '{device}' is not in the snapshot");
    }
    if let Some(destination) = destination
        && config.destination(destination).is_none()
    {
        bail!("destination '{destination}' is not configured");
    }

    let session = Session::new(Arc::new(config));
    session.ingest(FeedEvent::DiskInfo(pulse));

    let mut notices = Vec::new();
    if device.is_some() {
        notices.extend(session.select_device(device));
    }
    if destination.is_some() {
        notices.extend(session.select_destination(destination));
    }
    for notice in &notices {
        tracing::debug!(notice = %notice.message(), "selection notice");
    }

    Ok(CapabilityReport {
        selection: session.selection(),
        notices: notices.iter().map(|notice| notice.message()).collect(),
        capabilities: session.capabilities(&[]),
    })
}

pub fn print_capabilities(report: &CapabilityReport) {
    let selected = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
    println!("device:      {}", selected(&report.selection.device));
    println!("destination: {}", selected(&report.selection.destination));
    for notice in &report.notices {
        println!("note:        {notice}");
    }
    println!();

    let caps = &report.capabilities;
    for (name, allowed) in [
        ("mount", caps.can_mount),
        ("unmount", caps.can_unmount),
        ("format", caps.can_format),
        ("encrypt", caps.can_encrypt),
        ("unlock", caps.can_unlock),
        ("apply permissions", caps.can_apply_permissions),
        ("sync", caps.can_sync),
        ("auto-sync", caps.can_auto_sync),
    ] {
        println!("{:<18} {}", name, if allowed { "yes" } else { "no" });
    }
    if caps.destination_locked {
        println!();
        println!("device is mounted outside the configured destinations");
    }
}
