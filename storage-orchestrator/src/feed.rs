// SPDX-License-Identifier: GPL-3.0-only

//! Broadcast feed plumbing and the fallback status poller

use std::sync::Arc;

use storage_contracts::DeviceOpsAdapter;
use storage_types::{DeviceSnapshot, DriveTestStatus, Pulse, PulseTimestamp, SyncJob};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::session::Session;

/// Keys of the push surface this crate consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKey {
    AdminDiskInfo,
    SyncStatus,
    HardDriveTestStatus,
}

impl FeedKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AdminDiskInfo => "admin_disk_info",
            Self::SyncStatus => "sync_status",
            Self::HardDriveTestStatus => "hard_drive_test_status",
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "admin_disk_info" => Some(Self::AdminDiskInfo),
            "sync_status" => Some(Self::SyncStatus),
            "hard_drive_test_status" => Some(Self::HardDriveTestStatus),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    DiskInfo(Pulse<DeviceSnapshot>),
    SyncStatus(Pulse<Option<SyncJob>>),
    DriveTestStatus(Pulse<Vec<DriveTestStatus>>),
}

impl FeedEvent {
    pub fn key(&self) -> FeedKey {
        match self {
            Self::DiskInfo(_) => FeedKey::AdminDiskInfo,
            Self::SyncStatus(_) => FeedKey::SyncStatus,
            Self::DriveTestStatus(_) => FeedKey::HardDriveTestStatus,
        }
    }

    pub fn timestamp(&self) -> PulseTimestamp {
        match self {
            Self::DiskInfo(pulse) => pulse.timestamp,
            Self::SyncStatus(pulse) => pulse.timestamp,
            Self::DriveTestStatus(pulse) => pulse.timestamp,
        }
    }
}

/// Forward feed events into the session until the channel closes or the
/// session is torn down
pub fn spawn_feed_pump(session: Arc<Session>, mut events: mpsc::Receiver<FeedEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = session.lifecycle().cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => {
                        session.ingest(event);
                    }
                    None => {
                        tracing::debug!("feed channel closed");
                        break;
                    }
                },
            }
        }
    })
}

/// Poll sync and drive-test status on the configured interval; push
/// delivery is not assumed reliable
pub fn spawn_status_poller(
    session: Arc<Session>,
    devices: Arc<dyn DeviceOpsAdapter>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(session.config().poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = session.lifecycle().cancelled() => break,
                _ = ticker.tick() => poll_once(&session, devices.as_ref()).await,
            }
        }
    })
}

pub async fn poll_once(session: &Session, devices: &dyn DeviceOpsAdapter) {
    match devices.sync_status().await {
        Ok(job) => session.apply_polled_sync_status(job),
        Err(err) => tracing::debug!(error = %err, "sync status poll failed"),
    }
    match devices.drive_test_status().await {
        Ok(tests) => session.apply_polled_drive_tests(tests),
        Err(err) => tracing::debug!(error = %err, "drive test poll failed"),
    }
}
