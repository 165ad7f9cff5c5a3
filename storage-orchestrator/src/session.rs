// SPDX-License-Identifier: GPL-3.0-only

//! Latest snapshot, selection and latch for one operator session

use std::sync::{Arc, Mutex};

use storage_contracts::OperationKind;
use storage_types::{
    DerivedDeviceState, DeviceSnapshot, DriveTestStatus, PulseTimestamp, SyncJob,
};

use crate::capabilities::Capabilities;
use crate::config::OrchestratorConfig;
use crate::feed::FeedEvent;
use crate::latch::PendingConfirmation;
use crate::lifecycle::Lifecycle;
use crate::lock;
use crate::selection::{SelectionNotice, SelectionState, Selector};
use crate::snapshot;

#[derive(Debug, Default)]
struct SessionState {
    snapshot: Arc<DeviceSnapshot>,
    disk_pulse: Option<PulseTimestamp>,
    latch: PendingConfirmation,
    selection: SelectionState,
    sync_job: Option<SyncJob>,
    sync_pulse: Option<PulseTimestamp>,
    drive_tests: Vec<DriveTestStatus>,
    drive_test_pulse: Option<PulseTimestamp>,
}

fn accepts(last: Option<PulseTimestamp>, incoming: PulseTimestamp) -> bool {
    last.is_none_or(|last| incoming.is_newer_than(last))
}

pub struct Session {
    config: Arc<OrchestratorConfig>,
    state: Mutex<SessionState>,
    lifecycle: Lifecycle,
}

impl Session {
    pub fn new(config: Arc<OrchestratorConfig>) -> Self {
        Self::with_lifecycle(config, Lifecycle::new())
    }

    pub fn with_lifecycle(config: Arc<OrchestratorConfig>, lifecycle: Lifecycle) -> Self {
        Self {
            config,
            state: Mutex::default(),
            lifecycle,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn snapshot(&self) -> Arc<DeviceSnapshot> {
        Arc::clone(&lock(&self.state).snapshot)
    }

    pub fn last_pulse(&self) -> Option<PulseTimestamp> {
        lock(&self.state).disk_pulse
    }

    pub fn selection(&self) -> SelectionState {
        lock(&self.state).selection.clone()
    }

    pub fn latch(&self) -> PendingConfirmation {
        lock(&self.state).latch
    }

    pub fn is_pending(&self) -> bool {
        self.latch().is_pending()
    }

    pub fn derived(&self, device: &str) -> DerivedDeviceState {
        snapshot::derive(&self.snapshot(), device)
    }

    pub fn sync_job(&self) -> Option<SyncJob> {
        lock(&self.state).sync_job.clone()
    }

    pub fn drive_tests(&self) -> Vec<DriveTestStatus> {
        lock(&self.state).drive_tests.clone()
    }

    /// Accept a pulse if strictly newer than the last one on its key
    pub fn ingest(&self, event: FeedEvent) -> bool {
        if !self.lifecycle.is_active() {
            return false;
        }
        let key = event.key();
        let timestamp = event.timestamp();
        let mut state = lock(&self.state);

        let accepted = match event {
            FeedEvent::DiskInfo(pulse) => {
                if !accepts(state.disk_pulse, pulse.timestamp) {
                    false
                } else {
                    state.snapshot = Arc::new(pulse.data);
                    state.disk_pulse = Some(pulse.timestamp);
                    if state.latch.observe(pulse.timestamp) {
                        tracing::debug!(%timestamp, "pending confirmation released");
                    }
                    let snapshot = Arc::clone(&state.snapshot);
                    let selector = Selector::new(&snapshot, &self.config.destinations);
                    if selector.reconcile(&mut state.selection) {
                        tracing::debug!(selection = ?state.selection, "selection reconciled");
                    }
                    true
                }
            }
            FeedEvent::SyncStatus(pulse) => {
                if accepts(state.sync_pulse, pulse.timestamp) {
                    state.sync_job = pulse.data;
                    state.sync_pulse = Some(pulse.timestamp);
                    true
                } else {
                    false
                }
            }
            FeedEvent::DriveTestStatus(pulse) => {
                if accepts(state.drive_test_pulse, pulse.timestamp) {
                    state.drive_tests = pulse.data;
                    state.drive_test_pulse = Some(pulse.timestamp);
                    true
                } else {
                    false
                }
            }
        };

        if !accepted {
            tracing::trace!(key = key.as_str(), %timestamp, "stale pulse ignored");
        }
        accepted
    }

    /// Poll results carry no pulse; they replace the value without moving
    /// the pulse watermark
    pub fn apply_polled_sync_status(&self, job: Option<SyncJob>) {
        if self.lifecycle.is_active() {
            lock(&self.state).sync_job = job;
        }
    }

    pub fn apply_polled_drive_tests(&self, tests: Vec<DriveTestStatus>) {
        if self.lifecycle.is_active() {
            lock(&self.state).drive_tests = tests;
        }
    }

    pub fn select_device(&self, device: Option<&str>) -> Option<SelectionNotice> {
        let mut state = lock(&self.state);
        if state.latch.is_pending() {
            return Some(SelectionNotice::AwaitingSnapshot);
        }
        let snapshot = Arc::clone(&state.snapshot);
        Selector::new(&snapshot, &self.config.destinations).select_device(&mut state.selection, device)
    }

    pub fn select_destination(&self, destination: Option<&str>) -> Option<SelectionNotice> {
        let mut state = lock(&self.state);
        if state.latch.is_pending() {
            return Some(SelectionNotice::AwaitingSnapshot);
        }
        let snapshot = Arc::clone(&state.snapshot);
        Selector::new(&snapshot, &self.config.destinations)
            .select_destination(&mut state.selection, destination)
    }

    pub fn capabilities(&self, busy: &[OperationKind]) -> Capabilities {
        let state = lock(&self.state);
        Capabilities::evaluate(
            &state.snapshot,
            &state.selection,
            &self.config,
            state.latch,
            state.sync_job.as_ref(),
            busy,
        )
    }

    /// Set the latch at the last seen pulse; false if already set or torn down
    pub(crate) fn arm_latch(&self) -> bool {
        if !self.lifecycle.is_active() {
            return false;
        }
        let mut state = lock(&self.state);
        let since = state.disk_pulse.unwrap_or(PulseTimestamp::ZERO);
        let armed = state.latch.arm(since);
        if armed {
            tracing::debug!(%since, "awaiting newer snapshot");
        }
        armed
    }

    pub(crate) fn track_sync_job(&self, job: SyncJob) {
        if self.lifecycle.is_active() {
            lock(&self.state).sync_job = Some(job);
        }
    }

    pub fn teardown(&self) {
        self.lifecycle.teardown();
    }
}
