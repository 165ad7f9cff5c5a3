// SPDX-License-Identifier: GPL-3.0-only

//! Canonical data models for the storage admin orchestrator
//!
//! These types describe what the backend broadcasts and what the orchestrator
//! sends back:
//!
//! - **snapshot**: the raw, denormalized device tree with its three sibling
//!   collections (disk usage, encryption entries, NAS-compatible devices)
//! - **pulse**: the monotonic timestamp attached to every broadcast
//! - **keys**: key-slot status and key rotation requests
//! - **jobs**: sync and drive self-test job status
//!
//! Derived facts (mounted, locked, ...) are computed by the orchestrator from
//! these values and never stored back into them.

pub mod common;
pub mod jobs;
pub mod keys;
pub mod pulse;
pub mod snapshot;

pub use common::{bytes_to_pretty, device_name};
pub use jobs::{DriveTestStatus, SyncJob, SyncJobState};
pub use keys::{
    EncryptedKeyPayloads, FlexibleOption, KeyOperationRequest, KeySlot, KeySlotInfo, KeyStrategy,
    KeyTarget, KeyUpdateRequest, MAX_KEY_SLOT, MIN_KEY_SLOT, SlotKind,
};
pub use pulse::{Pulse, PulseTimestamp};
pub use snapshot::{
    BlockDevice, DerivedDeviceState, DeviceSnapshot, DiskUsageEntry, EncryptionEntry, NasDevice,
    SpaceUsage,
};
