// SPDX-License-Identifier: GPL-3.0-only

//! Device & key lifecycle orchestration
//!
//! Drives a remote storage backend through mount, unmount, format, encrypt,
//! unlock and key rotation. The backend's authoritative state only arrives as
//! periodic snapshot pulses, so the orchestrator:
//!
//! - derives per-device facts from each snapshot ([`snapshot`])
//! - tracks the operator's device/destination selection ([`selection`])
//! - gates every operation behind confirmation prompts ([`operations`], [`keys`])
//! - freezes further mutations after a success until a strictly newer pulse
//!   arrives ([`latch`])
//!
//! Collaborators (transport, prompts, secure transmission) are reached only
//! through the traits in `storage-contracts`.

pub mod capabilities;
pub mod config;
pub mod error;
pub mod feed;
pub mod keys;
pub mod latch;
pub mod lifecycle;
pub mod loading;
pub mod operations;
pub mod operator;
pub mod selection;
pub mod services;
pub mod session;
pub mod snapshot;
pub mod status_cache;

use std::sync::{Arc, Mutex, MutexGuard};

use storage_contracts::{
    DeviceOpsAdapter, KeyOpsAdapter, Notifier, OperatorPrompt, SecureTransport, ServiceOpsAdapter,
};

pub use capabilities::Capabilities;
pub use config::{ConfigError, Destination, OrchestratorConfig};
pub use error::{Completion, OrchestratorError, Result};
pub use feed::{FeedEvent, FeedKey};
pub use keys::{KeyForm, KeyRotationOrchestrator};
pub use latch::PendingConfirmation;
pub use lifecycle::Lifecycle;
pub use loading::{LoadingFlags, LoadingGuard};
pub use operations::OperationOrchestrator;
pub use operator::Operator;
pub use selection::{SelectionNotice, SelectionPhase, SelectionState};
pub use services::{ServiceClearance, ServiceCoordinator};
pub use session::Session;
pub use status_cache::{CacheLookup, StatusCache};

/// External collaborators consumed by both orchestrators
#[derive(Clone)]
pub struct Collaborators {
    pub devices: Arc<dyn DeviceOpsAdapter>,
    pub keys: Arc<dyn KeyOpsAdapter>,
    pub services: Arc<dyn ServiceOpsAdapter>,
    pub secure: Arc<dyn SecureTransport>,
    pub prompt: Arc<dyn OperatorPrompt>,
    pub notifier: Arc<dyn Notifier>,
}

/// Short critical sections only; a poisoned lock still holds consistent data
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
