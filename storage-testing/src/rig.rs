//! Orchestrators wired to fakes

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use storage_orchestrator::{
    Collaborators, FeedEvent, KeyRotationOrchestrator, OperationOrchestrator, OrchestratorConfig,
    Session,
};
use storage_types::{DeviceSnapshot, Pulse};

use crate::fakes::{
    FakeDevices, FakeKeys, FakeSecureTransport, FakeServices, RecordingNotifier, ScriptedPrompt,
};
use crate::fixtures::SnapshotBuilder;

pub struct TestRig {
    pub session: Arc<Session>,
    pub operations: OperationOrchestrator,
    pub keys: KeyRotationOrchestrator,
    pub devices: Arc<FakeDevices>,
    pub key_backend: Arc<FakeKeys>,
    pub services: Arc<FakeServices>,
    pub secure: Arc<FakeSecureTransport>,
    pub prompt: Arc<ScriptedPrompt>,
    pub notifier: Arc<RecordingNotifier>,
    next_pulse: AtomicU64,
}

impl TestRig {
    pub fn new() -> Self {
        Self::with_config(OrchestratorConfig::default())
    }

    pub fn with_config(config: OrchestratorConfig) -> Self {
        crate::init_tracing();
        let devices = Arc::new(FakeDevices::new());
        let key_backend = Arc::new(FakeKeys::new());
        let services = Arc::new(FakeServices::new());
        let secure = Arc::new(FakeSecureTransport::new());
        let prompt = Arc::new(ScriptedPrompt::new());
        let notifier = Arc::new(RecordingNotifier::new());

        let collaborators = Collaborators {
            devices: devices.clone(),
            keys: key_backend.clone(),
            services: services.clone(),
            secure: secure.clone(),
            prompt: prompt.clone(),
            notifier: notifier.clone(),
        };
        let session = Arc::new(Session::new(Arc::new(config)));
        let operations = OperationOrchestrator::new(session.clone(), &collaborators);
        let keys = KeyRotationOrchestrator::new(session.clone(), &collaborators);

        Self {
            session,
            operations,
            keys,
            devices,
            key_backend,
            services,
            secure,
            prompt,
            notifier,
            next_pulse: AtomicU64::new(1),
        }
    }

    /// Rig whose session already holds `snapshot` as pulse 1
    pub fn with_snapshot(snapshot: SnapshotBuilder) -> Self {
        let rig = Self::new();
        rig.publish(snapshot.build());
        rig
    }

    /// Deliver `snapshot` with the next pulse timestamp; returns that timestamp
    pub fn publish(&self, snapshot: DeviceSnapshot) -> u64 {
        let timestamp = self.next_pulse.fetch_add(1, Ordering::SeqCst);
        self.session
            .ingest(FeedEvent::DiskInfo(Pulse::new(timestamp, snapshot)));
        timestamp
    }

    /// Re-deliver the current snapshot with a newer timestamp
    pub fn republish(&self) -> u64 {
        self.publish(self.session.snapshot().as_ref().clone())
    }
}

impl Default for TestRig {
    fn default() -> Self {
        Self::new()
    }
}
