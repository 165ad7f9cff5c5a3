//! Test doubles for every collaborator the orchestrator consumes, snapshot
//! fixtures, and a rig that wires them together.

pub mod errors;
pub mod fakes;
pub mod fixtures;
pub mod rig;

pub use fakes::{
    DeviceCall, FakeDevices, FakeKeys, FakeSecureTransport, FakeServices, KeyCall,
    RecordingNotifier, ScriptedPrompt, ServiceCall,
};
pub use fixtures::SnapshotBuilder;
pub use rig::TestRig;

/// Route orchestrator logs to the test output; `RUST_LOG` picks the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
