// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::{ConfirmRequest, OperationId, OperationKind};
use tracing::Instrument;

use super::OperationOrchestrator;
use crate::error::{Completion, OrchestratorError, Result};
use crate::snapshot;

impl OperationOrchestrator {
    /// Mount `device` at the configured destination `destination`
    pub async fn mount(&self, device: &str, destination: &str) -> Result<Completion> {
        let op = OperationId::new();
        let span = tracing::info_span!("mount", %op, device, destination);
        self.mount_inner(device, destination).instrument(span).await
    }

    async fn mount_inner(&self, device: &str, destination: &str) -> Result<Completion> {
        const KIND: OperationKind = OperationKind::Mount;

        let _guard = match self.begin(KIND) {
            Ok(guard) => guard,
            Err(err) => return self.fail(KIND, err),
        };

        let config = self.session.config();
        let Some(dest) = config.destination(destination) else {
            return self.fail(
                KIND,
                OrchestratorError::validation(format!("unknown destination '{destination}'")),
            );
        };
        let mount_point = dest.mount_point.clone();

        let snapshot = self.session.snapshot();
        let state = snapshot::derive(&snapshot, device);
        if let Some(current) = state.mount_point.as_deref() {
            return self.fail(
                KIND,
                OrchestratorError::validation(format!("{device} is already mounted at {current}")),
            );
        }
        if state.locked {
            return self.fail(
                KIND,
                OrchestratorError::validation(format!("{device} is locked; unlock it first")),
            );
        }
        if let Some(occupant) = snapshot::device_at(&snapshot, &mount_point) {
            return self.fail(
                KIND,
                OrchestratorError::validation(format!(
                    "{} is already in use by {occupant}",
                    dest.label()
                )),
            );
        }
        if !state.unlocked && !state.nas_compatible {
            return self.fail(
                KIND,
                OrchestratorError::validation(format!(
                    "{device} is neither an unlocked container nor NAS-compatible"
                )),
            );
        }

        let request = ConfirmRequest::new("Mount", format!("Mount {device} at {mount_point}?"));
        if !self.operator.approve(request).await {
            return Ok(Completion::Declined);
        }

        if let Err(err) = self.devices.mount(device, &mount_point).await {
            return self.fail(KIND, err.into());
        }
        self.succeed(KIND, format!("{device} mounted at {mount_point}"));

        if config.is_primary_mount_point(&mount_point) && self.session.lifecycle().is_active() {
            self.services.restore_after_mount(&mount_point).await;
        }
        Ok(Completion::Done(()))
    }
}
