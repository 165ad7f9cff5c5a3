// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::{ConfirmRequest, OperationId, OperationKind};
use tracing::Instrument;

use super::OperationOrchestrator;
use crate::error::{Completion, OrchestratorError, Result};
use crate::services::ServiceClearance;
use crate::snapshot;

impl OperationOrchestrator {
    /// Unmount `device` from wherever the snapshot says it is mounted
    ///
    /// The shared primary mount point goes through the service coordinator
    /// first; the unmount call only happens once dependent services are
    /// stopped or the operator forces it.
    pub async fn unmount(&self, device: &str) -> Result<Completion> {
        let op = OperationId::new();
        let span = tracing::info_span!("unmount", %op, device);
        self.unmount_inner(device).instrument(span).await
    }

    async fn unmount_inner(&self, device: &str) -> Result<Completion> {
        const KIND: OperationKind = OperationKind::Unmount;

        let _guard = match self.begin(KIND) {
            Ok(guard) => guard,
            Err(err) => return self.fail(KIND, err),
        };

        let snapshot = self.session.snapshot();
        let Some(mount_point) = snapshot::mount_point_of(&snapshot, device) else {
            return self.fail(
                KIND,
                OrchestratorError::validation(format!("{device} is not mounted")),
            );
        };

        let confirmed = if self.session.config().is_primary_mount_point(&mount_point) {
            let clearance = match self.services.clear_for_unmount(&mount_point).await {
                Ok(clearance) => clearance,
                Err(err) => return self.fail(KIND, err),
            };
            tracing::debug!(?clearance, "service clearance");
            match clearance {
                ServiceClearance::Declined => return Ok(Completion::Declined),
                ServiceClearance::NoneRunning => self.confirm_unmount(device, &mount_point).await,
                ServiceClearance::Stopped(_) | ServiceClearance::Forced { .. } => true,
            }
        } else {
            self.confirm_unmount(device, &mount_point).await
        };
        if !confirmed {
            return Ok(Completion::Declined);
        }

        if let Err(err) = self.devices.unmount(device, &mount_point).await {
            return self.fail(KIND, err.into());
        }
        self.succeed(KIND, format!("{device} unmounted from {mount_point}"));
        Ok(Completion::Done(()))
    }

    async fn confirm_unmount(&self, device: &str, mount_point: &str) -> bool {
        let request = ConfirmRequest::new("Unmount", format!("Unmount {device} from {mount_point}?"));
        self.operator.approve(request).await
    }
}
