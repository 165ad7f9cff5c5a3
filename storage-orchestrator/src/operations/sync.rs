// SPDX-License-Identifier: GPL-3.0-only

//! Permissions, sync and auto-sync; none of these move the latch

use storage_contracts::{ConfirmRequest, OperationId, OperationKind};
use storage_types::SyncJob;
use tracing::Instrument;

use super::OperationOrchestrator;
use crate::capabilities::sync_ready;
use crate::error::{Completion, OrchestratorError, Result};

impl OperationOrchestrator {
    pub async fn apply_permissions(&self) -> Result<Completion> {
        const KIND: OperationKind = OperationKind::Permissions;
        let op = OperationId::new();

        async {
            let _guard = match self.begin(KIND) {
                Ok(guard) => guard,
                Err(err) => return self.fail(KIND, err),
            };
            let request = ConfirmRequest::new(
                "Apply permissions",
                "Reset ownership and permissions on the shared storage?",
            );
            if !self.operator.approve(request).await {
                return Ok(Completion::Declined);
            }
            match self.devices.apply_permissions().await {
                Ok(()) => {
                    self.succeed(KIND, "Permissions applied");
                    Ok(Completion::Done(()))
                }
                Err(err) => self.fail(KIND, err.into()),
            }
        }
        .instrument(tracing::info_span!("apply_permissions", %op))
        .await
    }

    /// Start a sync job, or reattach to the one already running
    pub async fn sync(&self) -> Result<Completion<SyncJob>> {
        const KIND: OperationKind = OperationKind::Sync;
        let op = OperationId::new();

        async {
            if let Err(err) = self.check_sync_ready() {
                return self.fail(KIND, err);
            }
            if let Some(job) = self.session.sync_job().filter(SyncJob::is_active) {
                return Ok(Completion::Done(self.reattach(job)));
            }

            let _guard = match self.begin(KIND) {
                Ok(guard) => guard,
                Err(err) => return self.fail(KIND, err),
            };
            match self.devices.sync_status().await {
                Ok(Some(job)) if job.is_active() => {
                    return Ok(Completion::Done(self.reattach(job)));
                }
                Ok(_) => {}
                Err(err) => return self.fail(KIND, err.into()),
            }

            let request = ConfirmRequest::new(
                "Sync",
                "Copy the primary storage onto the backup storage now?",
            );
            if !self.operator.approve(request).await {
                return Ok(Completion::Declined);
            }
            match self.devices.start_sync().await {
                Ok(job) => {
                    self.session.track_sync_job(job.clone());
                    self.succeed(KIND, format!("Sync started ({})", job.id));
                    Ok(Completion::Done(job))
                }
                Err(err) => self.fail(KIND, err.into()),
            }
        }
        .instrument(tracing::info_span!("sync", %op))
        .await
    }

    /// Enabling needs both destinations mounted; disabling is always allowed
    pub async fn set_auto_sync(&self, enabled: bool) -> Result<Completion> {
        const KIND: OperationKind = OperationKind::AutoSync;
        let op = OperationId::new();

        async {
            if enabled && let Err(err) = self.check_sync_ready() {
                return self.fail(KIND, err);
            }
            let _guard = match self.begin(KIND) {
                Ok(guard) => guard,
                Err(err) => return self.fail(KIND, err),
            };
            let verb = if enabled { "Enable" } else { "Disable" };
            let request = ConfirmRequest::new("Auto-sync", format!("{verb} nightly auto-sync?"));
            if !self.operator.approve(request).await {
                return Ok(Completion::Declined);
            }
            match self.devices.set_auto_sync(enabled).await {
                Ok(()) => {
                    let state = if enabled { "enabled" } else { "disabled" };
                    self.succeed(KIND, format!("Auto-sync {state}"));
                    Ok(Completion::Done(()))
                }
                Err(err) => self.fail(KIND, err.into()),
            }
        }
        .instrument(tracing::info_span!("set_auto_sync", %op, enabled))
        .await
    }

    fn check_sync_ready(&self) -> Result<()> {
        if sync_ready(&self.session.snapshot(), self.session.config()) {
            Ok(())
        } else {
            Err(OrchestratorError::validation(
                "sync needs both storage destinations mounted, with the backup at least as large as the primary",
            ))
        }
    }

    fn reattach(&self, job: SyncJob) -> SyncJob {
        tracing::info!(job = %job.id, "reattaching to running sync job");
        self.session.track_sync_job(job.clone());
        self.operator.info(format!("Sync already running ({})", job.id));
        job
    }
}
