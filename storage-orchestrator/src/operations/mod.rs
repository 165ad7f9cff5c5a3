// SPDX-License-Identifier: GPL-3.0-only

//! Confirmation-gated device lifecycle operations
//!
//! Every operation follows the same template: check preconditions, take the
//! loading flag, confirm with the operator, call the backend, then either set
//! the pending-confirmation latch and notify success, or notify the error and
//! leave state untouched. The loading flag is a guard and releases on every
//! exit path.

mod destructive;
mod mount;
mod sync;
mod unlock;
mod unmount;

use std::sync::Arc;

use storage_contracts::{DeviceOpsAdapter, OperationKind, SecureTransport};

use crate::Collaborators;
use crate::capabilities::Capabilities;
use crate::error::{OrchestratorError, Result};
use crate::loading::{LoadingFlags, LoadingGuard};
use crate::operator::Operator;
use crate::selection::SelectionState;
use crate::services::ServiceCoordinator;
use crate::session::Session;

pub struct OperationOrchestrator {
    session: Arc<Session>,
    devices: Arc<dyn DeviceOpsAdapter>,
    secure: Arc<dyn SecureTransport>,
    services: ServiceCoordinator,
    operator: Operator,
    loading: Arc<LoadingFlags>,
}

impl OperationOrchestrator {
    pub fn new(session: Arc<Session>, collaborators: &Collaborators) -> Self {
        let operator = Operator::new(
            Arc::clone(&collaborators.prompt),
            Arc::clone(&collaborators.notifier),
            session.config().notifications.clone(),
            session.lifecycle().clone(),
        );
        Self {
            devices: Arc::clone(&collaborators.devices),
            secure: Arc::clone(&collaborators.secure),
            services: ServiceCoordinator::new(Arc::clone(&collaborators.services), operator.clone()),
            operator,
            loading: LoadingFlags::new(),
            session,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn capabilities(&self) -> Capabilities {
        self.session.capabilities(&self.loading.active())
    }

    pub fn is_loading(&self, kind: OperationKind) -> bool {
        self.loading.is_loading(kind)
    }

    pub fn selection(&self) -> SelectionState {
        self.session.selection()
    }

    pub fn select_device(&self, device: Option<&str>) -> SelectionState {
        if let Some(notice) = self.session.select_device(device) {
            self.operator.selection_notice(&notice);
        }
        self.session.selection()
    }

    pub fn select_destination(&self, destination: Option<&str>) -> SelectionState {
        if let Some(notice) = self.session.select_destination(destination) {
            self.operator.selection_notice(&notice);
        }
        self.session.selection()
    }

    /// Abandon open prompts and ignore late completions
    pub fn teardown(&self) {
        self.session.teardown();
    }

    /// Latch check and loading flag, in that order
    fn begin(&self, kind: OperationKind) -> Result<LoadingGuard> {
        if self.session.is_pending() {
            return Err(OrchestratorError::Stale);
        }
        if kind.changes_lifecycle()
            && let Some(running) = self
                .loading
                .active()
                .into_iter()
                .find(|other| other.changes_lifecycle())
        {
            return Err(OrchestratorError::busy(running));
        }
        self.loading
            .begin(kind)
            .ok_or_else(|| OrchestratorError::busy(kind))
    }

    /// Success path: latch for lifecycle changes, then notify
    fn succeed(&self, kind: OperationKind, message: impl Into<String>) {
        if !self.session.lifecycle().is_active() {
            return;
        }
        if kind.changes_lifecycle() {
            self.session.arm_latch();
        }
        let message = message.into();
        tracing::info!(operation = kind.label(), %message, "operation succeeded");
        self.operator.success(message);
    }

    /// Failure path: report and hand the error back
    fn fail<T>(&self, kind: OperationKind, err: OrchestratorError) -> Result<T> {
        if err.is_local() {
            tracing::debug!(operation = kind.label(), error = %err, "operation rejected locally");
        } else {
            tracing::warn!(operation = kind.label(), error = %err, "operation failed");
        }
        self.operator.report(&err);
        Err(err)
    }

    async fn encrypt_secret(&self, secret: &str, what: &'static str) -> Result<String> {
        self.secure
            .encrypt(secret)
            .await
            .ok_or(OrchestratorError::SecurePayload(what))
    }
}
