// SPDX-License-Identifier: GPL-3.0-only

//! Format and encrypt: double confirmation, then a PIN check before the
//! destructive call

use storage_contracts::{ConfirmRequest, ConfirmTone, OperationId, OperationKind};
use tracing::Instrument;
use zeroize::Zeroizing;

use super::OperationOrchestrator;
use crate::error::{Completion, OrchestratorError, Result};
use crate::snapshot;

impl OperationOrchestrator {
    /// Erase `device`, closing any open container on it first
    pub async fn format(&self, device: &str, pin: &str) -> Result<Completion> {
        let op = OperationId::new();
        let span = tracing::info_span!("format", %op, device);
        self.format_inner(device, Zeroizing::new(pin.to_string()))
            .instrument(span)
            .await
    }

    /// Create an encrypted container on `device`; returns the new mapper name
    pub async fn encrypt(&self, device: &str, pin: &str) -> Result<Completion<String>> {
        let op = OperationId::new();
        let span = tracing::info_span!("encrypt", %op, device);
        self.encrypt_inner(device, Zeroizing::new(pin.to_string()))
            .instrument(span)
            .await
    }

    async fn format_inner(&self, device: &str, pin: Zeroizing<String>) -> Result<Completion> {
        const KIND: OperationKind = OperationKind::Format;

        let _guard = match self.begin(KIND) {
            Ok(guard) => guard,
            Err(err) => return self.fail(KIND, err),
        };
        if let Err(err) = self.check_destructive_target(device, &pin, false) {
            return self.fail(KIND, err);
        }
        if !self.confirm_destructive(KIND, device).await {
            return Ok(Completion::Declined);
        }
        if let Err(err) = self.verify_pin(&pin).await {
            return self.fail(KIND, err);
        }

        match self.devices.format(device).await {
            Ok(()) => {
                self.succeed(KIND, format!("{device} formatted"));
                Ok(Completion::Done(()))
            }
            Err(err) => self.fail(KIND, err.into()),
        }
    }

    async fn encrypt_inner(&self, device: &str, pin: Zeroizing<String>) -> Result<Completion<String>> {
        const KIND: OperationKind = OperationKind::Encrypt;

        let _guard = match self.begin(KIND) {
            Ok(guard) => guard,
            Err(err) => return self.fail(KIND, err),
        };
        if let Err(err) = self.check_destructive_target(device, &pin, true) {
            return self.fail(KIND, err);
        }
        if !self.confirm_destructive(KIND, device).await {
            return Ok(Completion::Declined);
        }
        if let Err(err) = self.verify_pin(&pin).await {
            return self.fail(KIND, err);
        }

        match self.devices.encrypt(device).await {
            Ok(mapper) => {
                self.succeed(KIND, format!("{device} encrypted as {mapper}"));
                Ok(Completion::Done(mapper))
            }
            Err(err) => self.fail(KIND, err.into()),
        }
    }

    fn check_destructive_target(&self, device: &str, pin: &str, encrypting: bool) -> Result<()> {
        let snapshot = self.session.snapshot();
        if !snapshot::is_known(&snapshot, device) {
            return Err(OrchestratorError::validation(format!("{device} not found")));
        }
        if let Some(mount_point) = snapshot::mount_point_of(&snapshot, device) {
            return Err(OrchestratorError::validation(format!(
                "{device} is mounted at {mount_point}; unmount it first"
            )));
        }
        if encrypting && snapshot::is_encrypted(&snapshot, device) {
            return Err(OrchestratorError::validation(format!(
                "{device} is already encrypted"
            )));
        }
        if pin.trim().is_empty() {
            return Err(OrchestratorError::validation("PIN required"));
        }
        Ok(())
    }

    /// Yes/no first, then the operator types the device name
    async fn confirm_destructive(&self, kind: OperationKind, device: &str) -> bool {
        let (title, warning) = match kind {
            OperationKind::Encrypt => (
                "Encrypt",
                format!("Encrypting {device} erases everything on it. Continue?"),
            ),
            _ => (
                "Format",
                format!("Formatting {device} erases everything on it. Continue?"),
            ),
        };
        let first = ConfirmRequest::new(title, warning).tone(ConfirmTone::Destructive);
        if !self.operator.approve(first).await {
            return false;
        }

        let second = ConfirmRequest::new(title, format!("Type {device} to confirm"))
            .tone(ConfirmTone::Destructive)
            .challenge("Device name", device);
        self.operator.approve(second).await
    }

    /// A rejected or unverifiable PIN stops here
    async fn verify_pin(&self, pin: &str) -> Result<()> {
        let encrypted = self.encrypt_secret(pin, "PIN").await?;
        match self.devices.verify_pin(&encrypted).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(OrchestratorError::PinRejected),
            Err(err) => Err(err.into()),
        }
    }
}
