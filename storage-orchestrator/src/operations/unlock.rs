// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::{ConfirmRequest, OperationId, OperationKind, StorageError, UnlockOutcome};
use tracing::Instrument;

use super::OperationOrchestrator;
use crate::error::{Completion, OrchestratorError, Result};
use crate::snapshot;

impl OperationOrchestrator {
    /// Unlock with the server-held key, falling back to an operator password
    pub async fn unlock(&self, device: &str) -> Result<Completion<UnlockOutcome>> {
        let op = OperationId::new();
        let span = tracing::info_span!("unlock", %op, device);
        self.unlock_inner(device).instrument(span).await
    }

    async fn unlock_inner(&self, device: &str) -> Result<Completion<UnlockOutcome>> {
        const KIND: OperationKind = OperationKind::Unlock;

        let _guard = match self.begin(KIND) {
            Ok(guard) => guard,
            Err(err) => return self.fail(KIND, err),
        };
        if !snapshot::has_locked_partition(&self.session.snapshot(), device) {
            return self.fail(
                KIND,
                OrchestratorError::validation(format!("{device} has no locked container")),
            );
        }

        let request = ConfirmRequest::new("Unlock", format!("Unlock {device}?"));
        if !self.operator.approve(request).await {
            return Ok(Completion::Declined);
        }

        let outcome = match self.devices.unlock(device).await {
            Ok(UnlockOutcome::PasswordRequired) => {
                tracing::info!("server key not accepted, asking for password");
                match self.unlock_with_password(device).await {
                    Ok(Some(outcome)) => outcome,
                    Ok(None) => return Ok(Completion::Declined),
                    Err(err) => return self.fail(KIND, err),
                }
            }
            Ok(outcome) => outcome,
            Err(err) => return self.fail(KIND, err.into()),
        };

        match &outcome {
            UnlockOutcome::Unlocked {
                mapper_name: Some(mapper),
            } => {
                self.succeed(KIND, format!("{device} unlocked as {mapper}"));
            }
            UnlockOutcome::Unlocked { mapper_name: None } => {
                self.succeed(KIND, format!("{device} unlocked"));
            }
            UnlockOutcome::AlreadyUnlocked => {
                self.succeed(KIND, format!("{device} is already unlocked"));
            }
            UnlockOutcome::PasswordRequired => {
                return self.fail(
                    KIND,
                    OrchestratorError::Backend(StorageError::rejected(format!(
                        "password not accepted for {device}"
                    ))),
                );
            }
        }
        Ok(Completion::Done(outcome))
    }

    /// `Ok(None)` when the operator dismisses the password prompt
    async fn unlock_with_password(&self, device: &str) -> Result<Option<UnlockOutcome>> {
        let request = ConfirmRequest::new(
            "Password required",
            format!("{device} needs its passphrase to unlock"),
        )
        .secret_input("Passphrase");
        let answer = self.operator.confirm(request).await;
        if !answer.confirmed {
            return Ok(None);
        }
        let Some(password) = answer.input.filter(|input| !input.is_empty()) else {
            return Err(OrchestratorError::validation("passphrase required"));
        };

        let encrypted = self.encrypt_secret(&password, "passphrase").await?;
        let outcome = self.devices.unlock_with_password(device, &encrypted).await?;
        Ok(Some(outcome))
    }
}
