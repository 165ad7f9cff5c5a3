// SPDX-License-Identifier: GPL-3.0-only

use storage_contracts::{ConfirmRequest, ConfirmTone, OperationId, OperationKind};
use storage_types::{KeyStrategy, KeyUpdateRequest};
use tracing::Instrument;
use zeroize::Zeroizing;

use super::KeyRotationOrchestrator;
use crate::error::{Completion, OrchestratorError, Result};
use crate::lock;

impl KeyRotationOrchestrator {
    /// Rotate the key of a single device with the form's strategy
    pub async fn update(&self, device: &str) -> Result<Completion> {
        let op = OperationId::new();
        let strategy = self.with_form(|form| form.strategy);
        let span = tracing::info_span!("key_update", %op, device, ?strategy);
        self.update_inner(device, strategy).instrument(span).await
    }

    async fn update_inner(&self, device: &str, strategy: KeyStrategy) -> Result<Completion> {
        const KIND: OperationKind = OperationKind::KeyUpdate;

        let _guard = match self.begin(KIND) {
            Ok(guard) => guard,
            Err(err) => return self.fail(KIND, err),
        };

        let is_vault = self.vault_path.get().is_some_and(|vault| vault == device);
        let slots_full = if strategy == KeyStrategy::FlexibleAddition {
            let target = [(device.to_string(), self.slot_kind_of(device))];
            match self.ensure_slots_full(&target).await {
                Ok(full) => full,
                Err(err) => return self.fail(KIND, err),
            }
        } else {
            false
        };
        let prepared = {
            let form = lock(&self.form);
            let current = if is_vault {
                form.vault_password()
            } else {
                form.current_password(device)
            };
            form.check_passwords()
                .and_then(|()| {
                    current.ok_or_else(|| OrchestratorError::MissingPassword {
                        device: device.to_string(),
                    })
                })
                .and_then(|current| {
                    let (option, slot) = form.update_slot_choice(slots_full)?;
                    let new_password = form.new_password().unwrap_or_default();
                    Ok((
                        Zeroizing::new(new_password.to_string()),
                        Zeroizing::new(current.to_string()),
                        option,
                        slot,
                    ))
                })
        };
        let (new_password, current_password, flexible_option, key_slot) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => return self.fail(KIND, err),
        };

        if !self.operator.approve(update_confirmation(strategy, device)).await {
            return Ok(Completion::Declined);
        }

        let encrypted_new = match self.encrypt_secret(&new_password, "new password").await {
            Ok(encrypted) => encrypted,
            Err(err) => return self.fail(KIND, err),
        };
        let encrypted_current = match self.encrypt_secret(&current_password, "current password").await
        {
            Ok(encrypted) => encrypted,
            Err(err) => return self.fail(KIND, err),
        };

        let request = KeyUpdateRequest::new(
            device.to_string(),
            strategy,
            flexible_option,
            key_slot,
            encrypted_new,
            encrypted_current,
        );
        if let Err(err) = self.keys.update_key(&request).await {
            return self.fail(KIND, err.into());
        }
        if !self.operator.lifecycle().is_active() {
            return Ok(Completion::Done(()));
        }

        self.cache.invalidate(device);
        lock(&self.form).reset();
        tracing::info!("key rotated");
        self.operator.success(format!("Key updated on {device}"));
        Ok(Completion::Done(()))
    }
}

fn update_confirmation(strategy: KeyStrategy, device: &str) -> ConfirmRequest {
    if strategy.is_high_risk() {
        ConfirmRequest::new(
            "Replace primary key",
            format!(
                "This overwrites the primary key in slot 0 on {device}. If the new password is \
                 lost, the container can no longer be opened. Replace the primary key?"
            ),
        )
        .tone(ConfirmTone::HighRisk)
    } else {
        ConfirmRequest::new("Update key", format!("Update the key on {device}?"))
    }
}
