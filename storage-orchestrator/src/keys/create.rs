// SPDX-License-Identifier: GPL-3.0-only

//! Batched key creation across every device the target implies

use std::collections::BTreeMap;

use storage_contracts::{
    ConfirmRequest, ConfirmTone, KeyOperationReport, OperationId, OperationKind,
};
use storage_types::{EncryptedKeyPayloads, KeyOperationRequest, KeyStrategy, KeyTarget};
use tracing::Instrument;
use zeroize::Zeroizing;

use super::KeyRotationOrchestrator;
use crate::error::{Completion, OrchestratorError, Result};
use crate::lock;

/// Plaintext secrets captured from the form for one submission
struct CreateSecrets {
    new_password: Zeroizing<String>,
    vault_current: Option<Zeroizing<String>>,
    /// Device path -> current password, externals only
    device_current: Vec<(String, Zeroizing<String>)>,
}

impl KeyRotationOrchestrator {
    /// Validate, confirm, encrypt every secret, then submit one request
    ///
    /// Full success resets the form. Partial success still counts as success
    /// but keeps the form and reports each failed device separately.
    pub async fn create(&self) -> Result<Completion<KeyOperationReport>> {
        let op = OperationId::new();
        let (target, strategy) = self.with_form(|form| (form.target, form.strategy));
        let span = tracing::info_span!("key_create", %op, ?target, ?strategy);
        self.create_inner(target, strategy).instrument(span).await
    }

    async fn create_inner(
        &self,
        target: KeyTarget,
        strategy: KeyStrategy,
    ) -> Result<Completion<KeyOperationReport>> {
        const KIND: OperationKind = OperationKind::KeyCreate;

        let _guard = match self.begin(KIND) {
            Ok(guard) => guard,
            Err(err) => return self.fail(KIND, err),
        };

        if target.includes_external() && self.external_devices().is_empty() {
            return self.fail(
                KIND,
                OrchestratorError::validation("no external device selected for key creation"),
            );
        }
        let devices = match self.device_paths(target).await {
            Ok(devices) => devices,
            Err(err) => return self.fail(KIND, err),
        };

        let slots_full = if strategy == KeyStrategy::FlexibleAddition {
            match self.ensure_slots_full(&self.slot_targets(target)).await {
                Ok(full) => full,
                Err(err) => return self.fail(KIND, err),
            }
        } else {
            false
        };
        let prepared = {
            let form = lock(&self.form);
            form.check_passwords()
                .and_then(|()| self.collect_secrets(&form, target, &devices))
                .and_then(|secrets| Ok((secrets, form.slot_choice(slots_full)?)))
        };
        let (secrets, (flexible_option, key_slot)) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => return self.fail(KIND, err),
        };

        if !self.operator.approve(create_confirmation(strategy, &devices)).await {
            return Ok(Completion::Declined);
        }

        let payloads = match self.encrypt_payloads(&secrets).await {
            Ok(payloads) => payloads,
            Err(err) => return self.fail(KIND, err),
        };
        drop(secrets);

        let request = KeyOperationRequest::new(
            target,
            strategy,
            devices.clone(),
            flexible_option,
            key_slot,
            payloads,
        );
        tracing::info!(devices = devices.len(), payloads = %request.payloads, "submitting key creation");

        let report = match self.keys.create_keys(&request).await {
            Ok(report) => report,
            Err(err) => return self.fail(KIND, err.into()),
        };
        if !self.operator.lifecycle().is_active() {
            return Ok(Completion::Done(report));
        }
        for device in &devices {
            self.cache.invalidate(device);
        }

        if report.is_total_failure() {
            for failure in report.failures() {
                tracing::warn!(device = %failure.device, reason = failure.reason(), "key creation failed");
            }
            let message = if report.message.is_empty() {
                report
                    .failures()
                    .map(|f| format!("{}: {}", f.device, f.reason()))
                    .collect::<Vec<_>>()
                    .join("; ")
            } else {
                report.message.clone()
            };
            return self.fail(
                KIND,
                OrchestratorError::Backend(storage_contracts::StorageError::rejected(message)),
            );
        }

        let summary = if !report.message.is_empty() {
            report.message.clone()
        } else if report.is_full_success() {
            "Key created".to_string()
        } else {
            let created = report.results.iter().filter(|r| r.success).count();
            format!("Key created on {created} of {} devices", report.results.len())
        };
        self.operator.success(summary);

        if report.is_full_success() {
            lock(&self.form).reset();
        } else {
            for failure in report.failures() {
                tracing::warn!(device = %failure.device, reason = failure.reason(), "key creation failed on device");
                self.operator
                    .error(format!("{}: {}", failure.device, failure.reason()));
            }
        }
        Ok(Completion::Done(report))
    }

    /// Every implied device needs its current password; the first gap aborts
    fn collect_secrets(
        &self,
        form: &super::KeyForm,
        target: KeyTarget,
        devices: &[String],
    ) -> Result<CreateSecrets> {
        let vault = if target.includes_vault() {
            self.vault_path.get().cloned()
        } else {
            None
        };

        let mut device_current = Vec::new();
        for device in devices {
            if vault.as_deref() == Some(device.as_str()) {
                continue;
            }
            let password = form
                .current_password(device)
                .ok_or_else(|| OrchestratorError::MissingPassword {
                    device: device.clone(),
                })?;
            device_current.push((device.clone(), Zeroizing::new(password.to_string())));
        }

        let vault_current = match vault {
            Some(vault) => {
                let password = form
                    .vault_password()
                    .ok_or(OrchestratorError::MissingPassword { device: vault })?;
                Some(Zeroizing::new(password.to_string()))
            }
            None => None,
        };

        let new_password = form
            .new_password()
            .ok_or_else(|| OrchestratorError::validation("new password required"))?;

        Ok(CreateSecrets {
            new_password: Zeroizing::new(new_password.to_string()),
            vault_current,
            device_current,
        })
    }

    /// All or nothing: one failed encryption aborts the submission
    async fn encrypt_payloads(&self, secrets: &CreateSecrets) -> Result<EncryptedKeyPayloads> {
        let new_password = self
            .encrypt_secret(&secrets.new_password, "new password")
            .await?;
        let vault_current = match &secrets.vault_current {
            Some(password) => Some(self.encrypt_secret(password, "vault password").await?),
            None => None,
        };
        let mut device_current = BTreeMap::new();
        for (device, password) in &secrets.device_current {
            let encrypted = self.encrypt_secret(password, "device password").await?;
            device_current.insert(device.clone(), encrypted);
        }
        Ok(EncryptedKeyPayloads {
            new_password,
            vault_current,
            device_current,
        })
    }
}

fn create_confirmation(strategy: KeyStrategy, devices: &[String]) -> ConfirmRequest {
    let list = devices.join(", ");
    match strategy {
        KeyStrategy::ReplacePrimary => ConfirmRequest::new(
            "Replace primary key",
            format!(
                "This overwrites the primary key in slot 0 on {list}. If the new password is lost, \
                 these containers can no longer be opened. Replace the primary key?"
            ),
        )
        .tone(ConfirmTone::HighRisk),
        KeyStrategy::SafeRotation => ConfirmRequest::new(
            "Rotate key",
            format!("Add the new key to {list} and retire the current one?"),
        ),
        KeyStrategy::FlexibleAddition => {
            ConfirmRequest::new("Add key", format!("Add the new key to {list}?"))
        }
    }
}
