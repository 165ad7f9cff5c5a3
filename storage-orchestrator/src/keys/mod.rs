// SPDX-License-Identifier: GPL-3.0-only

//! Key creation and rotation across external devices and the vault

mod create;
mod form;
mod update;

use std::sync::{Arc, Mutex};

use storage_contracts::{KeyOpsAdapter, OperationKind, SecureTransport};
use storage_types::{KeyTarget, SlotKind};
use tokio::sync::OnceCell;

pub use form::KeyForm;

use crate::Collaborators;
use crate::error::{OrchestratorError, Result};
use crate::loading::{LoadingFlags, LoadingGuard};
use crate::lock;
use crate::operator::Operator;
use crate::session::Session;
use crate::status_cache::{CacheLookup, StatusCache};

pub struct KeyRotationOrchestrator {
    session: Arc<Session>,
    keys: Arc<dyn KeyOpsAdapter>,
    secure: Arc<dyn SecureTransport>,
    operator: Operator,
    cache: StatusCache,
    loading: Arc<LoadingFlags>,
    vault_path: OnceCell<String>,
    /// Primary first, then secondary
    external_devices: Mutex<Vec<String>>,
    form: Mutex<KeyForm>,
}

impl KeyRotationOrchestrator {
    pub fn new(session: Arc<Session>, collaborators: &Collaborators) -> Self {
        let lifecycle = session.lifecycle().child();
        let config = session.config();
        let operator = Operator::new(
            Arc::clone(&collaborators.prompt),
            Arc::clone(&collaborators.notifier),
            config.notifications.clone(),
            lifecycle.clone(),
        );
        let cache = StatusCache::new(
            Arc::clone(&collaborators.keys),
            &config.status_cache,
            lifecycle,
        );
        Self {
            keys: Arc::clone(&collaborators.keys),
            secure: Arc::clone(&collaborators.secure),
            operator,
            cache,
            loading: LoadingFlags::new(),
            vault_path: OnceCell::new(),
            external_devices: Mutex::default(),
            form: Mutex::default(),
            session,
        }
    }

    pub fn set_external_devices(&self, primary: Option<&str>, secondary: Option<&str>) {
        *lock(&self.external_devices) = primary
            .into_iter()
            .chain(secondary)
            .filter(|path| !path.is_empty())
            .map(str::to_string)
            .collect();
    }

    pub fn external_devices(&self) -> Vec<String> {
        lock(&self.external_devices).clone()
    }

    pub fn update_form(&self, edit: impl FnOnce(&mut KeyForm)) {
        edit(&mut lock(&self.form));
    }

    pub fn with_form<R>(&self, read: impl FnOnce(&KeyForm) -> R) -> R {
        read(&lock(&self.form))
    }

    pub fn is_loading(&self, kind: OperationKind) -> bool {
        self.loading.is_loading(kind)
    }

    pub fn status_cache(&self) -> &StatusCache {
        &self.cache
    }

    /// Resolved once, then served from memory
    pub async fn vault_path(&self) -> Result<String> {
        self.vault_path
            .get_or_try_init(|| async {
                let path = self.keys.vault_device_path().await?;
                tracing::debug!(%path, "vault device resolved");
                Ok::<_, OrchestratorError>(path)
            })
            .await
            .cloned()
    }

    /// Device paths implied by `target`, externals first
    pub async fn device_paths(&self, target: KeyTarget) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        if target.includes_external() {
            paths.extend(self.external_devices());
        }
        if target.includes_vault() {
            paths.push(self.vault_path().await?);
        }
        Ok(paths)
    }

    fn slot_targets(&self, target: KeyTarget) -> Vec<(String, SlotKind)> {
        let mut targets = Vec::new();
        if target.includes_external() {
            targets.extend(
                self.external_devices()
                    .into_iter()
                    .map(|path| (path, SlotKind::External)),
            );
        }
        if target.includes_vault()
            && let Some(path) = self.vault_path.get()
        {
            targets.push((path.clone(), SlotKind::Vault));
        }
        targets
    }

    /// Staggered primary, secondary, vault
    pub async fn refresh_slot_status(&self) -> Vec<CacheLookup> {
        let mut targets = self.slot_targets(KeyTarget::External);
        match self.vault_path().await {
            Ok(path) => targets.push((path, SlotKind::Vault)),
            Err(err) => tracing::warn!(error = %err, "vault device lookup failed"),
        }
        self.cache.fetch_staggered(&targets).await
    }

    /// Any targeted device known to have no free slot
    pub fn slots_full(&self, target: KeyTarget) -> bool {
        self.slot_targets(target)
            .iter()
            .any(|(path, kind)| self.cache.latest(path, *kind).is_some_and(|info| info.is_full()))
    }

    fn slot_kind_of(&self, device: &str) -> SlotKind {
        if self.vault_path.get().is_some_and(|vault| vault == device) {
            SlotKind::Vault
        } else {
            SlotKind::External
        }
    }

    fn slot_status_known(&self, targets: &[(String, SlotKind)]) -> bool {
        targets
            .iter()
            .all(|(path, kind)| self.cache.latest(path, *kind).is_some())
    }

    /// Whether any of `targets` has no free slot, fetching unknown ones first
    ///
    /// A target whose status is still unknown afterwards is an error.
    async fn ensure_slots_full(&self, targets: &[(String, SlotKind)]) -> Result<bool> {
        let missing: Vec<(String, SlotKind)> = targets
            .iter()
            .filter(|(path, kind)| self.cache.latest(path, *kind).is_none())
            .cloned()
            .collect();
        if !missing.is_empty() {
            tracing::debug!(devices = missing.len(), "fetching unknown key slot status");
            self.cache.fetch_staggered(&missing).await;
        }

        let mut full = false;
        for (path, kind) in targets {
            match self.cache.latest(path, *kind) {
                Some(info) => full |= info.is_full(),
                None => {
                    return Err(OrchestratorError::validation(format!(
                        "key slot status for {path} is unknown"
                    )));
                }
            }
        }
        Ok(full)
    }

    /// Random/manual selector must be answered before submitting
    pub fn flexible_option_required(&self) -> bool {
        let target = self.with_form(|form| {
            (form.strategy == storage_types::KeyStrategy::FlexibleAddition).then_some(form.target)
        });
        target.is_some_and(|target| self.slots_full(target))
    }

    pub fn can_create_key(&self) -> bool {
        if self.session.is_pending() || self.loading.is_loading(OperationKind::KeyCreate) {
            return false;
        }
        let externals = self.external_devices();
        let vault = self.vault_path.get().cloned();
        let form = lock(&self.form);
        let target = form.target;

        if form.check_passwords().is_err() {
            return false;
        }
        if target.includes_external()
            && (externals.is_empty() || externals.iter().any(|d| form.current_password(d).is_none()))
        {
            return false;
        }
        if target.includes_vault() && (vault.is_none() || form.vault_password().is_none()) {
            return false;
        }
        let flexible = form.strategy == storage_types::KeyStrategy::FlexibleAddition;
        drop(form);
        if flexible && !self.slot_status_known(&self.slot_targets(target)) {
            return false;
        }
        let slots_full = self.slots_full(target);
        self.with_form(|form| form.slot_choice(slots_full).is_ok())
    }

    pub fn teardown(&self) {
        self.cache.teardown();
    }

    fn begin(&self, kind: OperationKind) -> Result<LoadingGuard> {
        if self.session.is_pending() {
            return Err(OrchestratorError::Stale);
        }
        self.loading
            .begin(kind)
            .ok_or_else(|| OrchestratorError::busy(kind))
    }

    fn fail<T>(&self, kind: OperationKind, err: OrchestratorError) -> Result<T> {
        if err.is_local() {
            tracing::debug!(operation = kind.label(), error = %err, "key operation rejected locally");
        } else {
            tracing::warn!(operation = kind.label(), error = %err, "key operation failed");
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
