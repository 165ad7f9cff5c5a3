// SPDX-License-Identifier: GPL-3.0-only

//! Key rotation form state
//!
//! Secrets are held in `Zeroizing` buffers and never printed.

use std::collections::HashMap;
use std::fmt;

use storage_types::{FlexibleOption, KeySlot, KeyStrategy, KeyTarget};
use zeroize::Zeroizing;

use crate::error::{OrchestratorError, Result};

#[derive(Default)]
pub struct KeyForm {
    pub target: KeyTarget,
    pub strategy: KeyStrategy,
    pub flexible_option: Option<FlexibleOption>,
    /// Raw slot number as entered; validated on submission
    pub key_slot: Option<u8>,
    new_password: Zeroizing<String>,
    confirm_password: Zeroizing<String>,
    /// Device path -> current password
    current_passwords: HashMap<String, Zeroizing<String>>,
    vault_password: Zeroizing<String>,
}

impl fmt::Debug for KeyForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut devices: Vec<&String> = self.current_passwords.keys().collect();
        devices.sort();
        f.debug_struct("KeyForm")
            .field("target", &self.target)
            .field("strategy", &self.strategy)
            .field("flexible_option", &self.flexible_option)
            .field("key_slot", &self.key_slot)
            .field("current_passwords_for", &devices)
            .field("vault_password_set", &!self.vault_password.is_empty())
            .finish_non_exhaustive()
    }
}

fn non_empty(secret: &Zeroizing<String>) -> Option<&str> {
    Some(secret.as_str()).filter(|s| !s.is_empty())
}

impl KeyForm {
    pub fn set_new_password(&mut self, password: impl Into<String>) {
        self.new_password = Zeroizing::new(password.into());
    }

    pub fn set_confirm_password(&mut self, password: impl Into<String>) {
        self.confirm_password = Zeroizing::new(password.into());
    }

    pub fn set_current_password(&mut self, device: &str, password: impl Into<String>) {
        self.current_passwords
            .insert(device.to_string(), Zeroizing::new(password.into()));
    }

    pub fn set_vault_password(&mut self, password: impl Into<String>) {
        self.vault_password = Zeroizing::new(password.into());
    }

    pub fn new_password(&self) -> Option<&str> {
        non_empty(&self.new_password)
    }

    pub fn current_password(&self, device: &str) -> Option<&str> {
        self.current_passwords.get(device).and_then(non_empty)
    }

    pub fn vault_password(&self) -> Option<&str> {
        non_empty(&self.vault_password)
    }

    /// Non-empty and identical
    pub fn passwords_match(&self) -> bool {
        self.new_password().is_some() && self.new_password == self.confirm_password
    }

    /// Clears secrets and choices back to defaults
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn check_passwords(&self) -> Result<()> {
        if self.new_password().is_none() {
            return Err(OrchestratorError::validation("new password required"));
        }
        if !self.passwords_match() {
            return Err(OrchestratorError::validation("new passwords do not match"));
        }
        Ok(())
    }

    /// Flexible option and slot to submit, given whether the slots are full
    ///
    /// The option selector only applies to `FlexibleAddition` with every slot
    /// occupied; otherwise the next free slot is used and nothing is sent.
    pub(crate) fn slot_choice(
        &self,
        slots_full: bool,
    ) -> Result<(Option<FlexibleOption>, Option<KeySlot>)> {
        if self.strategy != KeyStrategy::FlexibleAddition || !slots_full {
            return Ok((None, None));
        }
        match self.flexible_option {
            None => Err(OrchestratorError::validation(
                "all key slots are in use: choose random or manual slot replacement",
            )),
            Some(FlexibleOption::Random) => Ok((Some(FlexibleOption::Random), None)),
            Some(FlexibleOption::Manual) => self
                .key_slot
                .and_then(KeySlot::new)
                .map(|slot| (Some(FlexibleOption::Manual), Some(slot)))
                .ok_or_else(|| {
                    OrchestratorError::validation(format!(
                        "choose a key slot between {} and {}",
                        storage_types::MIN_KEY_SLOT,
                        storage_types::MAX_KEY_SLOT
                    ))
                }),
        }
    }

    /// Single-device rotation: an explicit manual choice always needs a slot
    pub(crate) fn update_slot_choice(
        &self,
        slots_full: bool,
    ) -> Result<(Option<FlexibleOption>, Option<KeySlot>)> {
        let manual = self.strategy == KeyStrategy::FlexibleAddition
            && self.flexible_option == Some(FlexibleOption::Manual);
        self.slot_choice(slots_full || manual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flexible(option: Option<FlexibleOption>, slot: Option<u8>) -> KeyForm {
        KeyForm {
            strategy: KeyStrategy::FlexibleAddition,
            flexible_option: option,
            key_slot: slot,
            ..Default::default()
        }
    }

    #[test]
    fn passwords_must_match_and_be_present() {
        let mut form = KeyForm::default();
        assert!(!form.passwords_match());
        form.set_new_password("hunter22");
        form.set_confirm_password("hunter23");
        assert!(form.check_passwords().is_err());
        form.set_confirm_password("hunter22");
        assert!(form.check_passwords().is_ok());
    }

    #[test]
    fn empty_current_password_counts_as_missing() {
        let mut form = KeyForm::default();
        form.set_current_password("/dev/sdb1", "");
        assert_eq!(form.current_password("/dev/sdb1"), None);
        form.set_current_password("/dev/sdb1", "old");
        assert_eq!(form.current_password("/dev/sdb1"), Some("old"));
    }

    #[test]
    fn selector_hidden_while_slots_free() {
        let form = flexible(Some(FlexibleOption::Manual), None);
        assert_eq!(form.slot_choice(false).unwrap(), (None, None));
    }

    #[test]
    fn full_slots_require_an_option() {
        assert!(flexible(None, None).slot_choice(true).is_err());
        assert_eq!(
            flexible(Some(FlexibleOption::Random), Some(4))
                .slot_choice(true)
                .unwrap(),
            (Some(FlexibleOption::Random), None)
        );
    }

    #[test]
    fn manual_needs_slot_in_range() {
        assert!(flexible(Some(FlexibleOption::Manual), None).slot_choice(true).is_err());
        assert!(flexible(Some(FlexibleOption::Manual), Some(0)).slot_choice(true).is_err());
        assert!(flexible(Some(FlexibleOption::Manual), Some(32)).slot_choice(true).is_err());
        assert_eq!(
            flexible(Some(FlexibleOption::Manual), Some(7))
                .slot_choice(true)
                .unwrap(),
            (Some(FlexibleOption::Manual), KeySlot::new(7))
        );
    }

    #[test]
    fn update_with_manual_choice_needs_slot_even_with_free_slots() {
        assert!(flexible(Some(FlexibleOption::Manual), None).update_slot_choice(false).is_err());
        assert_eq!(
            flexible(Some(FlexibleOption::Manual), Some(31))
                .update_slot_choice(false)
                .unwrap(),
            (Some(FlexibleOption::Manual), KeySlot::new(31))
        );
        assert_eq!(
            flexible(Some(FlexibleOption::Random), None)
                .update_slot_choice(false)
                .unwrap(),
            (None, None)
        );
    }

    #[test]
    fn other_strategies_ignore_slot_fields() {
        let form = KeyForm {
            strategy: KeyStrategy::ReplacePrimary,
            flexible_option: Some(FlexibleOption::Manual),
            ..Default::default()
        };
        assert_eq!(form.slot_choice(true).unwrap(), (None, None));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let mut form = KeyForm::default();
        form.set_new_password("s3cret");
        form.set_current_password("/dev/sdb1", "old-s3cret");
        let printed = format!("{form:?}");
        assert!(!printed.contains("s3cret"));
        assert!(printed.contains("/dev/sdb1"));
    }
}
