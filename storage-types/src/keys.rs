// SPDX-License-Identifier: GPL-3.0-only

//! Key slot status and key rotation requests

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Slot 0 holds the factory/primary key and is never offered for manual selection
pub const MIN_KEY_SLOT: u8 = 1;

/// Highest addressable key slot
pub const MAX_KEY_SLOT: u8 = 31;

/// Which set of containers a key operation applies to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyTarget {
    #[default]
    External,
    Vault,
    Both,
}

impl KeyTarget {
    pub fn includes_external(self) -> bool {
        matches!(self, Self::External | Self::Both)
    }

    pub fn includes_vault(self) -> bool {
        matches!(self, Self::Vault | Self::Both)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    /// Overwrite the primary key in slot 0
    ReplacePrimary,
    /// Add the new key, verify it, then retire the old one
    #[default]
    SafeRotation,
    /// Add the new key to a free slot, or a chosen one when all are occupied
    FlexibleAddition,
}

impl KeyStrategy {
    pub fn is_high_risk(self) -> bool {
        matches!(self, Self::ReplacePrimary)
    }
}

/// How a slot is picked for `FlexibleAddition` once all slots are occupied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlexibleOption {
    Random,
    Manual,
}

/// Status lookup flavour, mirrors the backend's `type` query parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    External,
    Vault,
}

/// A key slot the operator may choose manually (1..=31)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct KeySlot(u8);

impl KeySlot {
    pub fn new(slot: u8) -> Option<Self> {
        (MIN_KEY_SLOT..=MAX_KEY_SLOT)
            .contains(&slot)
            .then_some(Self(slot))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for KeySlot {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| {
            format!("key slot must be between {MIN_KEY_SLOT} and {MAX_KEY_SLOT}, got {value}")
        })
    }
}

impl From<KeySlot> for u8 {
    fn from(slot: KeySlot) -> Self {
        slot.0
    }
}

impl fmt::Display for KeySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key slot occupancy for one container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeySlotInfo {
    pub total: u8,
    pub used: u8,
    pub available: u8,
}

impl KeySlotInfo {
    /// No free slot left; a zeroed (unknown) record also counts as full
    pub fn is_full(&self) -> bool {
        self.available == 0
    }
}

/// Every secret in a key request, each individually encrypted for transit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedKeyPayloads {
    pub new_password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vault_current: Option<String>,
    /// Device path -> encrypted current password
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub device_current: BTreeMap<String, String>,
}

impl fmt::Display for EncryptedKeyPayloads {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{} encrypted payloads>",
            1 + usize::from(self.vault_current.is_some()) + self.device_current.len()
        )
    }
}

/// Batched multi-device key creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyOperationRequest {
    pub target: KeyTarget,
    pub strategy: KeyStrategy,
    pub devices: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flexible_option: Option<FlexibleOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_slot: Option<KeySlot>,
    pub payloads: EncryptedKeyPayloads,
}

impl KeyOperationRequest {
    pub fn new(
        target: KeyTarget,
        strategy: KeyStrategy,
        devices: Vec<String>,
        flexible_option: Option<FlexibleOption>,
        key_slot: Option<KeySlot>,
        payloads: EncryptedKeyPayloads,
    ) -> Self {
        let flexible_option = flexible_option.filter(|_| strategy == KeyStrategy::FlexibleAddition);
        Self {
            target,
            strategy,
            devices,
            flexible_option,
            key_slot: effective_slot(strategy, flexible_option, key_slot),
            payloads,
        }
    }
}

/// Single-device key rotation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyUpdateRequest {
    pub device: String,
    pub strategy: KeyStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flexible_option: Option<FlexibleOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_slot: Option<KeySlot>,
    pub new_password: String,
    pub current_password: String,
}

impl KeyUpdateRequest {
    pub fn new(
        device: String,
        strategy: KeyStrategy,
        flexible_option: Option<FlexibleOption>,
        key_slot: Option<KeySlot>,
        new_password: String,
        current_password: String,
    ) -> Self {
        let flexible_option = flexible_option.filter(|_| strategy == KeyStrategy::FlexibleAddition);
        Self {
            device,
            strategy,
            flexible_option,
            key_slot: effective_slot(strategy, flexible_option, key_slot),
            new_password,
            current_password,
        }
    }
}

/// A slot number only travels with `FlexibleAddition` + `Manual`
fn effective_slot(
    strategy: KeyStrategy,
    option: Option<FlexibleOption>,
    slot: Option<KeySlot>,
) -> Option<KeySlot> {
    match (strategy, option) {
        (KeyStrategy::FlexibleAddition, Some(FlexibleOption::Manual)) => slot,
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_range_excludes_reserved_slot() {
        assert!(KeySlot::new(0).is_none());
        assert!(KeySlot::new(32).is_none());
        assert_eq!(KeySlot::new(1).map(KeySlot::get), Some(1));
        assert_eq!(KeySlot::new(31).map(KeySlot::get), Some(31));
    }

    #[test]
    fn slot_rejects_out_of_range_json() {
        assert!(serde_json::from_str::<KeySlot>("0").is_err());
        assert_eq!(serde_json::from_str::<KeySlot>("7").unwrap().get(), 7);
    }

    #[test]
    fn slot_is_dropped_unless_manual_flexible_addition() {
        let slot = KeySlot::new(4);
        let request = KeyOperationRequest::new(
            KeyTarget::External,
            KeyStrategy::SafeRotation,
            vec!["/dev/sdb1".to_string()],
            Some(FlexibleOption::Manual),
            slot,
            EncryptedKeyPayloads::default(),
        );
        assert_eq!(request.key_slot, None);
        assert_eq!(request.flexible_option, None);

        let request = KeyOperationRequest::new(
            KeyTarget::External,
            KeyStrategy::FlexibleAddition,
            vec!["/dev/sdb1".to_string()],
            Some(FlexibleOption::Manual),
            slot,
            EncryptedKeyPayloads::default(),
        );
        assert_eq!(request.key_slot, slot);
    }

    #[test]
    fn zeroed_slot_info_counts_as_full() {
        assert!(KeySlotInfo::default().is_full());
        let info = KeySlotInfo {
            total: 32,
            used: 3,
            available: 29,
        };
        assert!(!info.is_full());
    }

    #[test]
    fn target_membership() {
        assert!(KeyTarget::Both.includes_external());
        assert!(KeyTarget::Both.includes_vault());
        assert!(!KeyTarget::External.includes_vault());
        assert!(!KeyTarget::Vault.includes_external());
    }
}
